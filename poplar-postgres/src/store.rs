//! PostgreSQL store backed by a `deadpool-postgres` pool.

use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use poplar_core::{Store, TransactionStore, Value};
use tokio::sync::Mutex;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;
use tracing::{debug, info, warn};

use crate::error::{PgError, PgResult};
use crate::types::values_to_params;

/// A PostgreSQL [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Build a pool for `url` and check that a connection can be made.
    pub async fn connect(url: &str) -> PgResult<Self> {
        let store = Self::lazy(url)?;
        drop(store.pool.get().await?);
        Ok(store)
    }

    /// Build a pool for `url` without connecting.
    pub fn lazy(url: &str) -> PgResult<Self> {
        let pg_config: tokio_postgres::Config = url.parse()?;

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config.clone(), NoTls, mgr_config);

        let pool = Pool::builder(mgr)
            .build()
            .map_err(|e| PgError::config(format!("failed to create pool: {}", e)))?;

        info!(
            hosts = ?pg_config.get_hosts(),
            database = ?pg_config.get_dbname(),
            "PostgreSQL connection pool created"
        );
        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

async fn execute_on(client: &Object, sql: &str, params: &[Value]) -> PgResult<u64> {
    let pg_params = values_to_params(params);
    let param_refs: Vec<&(dyn ToSql + Sync)> = pg_params.iter().map(|p| p.as_ref() as _).collect();
    Ok(client.execute(sql, &param_refs).await?)
}

#[async_trait]
impl Store for PgStore {
    async fn execute(&self, sql: &str, params: &[Value]) -> poplar_core::Result<u64> {
        debug!(sql = %sql, "Executing statement");
        let client = self.pool.get().await.map_err(PgError::from)?;
        Ok(execute_on(&client, sql, params).await?)
    }

    async fn begin(&self, statement: &str) -> poplar_core::Result<Arc<dyn TransactionStore>> {
        let client = self.pool.get().await.map_err(PgError::from)?;
        client.batch_execute(statement).await.map_err(PgError::from)?;
        debug!(statement = %statement, "Transaction opened");
        Ok(Arc::new(PgTransaction {
            client: Mutex::new(Some(client)),
        }))
    }
}

/// A transaction holding one pooled PostgreSQL session.
///
/// The session goes back to the pool on commit or rollback. A transaction
/// dropped while still open closes its session instead.
pub struct PgTransaction {
    client: Mutex<Option<Object>>,
}

impl PgTransaction {
    async fn finish(&self, statement: &str) -> PgResult<()> {
        let client = self
            .client
            .lock()
            .await
            .take()
            .ok_or(PgError::TransactionClosed)?;
        debug!(statement = %statement, "Finishing transaction");
        client.batch_execute(statement).await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for PgTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> poplar_core::Result<u64> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(PgError::TransactionClosed)?;
        debug!(sql = %sql, "Executing statement in transaction");
        Ok(execute_on(client, sql, params).await?)
    }

    async fn commit(&self) -> poplar_core::Result<()> {
        Ok(self.finish("COMMIT").await?)
    }

    async fn rollback(&self) -> poplar_core::Result<()> {
        Ok(self.finish("ROLLBACK").await?)
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if let Some(client) = self.client.get_mut().take() {
            warn!("Transaction dropped without commit or rollback; closing its session");
            drop(Object::take(client));
        }
    }
}
