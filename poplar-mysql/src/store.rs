//! MySQL store backed by a `mysql_async` pool.

use std::sync::Arc;

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, Pool};
use poplar_core::{Store, TransactionStore, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{MysqlError, MysqlResult};
use crate::types::values_to_params;

/// A MySQL [`Store`].
#[derive(Clone)]
pub struct MysqlStore {
    inner: Pool,
}

impl MysqlStore {
    /// Build a pool for `url` and check that a connection can be made.
    pub async fn connect(url: &str) -> MysqlResult<Self> {
        let store = Self::lazy(url)?;
        drop(store.inner.get_conn().await?);
        Ok(store)
    }

    /// Build a pool for `url` without connecting.
    pub fn lazy(url: &str) -> MysqlResult<Self> {
        let opts = Opts::from_url(url)?;
        info!(
            host = %opts.ip_or_hostname(),
            port = %opts.tcp_port(),
            database = ?opts.db_name(),
            "MySQL connection pool created"
        );
        Ok(Self {
            inner: Pool::new(opts),
        })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool {
        &self.inner
    }
}

async fn execute_on(conn: &mut Conn, sql: &str, params: &[Value]) -> MysqlResult<u64> {
    conn.exec_drop(sql, values_to_params(params)).await?;
    Ok(conn.affected_rows())
}

#[async_trait]
impl Store for MysqlStore {
    async fn execute(&self, sql: &str, params: &[Value]) -> poplar_core::Result<u64> {
        debug!(sql = %sql, "Executing statement");
        let mut conn = self.inner.get_conn().await.map_err(MysqlError::from)?;
        Ok(execute_on(&mut conn, sql, params).await?)
    }

    async fn begin(&self, statement: &str) -> poplar_core::Result<Arc<dyn TransactionStore>> {
        let mut conn = self.inner.get_conn().await.map_err(MysqlError::from)?;
        conn.query_drop(statement).await.map_err(MysqlError::from)?;
        debug!(statement = %statement, "Transaction opened");
        Ok(Arc::new(MysqlTransaction {
            conn: Mutex::new(Some(conn)),
        }))
    }
}

/// A transaction holding one pooled MySQL session.
pub struct MysqlTransaction {
    conn: Mutex<Option<Conn>>,
}

impl MysqlTransaction {
    async fn finish(&self, statement: &str) -> MysqlResult<()> {
        let mut conn = self
            .conn
            .lock()
            .await
            .take()
            .ok_or(MysqlError::TransactionClosed)?;
        debug!(statement = %statement, "Finishing transaction");
        conn.query_drop(statement).await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MysqlTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> poplar_core::Result<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(MysqlError::TransactionClosed)?;
        debug!(sql = %sql, "Executing statement in transaction");
        Ok(execute_on(conn, sql, params).await?)
    }

    async fn commit(&self) -> poplar_core::Result<()> {
        Ok(self.finish("COMMIT").await?)
    }

    async fn rollback(&self) -> poplar_core::Result<()> {
        Ok(self.finish("ROLLBACK").await?)
    }
}

impl Drop for MysqlTransaction {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.get_mut().take() else {
            return;
        };
        warn!("Transaction dropped without commit or rollback; rolling back");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = conn.query_drop("ROLLBACK").await {
                    warn!(error = %e, "Rollback of dropped transaction failed");
                }
            });
        }
    }
}
