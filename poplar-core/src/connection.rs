//! Connections.
//!
//! A top-level [`Connection`] is built from configuration and opens its
//! native store lazily, on first use. Transactions produce child connections
//! that run every statement on the native transaction; see
//! [`Connection::transaction`].

use crate::config::{mask_url, ConnectionDetails};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::store::{Store, StoreOpener, TransactionStore};
use crate::value::Value;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// A named database connection.
pub struct Connection {
    pub(crate) id: Uuid,
    pub(crate) dialect: Arc<Dialect>,
    pub(crate) timings: Mutex<Vec<Duration>>,
    pub(crate) backend: Backend,
}

pub(crate) enum Backend {
    /// Top-level connection; the store is opened on first use.
    Lazy {
        store: OnceCell<Arc<dyn Store>>,
        opener: Arc<dyn StoreOpener>,
    },
    /// Child connection bound to a native transaction.
    Transaction(TransactionContext),
}

pub(crate) struct TransactionContext {
    pub(crate) store: Arc<dyn TransactionStore>,
    /// Id of the connection that opened the transaction.
    pub(crate) owner: Uuid,
}

impl Connection {
    /// Create a top-level connection.
    ///
    /// Fails when the engine tag is not supported or the URL is invalid. No
    /// store is opened until the connection is first used.
    pub fn new(details: ConnectionDetails, opener: Arc<dyn StoreOpener>) -> Result<Self> {
        let dialect = Dialect::new(details)?;
        Ok(Self {
            id: Uuid::new_v4(),
            dialect: Arc::new(dialect),
            timings: Mutex::new(Vec::new()),
            backend: Backend::Lazy {
                store: OnceCell::new(),
                opener,
            },
        })
    }

    /// Opaque identifier of this connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The dialect of this connection.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Connection URL as rendered by the dialect.
    pub fn url(&self) -> String {
        self.dialect.url()
    }

    /// Whether a native store has been opened.
    ///
    /// Always true for connections inside a transaction.
    pub fn is_open(&self) -> bool {
        match &self.backend {
            Backend::Lazy { store, .. } => store.initialized(),
            Backend::Transaction(_) => true,
        }
    }

    /// Whether this connection is bound to a transaction.
    pub fn in_transaction(&self) -> bool {
        matches!(self.backend, Backend::Transaction(_))
    }

    /// Snapshot of the recorded operation durations.
    pub fn timings(&self) -> Vec<Duration> {
        self.timings.lock().clone()
    }

    /// Open the native store if it is not open yet.
    ///
    /// Concurrent first calls share one open attempt; every caller that
    /// returns `Ok` observes the same store. A failed attempt leaves the
    /// connection closed and the next call tries again.
    pub async fn open(&self) -> Result<()> {
        self.store().await.map(|_| ())
    }

    pub(crate) async fn store(&self) -> Result<Arc<dyn Store>> {
        let Backend::Lazy { store, opener } = &self.backend else {
            return Err(crate::Error::store(
                "transactional connections have no top-level store",
            ));
        };

        let store = store
            .get_or_try_init(|| async {
                let kind = self.dialect.kind();
                let url = self.dialect.url();
                info!(
                    connection = %self.id,
                    dialect = %kind,
                    url = %mask_url(&url),
                    "Opening store"
                );
                opener.open(kind, &url).await
            })
            .await?;
        Ok(Arc::clone(store))
    }

    pub(crate) fn transaction_context(&self) -> Option<&TransactionContext> {
        match &self.backend {
            Backend::Transaction(ctx) => Some(ctx),
            Backend::Lazy { .. } => None,
        }
    }

    /// Execute a statement, returning the number of affected rows.
    ///
    /// Placeholders are written as `?` and translated for the dialect. A
    /// top-level connection opens its store first if needed.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let sql = self.dialect.translate_sql(sql);
        debug!(connection = %self.id, sql = %sql, params = params.len(), "Executing statement");

        self.time("execute", async {
            match &self.backend {
                Backend::Transaction(ctx) => ctx.store.execute(&sql, params).await,
                Backend::Lazy { .. } => self.store().await?.execute(&sql, params).await,
            }
        })
        .await
    }

    /// Run `fut` and record how long it took.
    pub async fn time<F: Future>(&self, name: &str, fut: F) -> F::Output {
        let start = Instant::now();
        let output = fut.await;
        let elapsed = start.elapsed();
        trace!(connection = %self.id, operation = name, elapsed_us = elapsed.as_micros() as u64, "Timed");
        self.timings.lock().push(elapsed);
        output
    }
}

impl fmt::Display for Connection {
    /// Writes the connection URL with any password masked.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask_url(&self.url()))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("dialect", &self.dialect.kind())
            .field("open", &self.is_open())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}
