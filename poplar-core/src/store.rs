//! Native store capabilities.
//!
//! A [`Store`] is an opened engine handle. Connections never talk to a driver
//! directly: they ask a [`StoreOpener`] for a store the first time one is
//! needed and open transactions through it.

use crate::dialect::DialectKind;
use crate::error::Result;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Arc;

/// An opened native engine handle.
#[async_trait]
pub trait Store: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    ///
    /// `sql` is already in the engine's placeholder syntax.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Open a native transaction by running `statement` on a dedicated
    /// session.
    async fn begin(&self, statement: &str) -> Result<Arc<dyn TransactionStore>>;
}

/// A native transaction.
///
/// Once [`commit`] or [`rollback`] has returned, every further call fails
/// with [`Error::TransactionClosed`](crate::Error::TransactionClosed).
///
/// [`commit`]: TransactionStore::commit
/// [`rollback`]: TransactionStore::rollback
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Execute a statement inside the transaction.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Commit the transaction.
    async fn commit(&self) -> Result<()>;

    /// Roll the transaction back.
    async fn rollback(&self) -> Result<()>;
}

/// Opens native stores for a dialect.
#[async_trait]
pub trait StoreOpener: Send + Sync {
    /// Open a store for `kind` at `url`.
    async fn open(&self, kind: DialectKind, url: &str) -> Result<Arc<dyn Store>>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording store used by the unit tests.

    use super::*;
    use crate::Error;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Shared journal of everything the mock stores were asked to do.
    #[derive(Default)]
    pub(crate) struct Recorder {
        events: Mutex<Vec<String>>,
        opens: AtomicUsize,
        fail_open: AtomicBool,
        fail_commit: AtomicBool,
        fail_rollback: AtomicBool,
    }

    impl Recorder {
        pub(crate) fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }

        pub(crate) fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        pub(crate) fn fail_open(&self, fail: bool) {
            self.fail_open.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn fail_commit(&self, fail: bool) {
            self.fail_commit.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn fail_rollback(&self, fail: bool) {
            self.fail_rollback.store(fail, Ordering::SeqCst);
        }

        fn record(&self, event: impl Into<String>) {
            self.events.lock().push(event.into());
        }
    }

    pub(crate) struct MockOpener {
        rec: Arc<Recorder>,
    }

    impl MockOpener {
        pub(crate) fn new(rec: Arc<Recorder>) -> Self {
            Self { rec }
        }
    }

    #[async_trait]
    impl StoreOpener for MockOpener {
        async fn open(&self, kind: DialectKind, _url: &str) -> Result<Arc<dyn Store>> {
            self.rec.opens.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.rec.fail_open.load(Ordering::SeqCst) {
                return Err(Error::store("connection refused"));
            }
            self.rec.record(format!("open {kind}"));
            Ok(Arc::new(MockStore {
                rec: Arc::clone(&self.rec),
            }))
        }
    }

    struct MockStore {
        rec: Arc<Recorder>,
    }

    #[async_trait]
    impl Store for MockStore {
        async fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
            self.rec.record(format!("exec {sql}"));
            Ok(1)
        }

        async fn begin(&self, statement: &str) -> Result<Arc<dyn TransactionStore>> {
            self.rec.record(statement);
            Ok(Arc::new(MockTransaction {
                rec: Arc::clone(&self.rec),
                closed: AtomicBool::new(false),
            }))
        }
    }

    struct MockTransaction {
        rec: Arc<Recorder>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl TransactionStore for MockTransaction {
        async fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::TransactionClosed);
            }
            self.rec.record(format!("tx {sql}"));
            Ok(1)
        }

        async fn commit(&self) -> Result<()> {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Err(Error::TransactionClosed);
            }
            self.rec.record("COMMIT");
            if self.rec.fail_commit.load(Ordering::SeqCst) {
                return Err(Error::store("commit failed"));
            }
            Ok(())
        }

        async fn rollback(&self) -> Result<()> {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Err(Error::TransactionClosed);
            }
            self.rec.record("ROLLBACK");
            if self.rec.fail_rollback.load(Ordering::SeqCst) {
                return Err(Error::store("rollback failed"));
            }
            Ok(())
        }
    }
}
