//! Transactions with flattened nesting.
//!
//! Transactions are opened through a [`Connection`] and handed to a closure
//! as a child connection bound to the native transaction:
//!
//! - [`Connection::transaction`] commits when the closure succeeds and rolls
//!   back when it fails
//! - [`Connection::rollback`] always rolls back, which is handy for tests
//! - [`Connection::new_transaction`] opens one without finalizing it
//!
//! # Nesting
//!
//! A transaction requested from a connection that is already inside one
//! reuses that connection. There are no save-points: inner scopes share the
//! fate of the outer transaction. Only the outermost scope commits, but a
//! failing inner [`Connection::transaction`] or any inner
//! [`Connection::rollback`] rolls back the whole shared transaction, and the
//! outer scope's own commit then fails with
//! [`Error::TransactionClosed`](crate::Error::TransactionClosed).
//!
//! ```rust,ignore
//! conn.transaction(|tx| async move {
//!     tx.execute("INSERT INTO users (name) VALUES (?)", &["alice".into()]).await?;
//!
//!     // Same transaction; nothing is committed here.
//!     tx.transaction(|inner| async move {
//!         inner.execute("INSERT INTO audit (event) VALUES (?)", &["signup".into()]).await?;
//!         Ok::<_, poplar_core::Error>(())
//!     })
//!     .await?;
//!
//!     Ok::<_, poplar_core::Error>(())
//! })
//! .await?;
//! ```

use crate::connection::{Backend, Connection, TransactionContext};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

impl Connection {
    /// Open a transaction and return the connection bound to it.
    ///
    /// On a connection that is already inside a transaction this returns the
    /// same connection. Otherwise the store is opened if needed, a native
    /// transaction is started and a new child connection is returned; the
    /// caller is responsible for finalizing it.
    pub async fn new_transaction(self: &Arc<Self>) -> Result<Arc<Connection>> {
        if self.in_transaction() {
            debug!(connection = %self.id, "Reusing open transaction");
            return Ok(Arc::clone(self));
        }

        let store = self.store().await?;
        let tx = self
            .time("begin", self.dialect.begin(store.as_ref()))
            .await?;

        let child = Connection {
            id: Uuid::new_v4(),
            dialect: Arc::clone(&self.dialect),
            timings: Mutex::new(Vec::new()),
            backend: Backend::Transaction(TransactionContext {
                store: tx,
                owner: self.id,
            }),
        };
        debug!(connection = %self.id, transaction = %child.id, "Transaction started");
        Ok(Arc::new(child))
    }

    /// Id of the connection that opened this transaction, if any.
    pub fn owner(&self) -> Option<Uuid> {
        self.transaction_context().map(|ctx| ctx.owner)
    }

    /// Run `f` inside a transaction.
    ///
    /// If this call opened the transaction it is committed when `f` returns
    /// `Ok` and rolled back when `f` returns `Err`. A failed rollback is
    /// logged and `f`'s error is returned unchanged; a failed commit is
    /// returned as the error.
    ///
    /// Called on a connection that is already inside a transaction, `f` runs
    /// on that same transaction. Success leaves the commit to the outermost
    /// scope; an error rolls back the shared transaction.
    pub async fn transaction<F, Fut, T, E>(self: &Arc<Self>, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Arc<Connection>) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        let tx = self.new_transaction().await?;
        let owned = tx.owner() == Some(self.id);

        match f(Arc::clone(&tx)).await {
            Ok(value) if owned => {
                tx.commit().await?;
                Ok(value)
            }
            Ok(value) => Ok(value),
            Err(err) => {
                match tx.finish_rollback().await {
                    Ok(()) => {}
                    Err(Error::TransactionClosed) => {
                        debug!(transaction = %tx.id, "Transaction already rolled back");
                    }
                    Err(rollback_err) => warn!(
                        transaction = %tx.id,
                        error = %rollback_err,
                        "Rollback after failed transaction body also failed"
                    ),
                }
                Err(err)
            }
        }
    }

    /// Run `f` inside a transaction that is always rolled back.
    ///
    /// Returns the result of the rollback. Called on a connection that is
    /// already inside a transaction, `f` runs on that transaction and the
    /// whole shared transaction is rolled back.
    pub async fn rollback<F, Fut>(self: &Arc<Self>, f: F) -> Result<()>
    where
        F: FnOnce(Arc<Connection>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let tx = self.new_transaction().await?;
        f(Arc::clone(&tx)).await;
        tx.finish_rollback().await
    }

    async fn commit(&self) -> Result<()> {
        let ctx = self.transaction_context().ok_or(Error::TransactionClosed)?;
        debug!(transaction = %self.id, "Committing transaction");
        self.time("commit", ctx.store.commit()).await
    }

    async fn finish_rollback(&self) -> Result<()> {
        let ctx = self.transaction_context().ok_or(Error::TransactionClosed)?;
        debug!(transaction = %self.id, "Rolling back transaction");
        self.time("rollback", ctx.store.rollback()).await
    }
}
