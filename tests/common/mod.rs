//! Recording store shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use poplar::{DialectKind, Error, Result, Store, StoreOpener, TransactionStore, Value};

/// Journal of everything the recording stores were asked to do.
#[derive(Default)]
pub struct Journal {
    events: Mutex<Vec<String>>,
    opens: AtomicUsize,
    pub fail_rollback: AtomicBool,
    pub fail_commit: AtomicBool,
}

impl Journal {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }
}

pub struct RecordingOpener {
    pub journal: Arc<Journal>,
}

impl RecordingOpener {
    pub fn new() -> (Arc<Self>, Arc<Journal>) {
        let journal = Arc::new(Journal::default());
        let opener = Arc::new(Self {
            journal: Arc::clone(&journal),
        });
        (opener, journal)
    }
}

#[async_trait]
impl StoreOpener for RecordingOpener {
    async fn open(&self, kind: DialectKind, url: &str) -> Result<Arc<dyn Store>> {
        self.journal.opens.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("open {kind} {url}"));
        Ok(Arc::new(RecordingStore {
            journal: Arc::clone(&self.journal),
        }))
    }
}

struct RecordingStore {
    journal: Arc<Journal>,
}

#[async_trait]
impl Store for RecordingStore {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.journal.push(format!("exec {sql}"));
        Ok(params.len() as u64)
    }

    async fn begin(&self, statement: &str) -> Result<Arc<dyn TransactionStore>> {
        self.journal.push(statement);
        Ok(Arc::new(RecordingTransaction {
            journal: Arc::clone(&self.journal),
            closed: AtomicBool::new(false),
        }))
    }
}

struct RecordingTransaction {
    journal: Arc<Journal>,
    closed: AtomicBool,
}

#[async_trait]
impl TransactionStore for RecordingTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::TransactionClosed);
        }
        self.journal.push(format!("tx {sql}"));
        Ok(params.len() as u64)
    }

    async fn commit(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::TransactionClosed);
        }
        self.journal.push("COMMIT");
        if self.journal.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::store("commit failed"));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(Error::TransactionClosed);
        }
        self.journal.push("ROLLBACK");
        if self.journal.fail_rollback.load(Ordering::SeqCst) {
            return Err(Error::store("rollback failed"));
        }
        Ok(())
    }
}
