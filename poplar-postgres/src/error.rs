//! Error types for PostgreSQL operations.

use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// Connection pool error.
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The transaction was already committed or rolled back.
    #[error("transaction already closed")]
    TransactionClosed,
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Pool(_)) || matches!(self, Self::Postgres(e) if e.is_closed())
    }
}

impl From<PgError> for poplar_core::Error {
    fn from(err: PgError) -> Self {
        match err {
            PgError::TransactionClosed => poplar_core::Error::TransactionClosed,
            PgError::Postgres(e) => match e.code() {
                Some(code) => poplar_core::Error::store(format!("{e} (SQLSTATE {})", code.code())),
                None => poplar_core::Error::store(e.to_string()),
            },
            other => poplar_core::Error::store(other.to_string()),
        }
    }
}
