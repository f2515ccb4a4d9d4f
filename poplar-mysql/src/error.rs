//! Error types for MySQL operations.

use std::fmt;

/// Result type for MySQL operations.
pub type MysqlResult<T> = Result<T, MysqlError>;

/// Error type for MySQL operations.
#[derive(Debug)]
pub enum MysqlError {
    /// MySQL driver error.
    Mysql(mysql_async::Error),
    /// Configuration error.
    Config(String),
    /// The transaction was already committed or rolled back.
    TransactionClosed,
}

impl MysqlError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl fmt::Display for MysqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mysql(e) => write!(f, "MySQL error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::TransactionClosed => write!(f, "Transaction already closed"),
        }
    }
}

impl std::error::Error for MysqlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mysql(e) => Some(e),
            _ => None,
        }
    }
}

impl From<mysql_async::Error> for MysqlError {
    fn from(err: mysql_async::Error) -> Self {
        Self::Mysql(err)
    }
}

impl From<mysql_async::UrlError> for MysqlError {
    fn from(err: mysql_async::UrlError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<MysqlError> for poplar_core::Error {
    fn from(err: MysqlError) -> Self {
        match err {
            MysqlError::TransactionClosed => poplar_core::Error::TransactionClosed,
            other => poplar_core::Error::store(other.to_string()),
        }
    }
}
