//! Error types for connection, configuration and transaction handling.
//!
//! Every failure in this crate is returned as an [`Error`] value; nothing here
//! panics or terminates the process.
//!
//! ```rust
//! use poplar_core::Error;
//!
//! let err = Error::ConnectionNotFound("staging".into());
//! assert!(err.is_not_found());
//! assert!(err.to_string().contains("staging"));
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Poplar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading configuration, resolving connections
/// or running transactions.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file exists but could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration template could not be rendered.
    #[error("configuration template error on line {line}: {message}")]
    Template {
        /// 1-based line of the offending action.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// The rendered configuration is not a valid mapping of connection details.
    #[error("failed to decode configuration: {0}")]
    ConfigDecode(#[from] serde_yaml::Error),

    /// No connection is registered under the requested name.
    #[error("could not find connection named {0}")]
    ConnectionNotFound(String),

    /// The engine tag does not name a supported dialect.
    #[error("unsupported dialect: {0:?}")]
    UnsupportedDialect(String),

    /// A connection URL is not a valid URI.
    #[error("invalid connection URL: {source}")]
    UrlParse {
        /// Offending URL, with any password masked.
        url: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// The dialect is known but its native driver was not compiled in.
    #[error("no native driver available for dialect {0}")]
    DriverUnavailable(String),

    /// The native store reported a failure.
    #[error("store error: {0}")]
    Store(String),

    /// The transaction was already committed or rolled back.
    #[error("transaction already closed")]
    TransactionClosed,
}

impl Error {
    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create a template error.
    pub fn template(line: usize, message: impl Into<String>) -> Self {
        Self::Template {
            line,
            message: message.into(),
        }
    }

    /// Check if this is a connection-not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ConnectionNotFound(_))
    }

    /// Check if this error came from a malformed or unreadable configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Template { .. } | Self::ConfigDecode(_)
        )
    }
}
