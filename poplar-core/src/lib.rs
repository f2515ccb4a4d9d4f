//! # poplar-core
//!
//! Named database connections, SQL dialects and flattened transactions.
//!
//! This crate provides:
//! - A configuration loader that finds `database.yml` in a list of lookup
//!   directories and renders `env`/`envOr` references before decoding it
//! - A closed [`Dialect`] type for PostgreSQL and MySQL that renders
//!   connection URLs and translates placeholders
//! - [`Connection`]s that open their native store lazily, exactly once
//! - Transactions whose nesting is flattened onto the outermost one
//! - A [`Registry`] mapping connection names to connections
//!
//! Native engines are plugged in through the [`StoreOpener`], [`Store`] and
//! [`TransactionStore`] traits.
//!
//! ## Dialects
//!
//! ```rust
//! use poplar_core::config::ConnectionDetails;
//! use poplar_core::{Dialect, DialectKind};
//!
//! let details = ConnectionDetails::from_url("mysql://root:root@db:3307/app", 3306).unwrap();
//! let dialect = Dialect::new(details).unwrap();
//!
//! assert_eq!(dialect.kind(), DialectKind::MySql);
//! assert_eq!(dialect.details().port, Some(3307));
//! assert_eq!(dialect.begin_statement(), "START TRANSACTION");
//! ```
//!
//! ## Errors
//!
//! ```rust
//! use poplar_core::Error;
//!
//! let err = Error::ConnectionNotFound("production".into());
//! assert!(err.is_not_found());
//! ```

pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod logging;
pub mod registry;
pub mod store;
pub mod transaction;
pub mod value;

pub use config::{ConfigLoader, ConnectionDetails};
pub use connection::Connection;
pub use dialect::{Dialect, DialectKind};
pub use error::{Error, Result};
pub use registry::{Registry, DEFAULT_CONNECTION};
pub use store::{Store, StoreOpener, TransactionStore};
pub use value::Value;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::config::{ConfigLoader, ConnectionDetails, EnvSource, MapEnvSource};
    pub use crate::connection::Connection;
    pub use crate::dialect::{Dialect, DialectKind};
    pub use crate::error::{Error, Result};
    pub use crate::registry::Registry;
    pub use crate::store::{Store, StoreOpener, TransactionStore};
    pub use crate::value::Value;
}
