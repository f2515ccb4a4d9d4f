//! # poplar-postgres
//!
//! PostgreSQL store for Poplar connections.
//!
//! This crate provides:
//! - [`PgStore`], a [`poplar_core::Store`] over a `deadpool-postgres` pool
//! - [`PgTransaction`], a transaction pinned to one pooled session
//! - Conversion of [`poplar_core::Value`] parameters
//!
//! ## Example
//!
//! ```rust,ignore
//! use poplar_core::Store;
//! use poplar_postgres::PgStore;
//!
//! let store = PgStore::connect("postgres://postgres@localhost:5432/app?sslmode=disable").await?;
//! let rows = store.execute("DELETE FROM sessions WHERE expired", &[]).await?;
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::{PgError, PgResult};
pub use store::{PgStore, PgTransaction};
