//! Configuration file loading.
//!
//! Connections are declared in a YAML file (default `database.yml`) that maps
//! a connection name to its details:
//!
//! ```yaml
//! development:
//!   dialect: postgres
//!   database: app_development
//!   host: {{ envOr "PG_HOST" "localhost" }}
//!   user: postgres
//!
//! test:
//!   url: {{ envOr("TEST_DATABASE_URL", "mysql://root@localhost:3306/app_test") }}
//! ```
//!
//! The file is searched for in an ordered list of directories, rendered
//! through a small `env`/`envOr` template pass and then decoded.

mod details;
mod env;
mod loader;
mod template;

pub use details::{mask_url, ConnectionDetails, DEFAULT_HOST};
pub use env::{EnvSource, MapEnvSource, StdEnvSource};
pub use loader::{decode, ConfigLoader, LoadedConfig, CONFIG_FILE_NAME, DEFAULT_LOOKUP_PATHS};
pub use template::render;

pub(crate) use details::percent_encode;
