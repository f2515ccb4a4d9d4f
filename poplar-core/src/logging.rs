//! Logging setup.
//!
//! All Poplar crates log through `tracing`. Nothing is printed unless a
//! subscriber is installed, either by the application or by [`init`] when the
//! `tracing-subscriber` feature is enabled.
//!
//! # Environment Variables
//!
//! - `POPLAR_DEBUG=true` (or `1`, `yes`) - Enable debug logging
//! - `POPLAR_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `POPLAR_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! ```rust,no_run
//! use poplar_core::logging;
//!
//! // Call once at startup.
//! logging::init();
//! ```
//!
//! Passwords never appear in log output; connection URLs are logged through
//! [`mask_url`](crate::config::mask_url).

use crate::config::{EnvSource, StdEnvSource};
use std::sync::Once;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "POPLAR_DEBUG";
const LEVEL_VAR: &str = "POPLAR_LOG_LEVEL";
const FORMAT_VAR: &str = "POPLAR_LOG_FORMAT";

/// Check if debug logging is enabled via `POPLAR_DEBUG`.
pub fn is_debug_enabled() -> bool {
    debug_enabled_in(&StdEnvSource)
}

/// The log level selected by `POPLAR_LOG_LEVEL` and `POPLAR_DEBUG`.
///
/// Defaults to `debug` when debugging is enabled, otherwise `warn`.
pub fn log_level() -> &'static str {
    log_level_in(&StdEnvSource)
}

/// The output format selected by `POPLAR_LOG_FORMAT`.
pub fn log_format() -> &'static str {
    log_format_in(&StdEnvSource)
}

fn debug_enabled_in(env: &dyn EnvSource) -> bool {
    env.get(DEBUG_VAR)
        .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn log_level_in(env: &dyn EnvSource) -> &'static str {
    let fallback = if debug_enabled_in(env) { "debug" } else { "warn" };
    match env.get(LEVEL_VAR).map(|l| l.to_lowercase()).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => fallback,
    }
}

fn log_format_in(env: &dyn EnvSource) -> &'static str {
    match env.get(FORMAT_VAR).map(|f| f.to_lowercase()).as_deref() {
        Some("pretty") => "pretty",
        Some("compact") => "compact",
        _ => "json",
    }
}

/// Install a global subscriber configured from the environment.
///
/// Does nothing unless `POPLAR_DEBUG` or `POPLAR_LOG_LEVEL` is set.
/// Subsequent calls are no-ops.
pub fn init() {
    if !is_debug_enabled() && StdEnvSource.get(LEVEL_VAR).is_none() {
        return;
    }
    init_with_level(log_level());
}

/// Install a global subscriber at `level`, ignoring `POPLAR_LOG_LEVEL`.
///
/// Subsequent calls are no-ops.
pub fn init_with_level(level: &str) {
    INIT.call_once(|| install(level));
}

#[cfg(feature = "tracing-subscriber")]
fn install(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_new(format!(
        "poplar={level},poplar_core={level},poplar_postgres={level},poplar_mysql={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(filter);
    // Another subscriber may already be installed by the application.
    let installed = match log_format() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        "compact" => registry.with(fmt::layer().compact()).try_init(),
        _ => registry.with(fmt::layer().pretty()).try_init(),
    };

    if installed.is_ok() {
        tracing::info!(level = level, format = log_format(), "Poplar logging initialized");
    }
}

#[cfg(not(feature = "tracing-subscriber"))]
fn install(_level: &str) {}
