//! Locating, rendering and decoding the configuration file.

use super::details::ConnectionDetails;
use super::env::{EnvSource, StdEnvSource};
use super::template;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "database.yml";

/// Default lookup directories, highest priority first.
pub const DEFAULT_LOOKUP_PATHS: [&str; 6] = ["", "config", "..", "../config", "../..", "../../config"];

/// A configuration file that was found and decoded.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path of the file that was read.
    pub path: PathBuf,
    /// Decoded entries keyed by connection name.
    pub connections: BTreeMap<String, ConnectionDetails>,
}

/// Finds `database.yml` in an ordered list of directories and decodes it.
///
/// Relative lookup directories are resolved against the base directory,
/// which defaults to the process working directory.
///
/// ```rust,no_run
/// use poplar_core::config::ConfigLoader;
///
/// let loader = ConfigLoader::new().with_file_name("connections.yml");
/// if let Some(config) = loader.load()? {
///     for name in config.connections.keys() {
///         println!("{name}");
///     }
/// }
/// # Ok::<(), poplar_core::Error>(())
/// ```
pub struct ConfigLoader {
    lookup_paths: Mutex<Vec<PathBuf>>,
    file_name: String,
    base_dir: Option<PathBuf>,
    env: Arc<dyn EnvSource>,
}

impl ConfigLoader {
    /// Create a loader with the default file name, lookup paths and the
    /// process environment.
    pub fn new() -> Self {
        Self {
            lookup_paths: Mutex::new(DEFAULT_LOOKUP_PATHS.iter().map(PathBuf::from).collect()),
            file_name: CONFIG_FILE_NAME.to_string(),
            base_dir: None,
            env: Arc::new(StdEnvSource),
        }
    }

    /// Use a different configuration file name.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Replace the lookup directories.
    pub fn with_lookup_paths<I, P>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        *self.lookup_paths.lock() = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Resolve relative lookup directories against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Read template variables from `env`.
    pub fn with_env_source(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// The configuration file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Snapshot of the lookup directories, in search order.
    pub fn lookup_paths(&self) -> Vec<PathBuf> {
        self.lookup_paths.lock().clone()
    }

    /// Prepend directories to the search list, keeping their relative order.
    pub fn add_lookup_paths<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut current = self.lookup_paths.lock();
        let mut updated: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        updated.extend(current.drain(..));
        *current = updated;
    }

    /// The first candidate path that exists, in lookup order.
    pub fn find(&self) -> Option<PathBuf> {
        let paths = self.lookup_paths();
        paths
            .iter()
            .map(|dir| self.candidate(dir))
            .find(|path| path.is_file())
    }

    fn candidate(&self, dir: &Path) -> PathBuf {
        let path = dir.join(&self.file_name);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    /// Find, render and decode the configuration file.
    ///
    /// Returns `Ok(None)` when no candidate exists. A file that exists but
    /// cannot be read, rendered or decoded is an error.
    pub fn load(&self) -> Result<Option<LoadedConfig>> {
        let Some(path) = self.find() else {
            debug!(
                file_name = %self.file_name,
                "No configuration file found in lookup paths"
            );
            return Ok(None);
        };

        info!(path = %path.display(), "Loading configuration");
        let connections = self.load_from(&path)?;
        debug!(
            path = %path.display(),
            connections = connections.len(),
            "Configuration decoded"
        );

        Ok(Some(LoadedConfig { path, connections }))
    }

    /// Read, render and decode a specific file.
    pub fn load_from(&self, path: &Path) -> Result<BTreeMap<String, ConnectionDetails>> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rendered = template::render(&raw, self.env.as_ref())?;
        decode(&rendered)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("lookup_paths", &*self.lookup_paths.lock())
            .field("file_name", &self.file_name)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

/// Decode rendered configuration text.
pub fn decode(text: &str) -> Result<BTreeMap<String, ConnectionDetails>> {
    let blank = text
        .lines()
        .map(str::trim)
        .all(|l| l.is_empty() || l.starts_with('#') || l == "---");
    if blank {
        return Ok(BTreeMap::new());
    }
    Ok(serde_yaml::from_str(text)?)
}
