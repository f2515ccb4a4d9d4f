//! Named connection registry.

use crate::config::{ConfigLoader, ConnectionDetails};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::store::StoreOpener;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Connection name used when none is given.
pub const DEFAULT_CONNECTION: &str = "development";

/// Maps connection names to top-level connections.
///
/// Connections are installed by loading the configuration file; every load
/// replaces same-named entries and leaves the others in place.
///
/// ```rust,no_run
/// use poplar_core::{Registry, StoreOpener};
/// use std::sync::Arc;
///
/// # async fn run(opener: Arc<dyn StoreOpener>) -> poplar_core::Result<()> {
/// let registry = Registry::new(opener);
/// registry.load_config()?;
///
/// let conn = registry.connect("test").await?;
/// println!("connected to {conn}");
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    loader: ConfigLoader,
    opener: Arc<dyn StoreOpener>,
    load_lock: Mutex<()>,
    loaded: AtomicBool,
}

impl Registry {
    /// Create an empty registry using the default configuration loader.
    pub fn new(opener: Arc<dyn StoreOpener>) -> Self {
        Self::with_loader(ConfigLoader::new(), opener)
    }

    /// Create an empty registry with a custom configuration loader.
    pub fn with_loader(loader: ConfigLoader, opener: Arc<dyn StoreOpener>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            loader,
            opener,
            load_lock: Mutex::new(()),
            loaded: AtomicBool::new(false),
        }
    }

    /// The configuration loader.
    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    /// Load the configuration file and install its connections.
    ///
    /// Returns the path that was loaded, or `None` when no configuration file
    /// exists. Every entry is turned into a connection before any is
    /// installed, so one bad entry leaves the registry untouched.
    pub fn load_config(&self) -> Result<Option<PathBuf>> {
        let _guard = self.load_lock.lock();
        self.load_locked()
    }

    /// Load the configuration unless a load already succeeded.
    ///
    /// Concurrent first callers wait for a single load and then share its
    /// connections.
    pub fn ensure_loaded(&self) -> Result<()> {
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.load_lock.lock();
        if self.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        self.load_locked().map(|_| ())
    }

    fn load_locked(&self) -> Result<Option<PathBuf>> {
        let Some(config) = self.loader.load()? else {
            self.loaded.store(true, Ordering::Release);
            return Ok(None);
        };

        let mut built = Vec::with_capacity(config.connections.len());
        for (name, details) in config.connections {
            let conn = Connection::new(details, Arc::clone(&self.opener)).inspect_err(|err| {
                warn!(connection = %name, error = %err, "Invalid connection in configuration");
            })?;
            built.push((name, Arc::new(conn)));
        }

        let count = built.len();
        self.connections.write().extend(built);
        self.loaded.store(true, Ordering::Release);

        info!(path = %config.path.display(), connections = count, "Configuration loaded");
        Ok(Some(config.path))
    }

    /// Prepend lookup directories and reload.
    pub fn add_lookup_paths<I, P>(&self, paths: I) -> Result<Option<PathBuf>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.loader.add_lookup_paths(paths);
        debug!(lookup_paths = ?self.loader.lookup_paths(), "Lookup paths updated");
        self.load_config()
    }

    /// Snapshot of the lookup directories, in search order.
    pub fn lookup_paths(&self) -> Vec<PathBuf> {
        self.loader.lookup_paths()
    }

    /// Build a connection from `details` and install it under `name`.
    pub fn register(
        &self,
        name: impl Into<String>,
        details: ConnectionDetails,
    ) -> Result<Arc<Connection>> {
        let conn = Arc::new(Connection::new(details, Arc::clone(&self.opener))?);
        self.connections
            .write()
            .insert(name.into(), Arc::clone(&conn));
        Ok(conn)
    }

    /// Registered connection names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.connections.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up a connection without opening it.
    ///
    /// An empty name means `development`.
    pub fn resolve(&self, name: &str) -> Result<Arc<Connection>> {
        let name = if name.is_empty() { DEFAULT_CONNECTION } else { name };
        self.connections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ConnectionNotFound(name.to_string()))
    }

    /// Look up a connection and open its store.
    ///
    /// An empty name means `development`.
    pub async fn connect(&self, name: &str) -> Result<Arc<Connection>> {
        let conn = self.resolve(name)?;
        conn.open().await?;
        Ok(conn)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("connections", &self.names())
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapEnvSource;
    use crate::store::mock::{MockOpener, Recorder};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use std::sync::Barrier;
    use tempfile::TempDir;

    fn registry(dir: &Path, rec: &Arc<Recorder>) -> Registry {
        let loader = ConfigLoader::new()
            .with_base_dir(dir)
            .with_env_source(MapEnvSource::new());
        Registry::with_loader(loader, Arc::new(MockOpener::new(Arc::clone(rec))))
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_installs_connections() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "config/database.yml",
            "development:\n  dialect: postgres\n  database: dev\ntest:\n  url: mysql://root@localhost/test\n",
        );
        let rec = Arc::new(Recorder::default());
        let registry = registry(dir.path(), &rec);

        let path = registry.load_config().unwrap().unwrap();
        assert_eq!(path, dir.path().join("config").join("database.yml"));
        assert_eq!(registry.names(), vec!["development".to_string(), "test".to_string()]);

        let dev = registry.resolve("").unwrap();
        assert_eq!(dev.url(), "postgres://localhost:5432/dev?sslmode=disable");
        let test = registry.resolve("test").unwrap();
        assert_eq!(test.url(), "mysql://root@localhost/test");
    }

    #[test]
    fn test_missing_config_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let rec = Arc::new(Recorder::default());
        let registry = registry(dir.path(), &rec);

        assert_eq!(registry.load_config().unwrap(), None);
        assert!(registry.names().is_empty());
        assert!(registry.resolve("development").unwrap_err().is_not_found());
    }

    #[test]
    fn test_bad_entry_installs_nothing() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "database.yml",
            "a:\n  dialect: postgres\nb:\n  dialect: oracle\n",
        );
        let rec = Arc::new(Recorder::default());
        let registry = registry(dir.path(), &rec);

        let err = registry.load_config().unwrap_err();
        assert!(matches!(err, Error::UnsupportedDialect(_)));
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_malformed_config_propagates() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "database.yml", "a: {{ env }}\n");
        let rec = Arc::new(Recorder::default());
        let registry = registry(dir.path(), &rec);

        assert!(registry.load_config().unwrap_err().is_config_error());
        assert!(registry.ensure_loaded().is_err());
    }

    #[test]
    fn test_add_lookup_paths_reloads() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "database.yml", "development:\n  dialect: postgres\n  database: base\n");
        write(dir.path(), "alt/database.yml", "development:\n  dialect: mysql\n  database: alt\n");
        let rec = Arc::new(Recorder::default());
        let registry = registry(dir.path(), &rec);

        registry.load_config().unwrap();
        let before = registry.resolve("development").unwrap();
        assert_eq!(before.dialect().details().database, "base");

        let path = registry.add_lookup_paths(["alt"]).unwrap().unwrap();
        assert_eq!(path, dir.path().join("alt").join("database.yml"));
        assert_eq!(registry.lookup_paths()[0], PathBuf::from("alt"));

        let after = registry.resolve("development").unwrap();
        assert_eq!(after.dialect().details().database, "alt");
        assert_ne!(before.id(), after.id());
    }

    #[test]
    fn test_ensure_loaded_loads_once() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "database.yml", "development:\n  dialect: postgres\n");
        let rec = Arc::new(Recorder::default());
        let registry = registry(dir.path(), &rec);

        registry.ensure_loaded().unwrap();
        let first = registry.resolve("").unwrap();
        registry.ensure_loaded().unwrap();
        let second = registry.resolve("").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_load_shares_connections() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "database.yml", "development:\n  dialect: postgres\n");

        for _ in 0..50 {
            let rec = Arc::new(Recorder::default());
            let registry = registry(dir.path(), &rec);
            let barrier = Barrier::new(4);

            let conns: Vec<Arc<Connection>> = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..4)
                    .map(|_| {
                        scope.spawn(|| {
                            barrier.wait();
                            registry.ensure_loaded().unwrap();
                            registry.resolve("").unwrap()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            for conn in &conns[1..] {
                assert!(Arc::ptr_eq(&conns[0], conn));
            }

            let registry = Arc::new(registry);
            let tasks: Vec<_> = (0..4)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    tokio::spawn(async move { registry.connect("").await.map(|_| ()) })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }
            assert_eq!(rec.opens(), 1);
        }
    }

    #[tokio::test]
    async fn test_connect_opens_store() {
        let dir = TempDir::new().unwrap();
        let rec = Arc::new(Recorder::default());
        let registry = registry(dir.path(), &rec);
        registry
            .register("development", ConnectionDetails::new("postgres"))
            .unwrap();

        let conn = registry.connect("").await.unwrap();
        assert!(conn.is_open());

        let again = registry.connect("development").await.unwrap();
        assert!(Arc::ptr_eq(&conn, &again));
        assert_eq!(rec.opens(), 1);
    }

    #[tokio::test]
    async fn test_connect_unknown_name() {
        let dir = TempDir::new().unwrap();
        let rec = Arc::new(Recorder::default());
        let registry = registry(dir.path(), &rec);

        let err = registry.connect("nonexistent").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "could not find connection named nonexistent");
        assert_eq!(rec.opens(), 0);
    }
}
