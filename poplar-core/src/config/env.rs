//! Environment variable sources for the configuration template pass.

use std::collections::HashMap;
use std::fmt;

/// Source for environment variables.
pub trait EnvSource: Send + Sync {
    /// Get an environment variable value.
    fn get(&self, name: &str) -> Option<String>;

    /// Check if a variable exists.
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get a variable, treating an unset or empty value as missing.
    fn get_non_empty(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.is_empty())
    }
}

/// Default environment source using std::env.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Environment source backed by a HashMap.
///
/// Used to feed fixed variables to a loader without touching the process
/// environment.
#[derive(Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    /// Create a new map-based environment source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Add multiple variables.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars.extend(vars);
        self
    }
}

impl fmt::Debug for MapEnvSource {
    // Values may hold credentials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.vars.keys().collect();
        names.sort();
        f.debug_struct("MapEnvSource").field("vars", &names).finish()
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

impl<S: EnvSource + ?Sized> EnvSource for std::sync::Arc<S> {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_env_source() {
        let env = MapEnvSource::new()
            .set("DB_HOST", "db.internal")
            .set("DB_PASSWORD", "");

        assert_eq!(env.get("DB_HOST").as_deref(), Some("db.internal"));
        assert!(env.contains("DB_PASSWORD"));
        assert_eq!(env.get_non_empty("DB_PASSWORD"), None);
        assert_eq!(env.get("MISSING"), None);
    }

    #[test]
    fn test_with_vars() {
        let mut vars = HashMap::new();
        vars.insert("A".to_string(), "1".to_string());
        vars.insert("B".to_string(), "2".to_string());

        let env = MapEnvSource::new().set("C", "3").with_vars(vars);
        assert_eq!(env.get("A").as_deref(), Some("1"));
        assert_eq!(env.get("C").as_deref(), Some("3"));
    }

    #[test]
    fn test_debug_hides_values() {
        let env = MapEnvSource::new().set("DB_PASSWORD", "hunter2");
        let rendered = format!("{env:?}");
        assert!(rendered.contains("DB_PASSWORD"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_std_env_source_missing() {
        assert_eq!(
            StdEnvSource.get("POPLAR_TEST_SURELY_UNSET_VARIABLE_1234"),
            None
        );
    }
}
