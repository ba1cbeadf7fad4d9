//! Runtime settings.
//!
//! [`Settings`] is the free-form key/value map exchanged with any runtime.
//! [`RuntimeSettings`] is the typed view the bundled [`TcpRuntime`] reads.
//!
//! [`TcpRuntime`]: crate::runtime::TcpRuntime

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RuntimeError;

/// Free-form runtime settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Copy every key of `other` that is not already set here.
    pub fn fill_from(&mut self, other: &Settings) {
        for (key, value) in &other.0 {
            if !self.0.contains_key(key) {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }

    /// Overwrite with every key of `other`.
    pub fn apply(&mut self, other: Settings) {
        self.0.extend(other.0);
    }

    /// Layer sources; a key set by an earlier source is never overwritten.
    pub fn layered<'a>(sources: impl IntoIterator<Item = &'a Settings>) -> Settings {
        let mut merged = Settings::new();
        for source in sources {
            merged.fill_from(source);
        }
        merged
    }

    /// Internal defaults used by the router's `start`.
    pub fn defaults() -> Settings {
        Self::from_typed(&RuntimeSettings::default())
    }

    fn from_typed(typed: &RuntimeSettings) -> Settings {
        match serde_json::to_value(typed) {
            Ok(Value::Object(map)) => Settings(map),
            _ => Settings::new(),
        }
    }
}

impl FromIterator<(String, Value)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Settings(iter.into_iter().collect())
    }
}

/// Typed settings for the bundled runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Event workers accepting connections.
    pub worker_num: usize,
    /// Task workers consuming dispatched tasks.
    pub task_worker_num: usize,
    /// Maximum concurrent connections (backpressure).
    pub max_connection: usize,
    /// Read buffer per raw connection, in bytes.
    pub buffer_size: usize,
    /// Largest accepted HTTP request body, in bytes.
    pub package_max_length: usize,
    /// Serve HTTP even without a request listener.
    pub open_http_protocol: bool,
    /// Translate SIGINT/SIGTERM/SIGHUP into shutdown and reload.
    pub handle_signals: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            worker_num: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            task_worker_num: 0,
            max_connection: 10_000,
            buffer_size: 64 * 1024,
            package_max_length: 2 * 1024 * 1024, // 2MB
            open_http_protocol: false,
            handle_signals: true,
        }
    }
}

impl RuntimeSettings {
    /// Read the typed view, validating value ranges.
    pub fn from_settings(settings: &Settings) -> Result<Self, RuntimeError> {
        let typed: RuntimeSettings = serde_json::from_value(Value::Object(settings.0.clone()))
            .map_err(|e| RuntimeError::Settings(e.to_string()))?;
        typed.validate()?;
        Ok(typed)
    }

    fn validate(&self) -> Result<(), RuntimeError> {
        if self.worker_num == 0 {
            return Err(RuntimeError::Settings("worker_num must be at least 1".into()));
        }
        if self.max_connection == 0 {
            return Err(RuntimeError::Settings("max_connection must be at least 1".into()));
        }
        if self.buffer_size == 0 {
            return Err(RuntimeError::Settings("buffer_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn earlier_source_wins() {
        let existing = Settings::new().with("worker_num", 4);
        let explicit = Settings::new().with("worker_num", 8).with("task_worker_num", 2);
        let defaults = Settings::new()
            .with("worker_num", 1)
            .with("task_worker_num", 0)
            .with("buffer_size", 1024);

        let merged = Settings::layered([&existing, &explicit, &defaults]);

        assert_eq!(merged.get("worker_num"), Some(&json!(4)));
        assert_eq!(merged.get("task_worker_num"), Some(&json!(2)));
        assert_eq!(merged.get("buffer_size"), Some(&json!(1024)));
    }

    #[test]
    fn apply_overwrites() {
        let mut current = Settings::new().with("worker_num", 4);
        current.apply(Settings::new().with("worker_num", 2));
        assert_eq!(current.get("worker_num"), Some(&json!(2)));
    }

    #[test]
    fn defaults_round_trip_to_typed() {
        let typed = RuntimeSettings::from_settings(&Settings::defaults()).unwrap();
        assert_eq!(typed, RuntimeSettings::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let settings = Settings::new().with("daemonize", true).with("worker_num", 3);
        let typed = RuntimeSettings::from_settings(&settings).unwrap();
        assert_eq!(typed.worker_num, 3);
    }

    #[test]
    fn rejects_zero_workers() {
        let settings = Settings::new().with("worker_num", 0);
        assert!(matches!(
            RuntimeSettings::from_settings(&settings),
            Err(RuntimeError::Settings(_))
        ));
    }

    #[test]
    fn rejects_wrong_types() {
        let settings = Settings::new().with("worker_num", "many");
        assert!(RuntimeSettings::from_settings(&settings).is_err());
    }
}
