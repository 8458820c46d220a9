//! Engine configuration

use ferry_bindings::config::PropertyFile;
use ferry_script::HeapConfig;

use crate::error::{RuntimeError, RuntimeResult};

/// Settings for an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Name of the engine thread.
    /// Default: "ferry-engine"
    pub thread_name: String,

    /// Job queue capacity (backpressure threshold for `try_run`).
    /// Default: 1024
    pub queue_capacity: usize,

    /// Allocations between two collections at job boundaries.
    /// Default: 1024
    pub gc_threshold: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thread_name: "ferry-engine".to_string(),
            queue_capacity: 1024,
            gc_threshold: HeapConfig::default().gc_threshold,
        }
    }
}

impl RuntimeConfig {
    pub const THREAD_NAME_KEY: &'static str = "runtime.threadName";
    pub const QUEUE_CAPACITY_KEY: &'static str = "runtime.queueCapacity";
    pub const GC_THRESHOLD_KEY: &'static str = "runtime.gcThreshold";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Minimum is 1.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Minimum is 1.
    pub fn gc_threshold(mut self, threshold: usize) -> Self {
        self.gc_threshold = threshold.max(1);
        self
    }

    /// Read the `runtime.*` entries of a property file, keeping defaults for
    /// missing keys
    pub fn from_properties(properties: &PropertyFile) -> RuntimeResult<Self> {
        let mut config = Self::default();
        if let Some(name) = properties.get(Self::THREAD_NAME_KEY) {
            config = config.thread_name(name);
        }
        if let Some(capacity) = parse_count(properties, Self::QUEUE_CAPACITY_KEY)? {
            config = config.queue_capacity(capacity);
        }
        if let Some(threshold) = parse_count(properties, Self::GC_THRESHOLD_KEY)? {
            config = config.gc_threshold(threshold);
        }
        Ok(config)
    }

    pub fn heap_config(&self) -> HeapConfig {
        HeapConfig {
            gc_threshold: self.gc_threshold,
            ..HeapConfig::default()
        }
    }
}

fn parse_count(properties: &PropertyFile, key: &str) -> RuntimeResult<Option<usize>> {
    properties
        .get(key)
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|_| RuntimeError::invalid_config(key, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.thread_name, "ferry-engine");
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.gc_threshold, 1024);
    }

    #[test]
    fn test_builder_min_values() {
        let config = RuntimeConfig::new().queue_capacity(0).gc_threshold(0);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.gc_threshold, 1);
    }

    #[test]
    fn test_from_properties() {
        let properties = PropertyFile::parse(
            "runtime.threadName = worker\nruntime.queueCapacity: 8\n# runtime.gcThreshold = 1\n",
        );
        let config = RuntimeConfig::from_properties(&properties).unwrap();
        assert_eq!(config.thread_name, "worker");
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.gc_threshold, 1024);
    }

    #[test]
    fn test_from_properties_rejects_garbage() {
        let properties = PropertyFile::parse("runtime.gcThreshold = lots");
        assert_eq!(
            RuntimeConfig::from_properties(&properties).unwrap_err(),
            RuntimeError::invalid_config("runtime.gcThreshold", "lots")
        );
    }
}
