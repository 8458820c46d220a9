//! Error types for ferry-runtime
//!
//! Wraps the bridge and script errors and adds engine failures.

use ferry_core::BridgeError;
use ferry_script::ScriptError;
use ferry_script_bridge::bridge_error;
use thiserror::Error;

/// Errors that can occur while driving the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Object protocol error
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Script runtime error
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The engine thread has stopped
    #[error("Engine shut down")]
    ShutDown,

    /// `try_run` found the job queue full
    #[error("Job queue full (capacity {0})")]
    QueueFull(usize),

    /// The job panicked on the engine thread; the engine keeps running
    #[error("Job panicked: {0}")]
    JobPanicked(String),

    /// The engine dropped a job without answering it
    #[error("Engine dropped response")]
    DroppedResponse,

    /// The engine thread could not be started
    #[error("Failed to spawn engine thread: {0}")]
    Spawn(String),

    /// A configuration entry could not be parsed
    #[error("Invalid configuration value for '{key}': '{value}'")]
    InvalidConfig { key: String, value: String },
}

impl RuntimeError {
    pub fn invalid_config(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Marshaled calls surface engine failures through the object protocol
impl From<RuntimeError> for BridgeError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::Bridge(e) => e,
            RuntimeError::Script(e) => bridge_error(e),
            other => BridgeError::native(other.to_string()),
        }
    }
}

/// Result type alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_passes_through() {
        let original = BridgeError::native("boom");
        let back: BridgeError = RuntimeError::from(original.clone()).into();
        assert_eq!(back, original);
    }

    #[test]
    fn test_script_error_is_translated() {
        let err: BridgeError = RuntimeError::from(ScriptError::thrown("RangeError", "x")).into();
        assert_eq!(err, BridgeError::foreign("script", "RangeError", "x"));
    }

    #[test]
    fn test_engine_failure_becomes_native_error() {
        let err: BridgeError = RuntimeError::ShutDown.into();
        assert_eq!(err, BridgeError::native("Engine shut down"));
    }
}
