//! Error types for the script heap
//!
//! Exceptions raised by script code (or by host functions on its behalf) are
//! carried as [`ScriptError::Thrown`] with the exception's name and message.
//! The remaining variants describe misuse of the embedding API.

use thiserror::Error;

/// Result type alias for script operations
pub type ScriptResult<T> = Result<T, ScriptError>;

/// A script exception
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    /// Exception class, e.g. `TypeError` or `RangeError`
    pub name: String,
    pub message: String,
}

impl Exception {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Structured error types for script operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScriptError {
    /// An exception thrown inside the runtime
    #[error("{}: {}", .0.name, .0.message)]
    Thrown(Exception),

    /// An operation was applied to a value of the wrong kind
    #[error("TypeError: {0}")]
    TypeError(String),

    /// The cell a handle refers to has been collected
    #[error("Stale handle: cell {index} (generation {generation}) no longer exists")]
    StaleHandle { index: u32, generation: u32 },

    /// A script-observable operation was attempted off the owning thread
    #[error("Context is owned by thread {owner}, accessed from {current}")]
    WrongThread { owner: String, current: String },

    /// Internal/unexpected error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScriptError {
    /// Create a thrown exception
    pub fn thrown(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Thrown(Exception::new(name, message))
    }

    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is visible to script code as an exception
    pub fn is_script_error(&self) -> bool {
        matches!(self, Self::Thrown(_) | Self::TypeError(_))
    }

    /// Get the error type name (e.g., "TypeError", "RangeError")
    pub fn error_type(&self) -> &str {
        match self {
            Self::Thrown(exception) => &exception.name,
            Self::TypeError(_) => "TypeError",
            Self::StaleHandle { .. } => "StaleHandleError",
            Self::WrongThread { .. } => "WrongThreadError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Message without the type prefix
    pub fn message(&self) -> String {
        match self {
            Self::Thrown(exception) => exception.message.clone(),
            Self::TypeError(message) => message.clone(),
            other => other.to_string(),
        }
    }
}
