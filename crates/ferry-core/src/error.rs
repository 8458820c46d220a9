//! Error types for the value bridge
//!
//! Every failure that can surface through the object protocol is a
//! [`BridgeError`]. Foreign runtimes translate their own exceptions into
//! [`BridgeError::ForeignRuntime`] at the adapter boundary, so no
//! runtime-specific error type ever reaches native code.

use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Structured error kinds for the object protocol
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    /// `set` on a reserved or read-only name
    #[error("Property '{name}' of {object_type} cannot be set: {reason}")]
    PropertyRejected {
        object_type: String,
        name: String,
        reason: String,
    },

    /// A strict accessor was used against a value of another type
    #[error("Type error: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// `call_ns` resolved to something that is not a method
    #[error("Cannot call '{path}': resolved to {actual}, not a method")]
    CallTargetInvalid { path: String, actual: &'static str },

    /// `set_ns` walked through a hop that is missing or not an object
    #[error("Cannot set '{path}': '{segment}' is missing or not an object")]
    MissingIntermediate { path: String, segment: String },

    /// An error raised inside a foreign runtime
    #[error("{runtime} {name}: {message}")]
    ForeignRuntime {
        runtime: String,
        name: String,
        message: String,
    },

    /// A native method body signalled failure
    #[error("{0}")]
    NativeInvocation(String),

    /// Arguments did not match a method's declared signature
    #[error("{method}: {message}")]
    InvalidArguments { method: String, message: String },

    /// I/O failure while loading or saving bridge-visible state
    #[error("I/O error: {0}")]
    Io(String),
}

impl BridgeError {
    /// Create a property rejection error
    pub fn property_rejected(
        object_type: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::PropertyRejected {
            object_type: object_type.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: &'static str, actual: &'static str) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    /// Create an error for a failed native method body
    pub fn native(message: impl Into<String>) -> Self {
        Self::NativeInvocation(message.into())
    }

    /// Create an error carrying a foreign runtime's exception
    pub fn foreign(
        runtime: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ForeignRuntime {
            runtime: runtime.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an argument verification error
    pub fn invalid_arguments(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Stable name of the error kind, used when the error is re-raised
    /// inside a foreign runtime
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PropertyRejected { .. } => "PropertyRejected",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::CallTargetInvalid { .. } => "CallTargetInvalid",
            Self::MissingIntermediate { .. } => "MissingIntermediate",
            Self::ForeignRuntime { .. } => "ForeignRuntimeError",
            Self::NativeInvocation(_) => "NativeInvocationError",
            Self::InvalidArguments { .. } => "InvalidArguments",
            Self::Io(_) => "IOError",
        }
    }

    /// Message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            Self::ForeignRuntime { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
