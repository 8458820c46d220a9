//! Error translation at the script boundary
//!
//! Script exceptions become [`BridgeError::ForeignRuntime`] on the native
//! side; bridge errors become thrown exceptions on the script side. An error
//! that crosses the boundary twice comes back with its original name and
//! message.

use ferry_core::{BridgeError, BridgeResult};
use ferry_script::{ScriptError, ScriptResult};

/// Runtime name recorded in [`BridgeError::ForeignRuntime`]
pub const RUNTIME_NAME: &str = "script";

/// Translate a script error for native callers
pub fn bridge_error(err: ScriptError) -> BridgeError {
    match err {
        ScriptError::Thrown(exception) => {
            BridgeError::foreign(RUNTIME_NAME, exception.name, exception.message)
        }
        other => BridgeError::foreign(RUNTIME_NAME, other.error_type(), other.message()),
    }
}

/// Translate a bridge error into an exception thrown inside the runtime
pub fn script_error(err: BridgeError) -> ScriptError {
    match err {
        BridgeError::ForeignRuntime {
            runtime,
            name,
            message,
        } if runtime == RUNTIME_NAME => {
            if name == "TypeError" {
                ScriptError::TypeError(message)
            } else {
                ScriptError::thrown(name, message)
            }
        }
        other => ScriptError::thrown(other.kind(), other.message()),
    }
}

/// Map a script result onto the bridge error type
pub trait IntoBridge<T> {
    fn into_bridge(self) -> BridgeResult<T>;
}

impl<T> IntoBridge<T> for ScriptResult<T> {
    fn into_bridge(self) -> BridgeResult<T> {
        self.map_err(bridge_error)
    }
}

/// Map a bridge result onto the script error type
pub trait IntoScript<T> {
    fn into_script(self) -> ScriptResult<T>;
}

impl<T> IntoScript<T> for BridgeResult<T> {
    fn into_script(self) -> ScriptResult<T> {
        self.map_err(script_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thrown_round_trip() {
        let original = ScriptError::thrown("RangeError", "index 9 out of range");
        let native = bridge_error(original.clone());
        assert_eq!(
            native,
            BridgeError::foreign("script", "RangeError", "index 9 out of range")
        );
        assert_eq!(script_error(native), original);
    }

    #[test]
    fn test_type_error_round_trip() {
        let original = ScriptError::type_error("x is not a function");
        assert_eq!(script_error(bridge_error(original.clone())), original);
    }

    #[test]
    fn test_native_error_becomes_exception() {
        let err = script_error(BridgeError::property_rejected(
            "Dependency",
            "resolvedPath",
            "read-only",
        ));
        assert_eq!(err.error_type(), "PropertyRejected");
        assert_eq!(
            err.message(),
            "Property 'resolvedPath' of Dependency cannot be set: read-only"
        );
    }

    #[test]
    fn test_other_runtime_errors_are_not_unwrapped() {
        let err = script_error(BridgeError::foreign("lua", "error", "bad"));
        assert_eq!(err.error_type(), "ForeignRuntimeError");
        assert_eq!(err.message(), "bad");
    }

    #[test]
    fn test_embedding_errors_keep_their_kind() {
        let native = bridge_error(ScriptError::internal("heap poisoned"));
        assert!(matches!(
            native,
            BridgeError::ForeignRuntime { ref name, .. } if name == "InternalError"
        ));
    }
}
