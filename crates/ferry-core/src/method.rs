//! Callable capabilities

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::BridgeResult;
use crate::value::Value;

/// Shared handle to any method
pub type MethodRef = Arc<dyn Method>;

/// A callable entity
pub trait Method: Send + Sync + 'static {
    /// Invoke with positional arguments
    fn call(&self, args: &[Value]) -> BridgeResult<Value>;

    fn type_name(&self) -> &str {
        "Method"
    }

    fn equals(&self, other: &dyn Method) -> bool {
        std::ptr::addr_eq(self as *const Self, other as *const dyn Method)
    }

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

/// Signature of a native method body
pub type NativeFn = dyn Fn(&[Value]) -> BridgeResult<Value> + Send + Sync;

/// A method backed by a Rust closure
pub struct NativeMethod {
    name: String,
    body: Box<NativeFn>,
}

impl NativeMethod {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> BridgeResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    /// Wrap a closure directly into a shared [`MethodRef`]
    pub fn shared<F>(name: impl Into<String>, body: F) -> MethodRef
    where
        F: Fn(&[Value]) -> BridgeResult<Value> + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, body))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Method for NativeMethod {
    fn call(&self, args: &[Value]) -> BridgeResult<Value> {
        trace!(method = %self.name, argc = args.len(), "native call");
        (self.body)(args)
    }

    fn type_name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

impl fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeMethod")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
