//! Host object hooks
//!
//! Embedders expose their own entities to scripts by implementing
//! [`HostObject`]. The runtime stores the host object in a cell and routes
//! every property access and call on that cell through the trait. Host
//! objects are opaque to the collector: values they hold natively are not
//! traced.

use std::any::Any;
use std::sync::Arc;

use crate::context::ScriptContext;
use crate::error::{ScriptError, ScriptResult};
use crate::value::{CellRef, ScriptValue};

/// Body of a function cell: `(context, this, arguments)`
pub type HostFn =
    Arc<dyn Fn(&ScriptContext, Option<CellRef>, &[ScriptValue]) -> ScriptResult<ScriptValue> + Send + Sync>;

pub trait HostObject: Send + Sync + 'static {
    /// Class name reported by `type_of_cell` and in error messages
    fn class_name(&self) -> &str;

    fn get(&self, ctx: &ScriptContext, name: &str) -> ScriptResult<ScriptValue>;

    fn set(&self, ctx: &ScriptContext, name: &str, value: ScriptValue) -> ScriptResult<()>;

    fn has(&self, ctx: &ScriptContext, name: &str) -> bool {
        self.get(ctx, name).is_ok_and(|v| !v.is_undefined())
    }

    fn delete(&self, _ctx: &ScriptContext, name: &str) -> ScriptResult<bool> {
        Err(ScriptError::type_error(format!(
            "cannot delete property '{}' of {}",
            name,
            self.class_name()
        )))
    }

    fn property_names(&self, ctx: &ScriptContext) -> Vec<String>;

    fn is_callable(&self) -> bool {
        false
    }

    fn call(
        &self,
        _ctx: &ScriptContext,
        _this: Option<CellRef>,
        _args: &[ScriptValue],
    ) -> ScriptResult<ScriptValue> {
        Err(ScriptError::type_error(format!(
            "{} is not a function",
            self.class_name()
        )))
    }

    fn as_any(&self) -> &dyn Any;

    /// Outside memory owned by this object, charged to the heap when the
    /// object is allocated
    fn extra_memory_cost(&self) -> usize {
        0
    }
}
