//! Native entities as script host objects

use std::any::Any;

use ferry_core::logging::object_span;
use ferry_core::{List, ListRef, Method, MethodRef, Object, ObjectRef, Value};
use ferry_core::list::parse_index;
use ferry_script::{CellRef, HostObject, ScriptContext, ScriptError, ScriptResult, ScriptValue};
use tracing::trace;

use crate::convert::{to_native, to_script};
use crate::error::IntoScript;

fn natives(ctx: &ScriptContext, args: &[ScriptValue]) -> ScriptResult<Vec<Value>> {
    args.iter().map(|arg| to_native(ctx, arg)).collect()
}

/// A native [`Object`] living in a script heap cell
pub struct NativeObjectHost {
    object: ObjectRef,
}

impl NativeObjectHost {
    pub fn new(object: ObjectRef) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }
}

impl HostObject for NativeObjectHost {
    fn class_name(&self) -> &str {
        self.object.type_name()
    }

    fn get(&self, ctx: &ScriptContext, name: &str) -> ScriptResult<ScriptValue> {
        let _span = object_span(self.object.type_name()).entered();
        trace!(property = name, "script get");
        let value = self.object.get(name).into_script()?;
        to_script(ctx, &value)
    }

    fn set(&self, ctx: &ScriptContext, name: &str, value: ScriptValue) -> ScriptResult<()> {
        let _span = object_span(self.object.type_name()).entered();
        trace!(property = name, "script set");
        let value = to_native(ctx, &value)?;
        self.object.set(name, value).into_script()
    }

    fn has(&self, _ctx: &ScriptContext, name: &str) -> bool {
        self.object.has_property(name)
    }

    fn property_names(&self, _ctx: &ScriptContext) -> Vec<String> {
        self.object.property_names()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extra_memory_cost(&self) -> usize {
        self.object.extra_memory_cost()
    }
}

/// A native [`Method`] callable from scripts
pub struct NativeMethodHost {
    method: MethodRef,
}

impl NativeMethodHost {
    pub fn new(method: MethodRef) -> Self {
        Self { method }
    }

    pub fn method(&self) -> &MethodRef {
        &self.method
    }
}

impl HostObject for NativeMethodHost {
    fn class_name(&self) -> &str {
        self.method.type_name()
    }

    fn get(&self, _ctx: &ScriptContext, name: &str) -> ScriptResult<ScriptValue> {
        Ok(match name {
            "name" => ScriptValue::string(self.method.type_name()),
            _ => ScriptValue::Undefined,
        })
    }

    fn set(&self, _ctx: &ScriptContext, name: &str, _value: ScriptValue) -> ScriptResult<()> {
        Err(ScriptError::type_error(format!(
            "cannot set property '{}' of native method {}",
            name,
            self.method.type_name()
        )))
    }

    fn property_names(&self, _ctx: &ScriptContext) -> Vec<String> {
        Vec::new()
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(
        &self,
        ctx: &ScriptContext,
        _this: Option<CellRef>,
        args: &[ScriptValue],
    ) -> ScriptResult<ScriptValue> {
        let _span = object_span(self.method.type_name()).entered();
        trace!(argc = args.len(), "script call");
        let args = natives(ctx, args)?;
        let result = self.method.call(&args).into_script()?;
        to_script(ctx, &result)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A native [`List`] seen by scripts as an indexable object
pub struct NativeListHost {
    list: ListRef,
}

impl NativeListHost {
    pub fn new(list: ListRef) -> Self {
        Self { list }
    }

    pub fn list(&self) -> &ListRef {
        &self.list
    }
}

impl HostObject for NativeListHost {
    fn class_name(&self) -> &str {
        self.list.type_name()
    }

    fn get(&self, ctx: &ScriptContext, name: &str) -> ScriptResult<ScriptValue> {
        if name == "length" {
            return Ok(ScriptValue::Number(self.list.size() as f64));
        }
        let value = match parse_index(name) {
            Some(index) => self.list.at(index),
            None => self.list.get(name),
        }
        .into_script()?;
        to_script(ctx, &value)
    }

    fn set(&self, ctx: &ScriptContext, name: &str, value: ScriptValue) -> ScriptResult<()> {
        let value = to_native(ctx, &value)?;
        match parse_index(name) {
            Some(index) => self.list.set_at(index, value),
            None => self.list.set(name, value),
        }
        .into_script()
    }

    fn has(&self, _ctx: &ScriptContext, name: &str) -> bool {
        self.list.has_property(name)
    }

    fn property_names(&self, _ctx: &ScriptContext) -> Vec<String> {
        self.list.property_names()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extra_memory_cost(&self) -> usize {
        self.list.extra_memory_cost()
    }
}
