//! Script cells as native objects, methods and lists
//!
//! Each adapter owns one [`Protected`] registration, so the cell it wraps
//! survives collections until the adapter is dropped. Calls must happen on
//! the context's owning thread; elsewhere they fail with a translated
//! `WrongThreadError`.

use std::any::Any;

use ferry_core::{BridgeResult, List, Method, Object, Value};
use ferry_script::{CellRef, ScriptContext, ScriptResult, ScriptValue};
use tracing::warn;

use crate::convert::{to_native, to_script};
use crate::error::IntoBridge;
use crate::protected::Protected;

/// The protected handle behind a script object or list adapter
pub(crate) fn script_handle(object: &dyn Object) -> Option<&Protected> {
    let any = object.as_any()?;
    if let Some(adapter) = any.downcast_ref::<ScriptObject>() {
        return Some(&adapter.handle);
    }
    any.downcast_ref::<ScriptList>().map(|adapter| &adapter.handle)
}

fn same_cell(a: &Protected, b: &Protected) -> bool {
    match a.context() {
        Ok(ctx) => {
            b.belongs_to(&ctx)
                && ctx.strict_equals(&ScriptValue::Cell(a.cell()), &ScriptValue::Cell(b.cell()))
        }
        Err(_) => false,
    }
}

fn get_property(handle: &Protected, name: &str) -> BridgeResult<Value> {
    let ctx = handle.context().into_bridge()?;
    let value = ctx.get_property(handle.cell(), name).into_bridge()?;
    to_native(&ctx, &value).into_bridge()
}

fn set_property(handle: &Protected, name: &str, value: Value) -> BridgeResult<()> {
    let ctx = handle.context().into_bridge()?;
    let value = to_script(&ctx, &value).into_bridge()?;
    ctx.set_property(handle.cell(), name, value).into_bridge()
}

fn property_names(handle: &Protected) -> Vec<String> {
    match handle
        .context()
        .and_then(|ctx| ctx.property_names(handle.cell()))
    {
        Ok(names) => names,
        Err(e) => {
            warn!(cell = %handle.cell(), error = %e, "failed to enumerate script object");
            Vec::new()
        }
    }
}

/// A script object seen through the object protocol
pub struct ScriptObject {
    handle: Protected,
    class_name: String,
}

impl ScriptObject {
    pub fn new(ctx: &ScriptContext, cell: CellRef) -> ScriptResult<Self> {
        Ok(Self {
            class_name: ctx.class_name(cell)?,
            handle: Protected::new(ctx, cell)?,
        })
    }

    pub fn handle(&self) -> &Protected {
        &self.handle
    }

    pub fn cell(&self) -> CellRef {
        self.handle.cell()
    }
}

impl Object for ScriptObject {
    fn type_name(&self) -> &str {
        &self.class_name
    }

    fn get(&self, name: &str) -> BridgeResult<Value> {
        get_property(&self.handle, name)
    }

    fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        set_property(&self.handle, name, value)
    }

    fn property_names(&self) -> Vec<String> {
        property_names(&self.handle)
    }

    fn has_property(&self, name: &str) -> bool {
        self.handle
            .context()
            .and_then(|ctx| ctx.has_property(self.handle.cell(), name))
            .unwrap_or(false)
    }

    fn equals(&self, other: &dyn Object) -> bool {
        script_handle(other).is_some_and(|other| same_cell(&self.handle, other))
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

/// A script function seen as a native method
pub struct ScriptMethod {
    function: Protected,
    this: Option<Protected>,
}

impl ScriptMethod {
    pub fn new(ctx: &ScriptContext, function: CellRef) -> ScriptResult<Self> {
        Ok(Self {
            function: Protected::new(ctx, function)?,
            this: None,
        })
    }

    /// A method that calls `function` with `this` as its receiver
    pub fn bound(ctx: &ScriptContext, function: CellRef, this: CellRef) -> ScriptResult<Self> {
        Ok(Self {
            function: Protected::new(ctx, function)?,
            this: Some(Protected::new(ctx, this)?),
        })
    }

    pub fn handle(&self) -> &Protected {
        &self.function
    }
}

impl Method for ScriptMethod {
    fn call(&self, args: &[Value]) -> BridgeResult<Value> {
        let ctx = self.function.context().into_bridge()?;
        let script_args = args
            .iter()
            .map(|arg| to_script(&ctx, arg))
            .collect::<ScriptResult<Vec<_>>>()
            .into_bridge()?;

        // Freshly wrapped arguments are reachable from nothing until the
        // callee stores them.
        let mut temporaries = scopeguard::guard(Vec::new(), |cells: Vec<CellRef>| {
            for cell in cells {
                ctx.unprotect(cell);
            }
        });
        for cell in script_args.iter().filter_map(ScriptValue::as_cell) {
            ctx.protect(cell).into_bridge()?;
            temporaries.push(cell);
        }

        let this = self.this.as_ref().map(Protected::cell);
        let result = ctx
            .call(self.function.cell(), this, &script_args)
            .into_bridge()?;
        to_native(&ctx, &result).into_bridge()
    }

    fn type_name(&self) -> &str {
        "ScriptMethod"
    }

    fn equals(&self, other: &dyn Method) -> bool {
        other
            .as_any()
            .and_then(|any| any.downcast_ref::<ScriptMethod>())
            .is_some_and(|other| same_cell(&self.function, &other.function))
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

/// A script array seen as a native list
pub struct ScriptList {
    handle: Protected,
}

impl ScriptList {
    pub fn new(ctx: &ScriptContext, cell: CellRef) -> ScriptResult<Self> {
        Ok(Self {
            handle: Protected::new(ctx, cell)?,
        })
    }

    pub fn handle(&self) -> &Protected {
        &self.handle
    }
}

impl Object for ScriptList {
    fn type_name(&self) -> &str {
        "Array"
    }

    fn get(&self, name: &str) -> BridgeResult<Value> {
        get_property(&self.handle, name)
    }

    fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        set_property(&self.handle, name, value)
    }

    fn property_names(&self) -> Vec<String> {
        property_names(&self.handle)
    }

    fn has_property(&self, name: &str) -> bool {
        self.handle
            .context()
            .and_then(|ctx| ctx.has_property(self.handle.cell(), name))
            .unwrap_or(false)
    }

    fn equals(&self, other: &dyn Object) -> bool {
        script_handle(other).is_some_and(|other| same_cell(&self.handle, other))
    }

    fn display_string(&self, levels: usize) -> String {
        ferry_core::list::display_list(self, levels)
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

impl List for ScriptList {
    fn size(&self) -> usize {
        match self
            .handle
            .context()
            .and_then(|ctx| ctx.length(self.handle.cell()))
        {
            Ok(len) => len,
            Err(e) => {
                warn!(cell = %self.handle.cell(), error = %e, "failed to read script array length");
                0
            }
        }
    }

    fn at(&self, index: usize) -> BridgeResult<Value> {
        let ctx = self.handle.context().into_bridge()?;
        let value = ctx.get_index(self.handle.cell(), index).into_bridge()?;
        to_native(&ctx, &value).into_bridge()
    }

    fn set_at(&self, index: usize, value: Value) -> BridgeResult<()> {
        let ctx = self.handle.context().into_bridge()?;
        let value = to_script(&ctx, &value).into_bridge()?;
        ctx.set_index(self.handle.cell(), index, value).into_bridge()
    }

    fn append(&self, value: Value) -> BridgeResult<()> {
        let ctx = self.handle.context().into_bridge()?;
        let value = to_script(&ctx, &value).into_bridge()?;
        ctx.push(self.handle.cell(), value).into_bridge().map(|_| ())
    }

    fn as_object(&self) -> &dyn Object {
        self
    }
}
