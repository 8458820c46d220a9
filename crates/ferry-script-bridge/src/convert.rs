//! Value conversion between the two worlds
//!
//! Crossing the boundary never copies an object. Native entities are
//! presented to scripts through host cells (one per entity and context,
//! remembered in a [`WrapperCache`]); script cells are presented to native
//! code through protected adapters. Unwrapping reverses either direction, so
//! an entity that goes out and comes back is the very same entity.

use std::sync::Arc;

use ferry_core::{List, ListRef, Method, MethodRef, ObjectRef, Value};
use ferry_script::{CellRef, HostObject, ScriptContext, ScriptResult, ScriptValue};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::adapter::{ScriptList, ScriptMethod, ScriptObject, script_handle};
use crate::host::{NativeListHost, NativeMethodHost, NativeObjectHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Object,
    Method,
    List,
}

/// Host cells already created for native entities, per context
#[derive(Default)]
pub struct WrapperCache {
    cells: Mutex<FxHashMap<(usize, Kind), CellRef>>,
}

impl WrapperCache {
    /// The cache installed on `ctx`
    pub fn of(ctx: &ScriptContext) -> Arc<WrapperCache> {
        ctx.embedder_data_or_insert_with(WrapperCache::default)
    }

    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.lock().is_empty()
    }

    /// Forget entries whose host cell has been collected
    pub fn prune(&self, ctx: &ScriptContext) -> usize {
        let mut cells = self.cells.lock();
        let before = cells.len();
        cells.retain(|_, cell| ctx.is_alive(*cell));
        before - cells.len()
    }
}

fn data_address<T: ?Sized>(ptr: *const T) -> usize {
    ptr as *const () as usize
}

fn host_cell(
    ctx: &ScriptContext,
    key: (usize, Kind),
    is_same: impl Fn(&dyn HostObject) -> bool,
    make: impl FnOnce() -> Arc<dyn HostObject>,
) -> ScriptResult<CellRef> {
    let cache = WrapperCache::of(ctx);
    let cached = cache.cells.lock().get(&key).copied();
    if let Some(cell) = cached
        && ctx.is_alive(cell)
        && let Some(host) = ctx.host_object(cell)?
        && is_same(host.as_ref())
    {
        return Ok(cell);
    }
    let cell = ctx.make_host_object(make())?;
    cache.cells.lock().insert(key, cell);
    Ok(cell)
}

fn object_cell(ctx: &ScriptContext, object: &ObjectRef) -> ScriptResult<CellRef> {
    let address = data_address(Arc::as_ptr(object));
    host_cell(
        ctx,
        (address, Kind::Object),
        |host| {
            host.as_any()
                .downcast_ref::<NativeObjectHost>()
                .is_some_and(|h| data_address(Arc::as_ptr(h.object())) == address)
        },
        || Arc::new(NativeObjectHost::new(object.clone())),
    )
}

fn method_cell(ctx: &ScriptContext, method: &MethodRef) -> ScriptResult<CellRef> {
    let address = data_address(Arc::as_ptr(method));
    host_cell(
        ctx,
        (address, Kind::Method),
        |host| {
            host.as_any()
                .downcast_ref::<NativeMethodHost>()
                .is_some_and(|h| data_address(Arc::as_ptr(h.method())) == address)
        },
        || Arc::new(NativeMethodHost::new(method.clone())),
    )
}

fn list_cell(ctx: &ScriptContext, list: &ListRef) -> ScriptResult<CellRef> {
    let address = data_address(Arc::as_ptr(list));
    host_cell(
        ctx,
        (address, Kind::List),
        |host| {
            host.as_any()
                .downcast_ref::<NativeListHost>()
                .is_some_and(|h| data_address(Arc::as_ptr(h.list())) == address)
        },
        || Arc::new(NativeListHost::new(list.clone())),
    )
}

/// Convert a native value for use inside `ctx`
pub fn to_script(ctx: &ScriptContext, value: &Value) -> ScriptResult<ScriptValue> {
    Ok(match value {
        Value::Undefined => ScriptValue::Undefined,
        Value::Null => ScriptValue::Null,
        Value::Bool(b) => ScriptValue::Bool(*b),
        Value::Int(i) => ScriptValue::Number(f64::from(*i)),
        Value::Double(d) => ScriptValue::Number(*d),
        Value::String(s) => ScriptValue::String(s.clone()),
        Value::Object(object) => match script_handle(object.as_ref()) {
            Some(handle) if handle.belongs_to(ctx) => ScriptValue::Cell(handle.cell()),
            _ => ScriptValue::Cell(object_cell(ctx, object)?),
        },
        Value::Method(method) => match method
            .as_any()
            .and_then(|any| any.downcast_ref::<ScriptMethod>())
        {
            Some(adapter) if adapter.handle().belongs_to(ctx) => {
                ScriptValue::Cell(adapter.handle().cell())
            }
            _ => ScriptValue::Cell(method_cell(ctx, method)?),
        },
        Value::List(list) => match script_handle(list.as_object()) {
            Some(handle) if handle.belongs_to(ctx) => ScriptValue::Cell(handle.cell()),
            _ => ScriptValue::Cell(list_cell(ctx, list)?),
        },
    })
}

/// Script numbers become Int when integral, in 32-bit range and not -0
pub fn number_to_value(n: f64) -> Value {
    let integral = n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX);
    if integral && !(n == 0.0 && n.is_sign_negative()) {
        Value::Int(n as i32)
    } else {
        Value::Double(n)
    }
}

/// Convert a script value for native code
pub fn to_native(ctx: &ScriptContext, value: &ScriptValue) -> ScriptResult<Value> {
    Ok(match value {
        ScriptValue::Undefined => Value::Undefined,
        ScriptValue::Null => Value::Null,
        ScriptValue::Bool(b) => Value::Bool(*b),
        ScriptValue::Number(n) => number_to_value(*n),
        ScriptValue::String(s) => Value::String(s.clone()),
        ScriptValue::Cell(cell) => wrap_cell(ctx, *cell)?,
    })
}

/// Present a cell to native code, unwrapping host cells made by this bridge
pub fn wrap_cell(ctx: &ScriptContext, cell: CellRef) -> ScriptResult<Value> {
    if let Some(host) = ctx.host_object(cell)? {
        let any = host.as_any();
        if let Some(native) = any.downcast_ref::<NativeObjectHost>() {
            return Ok(Value::Object(native.object().clone()));
        }
        if let Some(native) = any.downcast_ref::<NativeMethodHost>() {
            return Ok(Value::Method(native.method().clone()));
        }
        if let Some(native) = any.downcast_ref::<NativeListHost>() {
            return Ok(Value::List(native.list().clone()));
        }
    }
    if ctx.is_function(cell)? {
        Ok(Value::Method(Arc::new(ScriptMethod::new(ctx, cell)?)))
    } else if ctx.is_array(cell)? {
        Ok(Value::List(Arc::new(ScriptList::new(ctx, cell)?)))
    } else {
        Ok(Value::Object(Arc::new(ScriptObject::new(ctx, cell)?)))
    }
}
