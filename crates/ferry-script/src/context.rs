//! Script contexts
//!
//! A [`ScriptContext`] owns one heap and one global object. It is bound to
//! the thread that created it: every operation a script could observe checks
//! the calling thread and fails with [`ScriptError::WrongThread`] elsewhere.
//! Protection bookkeeping (`protect`/`unprotect`) is synchronized and may run
//! on any thread, so handles can be released wherever their owner drops.
//!
//! Host code (host objects, function bodies) is never invoked while the heap
//! lock is held, so callbacks are free to re-enter the context.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::error::{ScriptError, ScriptResult};
use crate::heap::{Cell, Heap, HeapConfig, HeapStats};
use crate::host::{HostFn, HostObject};
use crate::value::{CellRef, ScriptValue};

struct ContextInner {
    heap: Mutex<Heap>,
    owner: ThreadId,
    global: CellRef,
    embedder_data: Mutex<FxHashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

/// A script execution context
#[derive(Clone)]
pub struct ScriptContext {
    inner: Arc<ContextInner>,
}

/// Non-owning reference to a [`ScriptContext`]
#[derive(Clone)]
pub struct WeakScriptContext {
    inner: Weak<ContextInner>,
}

impl WeakScriptContext {
    pub fn upgrade(&self) -> Option<ScriptContext> {
        self.inner.upgrade().map(|inner| ScriptContext { inner })
    }
}

/// Where a property operation has to be routed once the heap lock is gone
enum Route<T> {
    Done(T),
    Host(Arc<dyn HostObject>),
}

impl ScriptContext {
    /// Create a context owned by the current thread
    pub fn new() -> Self {
        Self::with_config(HeapConfig::default())
    }

    pub fn with_config(config: HeapConfig) -> Self {
        let mut heap = Heap::new(config);
        let global = heap.alloc(Cell::Object(IndexMap::new()));
        debug!(thread = ?thread::current().id(), "script context created");
        Self {
            inner: Arc::new(ContextInner {
                heap: Mutex::new(heap),
                owner: thread::current().id(),
                global,
                embedder_data: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakScriptContext {
        WeakScriptContext {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True if both handles refer to the same context
    pub fn ptr_eq(&self, other: &ScriptContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn global(&self) -> CellRef {
        self.inner.global
    }

    pub fn owner_thread(&self) -> ThreadId {
        self.inner.owner
    }

    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.inner.owner
    }

    fn check_thread(&self) -> ScriptResult<()> {
        if self.is_owner_thread() {
            Ok(())
        } else {
            Err(ScriptError::WrongThread {
                owner: format!("{:?}", self.inner.owner),
                current: format!("{:?}", thread::current().id()),
            })
        }
    }

    fn alloc(&self, cell: Cell) -> ScriptResult<CellRef> {
        self.check_thread()?;
        Ok(self.inner.heap.lock().alloc(cell))
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    pub fn make_object(&self) -> ScriptResult<CellRef> {
        self.alloc(Cell::Object(IndexMap::new()))
    }

    pub fn make_array(&self, items: Vec<ScriptValue>) -> ScriptResult<CellRef> {
        {
            let heap = self.inner.heap.lock();
            for item in &items {
                heap.check_value(item)?;
            }
        }
        self.alloc(Cell::Array(items))
    }

    pub fn make_function<F>(&self, name: &str, body: F) -> ScriptResult<CellRef>
    where
        F: Fn(&ScriptContext, Option<CellRef>, &[ScriptValue]) -> ScriptResult<ScriptValue>
            + Send
            + Sync
            + 'static,
    {
        let body: HostFn = Arc::new(body);
        self.alloc(Cell::Function {
            name: name.to_string(),
            body,
            properties: IndexMap::new(),
        })
    }

    pub fn make_host_object(&self, host: Arc<dyn HostObject>) -> ScriptResult<CellRef> {
        let cost = host.extra_memory_cost();
        trace!(class = host.class_name(), cost, "host object allocated");
        let cell = self.alloc(Cell::Host(host))?;
        self.report_extra_memory(cost);
        Ok(cell)
    }

    /// Count `bytes` of outside memory towards the next collection
    pub fn report_extra_memory(&self, bytes: usize) {
        if bytes > 0 {
            self.inner.heap.lock().report_extra_memory(bytes);
        }
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    pub fn get_property(&self, cell: CellRef, name: &str) -> ScriptResult<ScriptValue> {
        self.check_thread()?;
        let route = {
            let heap = self.inner.heap.lock();
            match heap.cell(cell)? {
                Cell::Object(properties) => {
                    Route::Done(properties.get(name).cloned().unwrap_or_default())
                }
                Cell::Array(items) => Route::Done(array_get(items, name)),
                Cell::Function {
                    name: fn_name,
                    properties,
                    ..
                } => Route::Done(match properties.get(name) {
                    Some(value) => value.clone(),
                    None if name == "name" => ScriptValue::string(fn_name.as_str()),
                    None => ScriptValue::Undefined,
                }),
                Cell::Host(host) => Route::Host(host.clone()),
            }
        };
        match route {
            Route::Done(value) => Ok(value),
            Route::Host(host) => host.get(self, name),
        }
    }

    pub fn set_property(&self, cell: CellRef, name: &str, value: ScriptValue) -> ScriptResult<()> {
        self.check_thread()?;
        let route = {
            let mut heap = self.inner.heap.lock();
            heap.check_value(&value)?;
            match heap.cell_mut(cell)? {
                Cell::Object(properties) | Cell::Function { properties, .. } => {
                    properties.insert(name.to_string(), value.clone());
                    Route::Done(())
                }
                Cell::Array(items) => {
                    array_set(items, name, value.clone())?;
                    Route::Done(())
                }
                Cell::Host(host) => Route::Host(host.clone()),
            }
        };
        match route {
            Route::Done(()) => Ok(()),
            Route::Host(host) => host.set(self, name, value),
        }
    }

    pub fn has_property(&self, cell: CellRef, name: &str) -> ScriptResult<bool> {
        self.check_thread()?;
        let route = {
            let heap = self.inner.heap.lock();
            match heap.cell(cell)? {
                Cell::Object(properties) => Route::Done(properties.contains_key(name)),
                Cell::Function { properties, .. } => {
                    Route::Done(name == "name" || properties.contains_key(name))
                }
                Cell::Array(items) => Route::Done(
                    name == "length" || parse_index(name).is_some_and(|i| i < items.len()),
                ),
                Cell::Host(host) => Route::Host(host.clone()),
            }
        };
        match route {
            Route::Done(found) => Ok(found),
            Route::Host(host) => Ok(host.has(self, name)),
        }
    }

    pub fn delete_property(&self, cell: CellRef, name: &str) -> ScriptResult<bool> {
        self.check_thread()?;
        let route = {
            let mut heap = self.inner.heap.lock();
            match heap.cell_mut(cell)? {
                Cell::Object(properties) | Cell::Function { properties, .. } => {
                    Route::Done(properties.shift_remove(name).is_some())
                }
                Cell::Array(items) => match parse_index(name) {
                    Some(index) if index < items.len() => {
                        items[index] = ScriptValue::Undefined;
                        Route::Done(true)
                    }
                    _ => Route::Done(false),
                },
                Cell::Host(host) => Route::Host(host.clone()),
            }
        };
        match route {
            Route::Done(removed) => Ok(removed),
            Route::Host(host) => host.delete(self, name),
        }
    }

    /// Own enumerable property names in insertion order
    pub fn property_names(&self, cell: CellRef) -> ScriptResult<Vec<String>> {
        self.check_thread()?;
        let route = {
            let heap = self.inner.heap.lock();
            match heap.cell(cell)? {
                Cell::Object(properties) | Cell::Function { properties, .. } => {
                    Route::Done(properties.keys().cloned().collect())
                }
                Cell::Array(items) => Route::Done((0..items.len()).map(|i| i.to_string()).collect()),
                Cell::Host(host) => Route::Host(host.clone()),
            }
        };
        match route {
            Route::Done(names) => Ok(names),
            Route::Host(host) => Ok(host.property_names(self)),
        }
    }

    // -----------------------------------------------------------------------
    // Arrays
    // -----------------------------------------------------------------------

    fn with_array<T>(
        &self,
        cell: CellRef,
        f: impl FnOnce(&mut Vec<ScriptValue>) -> T,
    ) -> ScriptResult<T> {
        self.check_thread()?;
        let mut heap = self.inner.heap.lock();
        match heap.cell_mut(cell)? {
            Cell::Array(items) => Ok(f(items)),
            other => Err(ScriptError::type_error(format!(
                "{} is not an array",
                other.kind()
            ))),
        }
    }

    pub fn length(&self, cell: CellRef) -> ScriptResult<usize> {
        self.with_array(cell, |items| items.len())
    }

    pub fn get_index(&self, cell: CellRef, index: usize) -> ScriptResult<ScriptValue> {
        self.with_array(cell, |items| items.get(index).cloned().unwrap_or_default())
    }

    pub fn set_index(&self, cell: CellRef, index: usize, value: ScriptValue) -> ScriptResult<()> {
        self.inner.heap.lock().check_value(&value)?;
        self.with_array(cell, |items| array_store(items, index, value))?
    }

    pub fn push(&self, cell: CellRef, value: ScriptValue) -> ScriptResult<usize> {
        self.inner.heap.lock().check_value(&value)?;
        self.with_array(cell, |items| {
            items.push(value);
            items.len()
        })
    }

    // -----------------------------------------------------------------------
    // Calls and inspection
    // -----------------------------------------------------------------------

    /// Call a function cell (or a callable host object)
    pub fn call(
        &self,
        function: CellRef,
        this: Option<CellRef>,
        args: &[ScriptValue],
    ) -> ScriptResult<ScriptValue> {
        self.check_thread()?;
        enum Callee {
            Function(HostFn),
            Host(Arc<dyn HostObject>),
        }
        let callee = {
            let heap = self.inner.heap.lock();
            for arg in args {
                heap.check_value(arg)?;
            }
            match heap.cell(function)? {
                Cell::Function { body, .. } => Callee::Function(body.clone()),
                Cell::Host(host) if host.is_callable() => Callee::Host(host.clone()),
                other => {
                    return Err(ScriptError::type_error(format!(
                        "{} is not a function",
                        other.kind()
                    )));
                }
            }
        };
        match callee {
            Callee::Function(body) => body(self, this, args),
            Callee::Host(host) => host.call(self, this, args),
        }
    }

    /// Call any value; non-function values raise a TypeError
    pub fn call_value(
        &self,
        function: &ScriptValue,
        this: Option<CellRef>,
        args: &[ScriptValue],
    ) -> ScriptResult<ScriptValue> {
        match function.as_cell() {
            Some(cell) => self.call(cell, this, args),
            None => Err(ScriptError::type_error(format!(
                "{} is not a function",
                self.type_of(function)?
            ))),
        }
    }

    pub fn is_function(&self, cell: CellRef) -> ScriptResult<bool> {
        self.check_thread()?;
        let heap = self.inner.heap.lock();
        Ok(match heap.cell(cell)? {
            Cell::Function { .. } => true,
            Cell::Host(host) => host.is_callable(),
            _ => false,
        })
    }

    pub fn is_array(&self, cell: CellRef) -> ScriptResult<bool> {
        self.check_thread()?;
        Ok(matches!(self.inner.heap.lock().cell(cell)?, Cell::Array(_)))
    }

    /// The `typeof` of a value
    pub fn type_of(&self, value: &ScriptValue) -> ScriptResult<&'static str> {
        Ok(match value {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Null => "object",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Cell(cell) => {
                if self.is_function(*cell)? {
                    "function"
                } else {
                    "object"
                }
            }
        })
    }

    /// Class name of a cell: `Object`, `Array`, `Function` or the host's own
    pub fn class_name(&self, cell: CellRef) -> ScriptResult<String> {
        self.check_thread()?;
        let heap = self.inner.heap.lock();
        Ok(match heap.cell(cell)? {
            Cell::Host(host) => host.class_name().to_string(),
            other => other.kind().to_string(),
        })
    }

    /// The host object stored in `cell`, if it is a host cell
    pub fn host_object(&self, cell: CellRef) -> ScriptResult<Option<Arc<dyn HostObject>>> {
        self.check_thread()?;
        let heap = self.inner.heap.lock();
        Ok(match heap.cell(cell)? {
            Cell::Host(host) => Some(host.clone()),
            _ => None,
        })
    }

    /// The runtime's strict equality
    pub fn strict_equals(&self, a: &ScriptValue, b: &ScriptValue) -> bool {
        a == b
    }

    // -----------------------------------------------------------------------
    // Protection and collection
    // -----------------------------------------------------------------------

    /// Register `cell` as a root. Protections are counted; each must be
    /// balanced by one `unprotect`.
    pub fn protect(&self, cell: CellRef) -> ScriptResult<()> {
        let count = self.inner.heap.lock().protect(cell)?;
        trace!(%cell, count, "protect");
        Ok(())
    }

    /// Release one protection. Releasing a collected or unprotected cell is a
    /// no-op.
    pub fn unprotect(&self, cell: CellRef) {
        if !self.inner.heap.lock().unprotect(cell) {
            warn!(%cell, "unprotect without matching protect");
        }
    }

    pub fn protect_count(&self, cell: CellRef) -> u32 {
        self.inner.heap.lock().protect_count(cell)
    }

    pub fn is_alive(&self, cell: CellRef) -> bool {
        self.inner.heap.lock().is_alive(cell)
    }

    /// Run a full collection, returning the number of reclaimed cells
    pub fn collect(&self) -> ScriptResult<usize> {
        self.check_thread()?;
        let garbage = self.inner.heap.lock().collect(&[self.inner.global]);
        let reclaimed = garbage.len();
        // Host objects may own native values whose drop re-enters the heap.
        drop(garbage);
        debug!(reclaimed, "script heap collected");
        Ok(reclaimed)
    }

    /// Collect when enough allocations happened since the last collection
    pub fn collect_if_needed(&self) -> ScriptResult<bool> {
        self.check_thread()?;
        if self.inner.heap.lock().should_collect() {
            self.collect()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn stats(&self) -> HeapStats {
        self.inner.heap.lock().stats()
    }

    pub fn config(&self) -> HeapConfig {
        self.inner.heap.lock().config().clone()
    }

    // -----------------------------------------------------------------------
    // Embedder data
    // -----------------------------------------------------------------------

    /// Attach per-context data, keyed by type
    pub fn set_embedder_data<T: Any + Send + Sync>(&self, value: Arc<T>) {
        self.inner
            .embedder_data
            .lock()
            .insert(TypeId::of::<T>(), value);
    }

    pub fn embedder_data<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let map = self.inner.embedder_data.lock();
        map.get(&TypeId::of::<T>())
            .and_then(|value| value.clone().downcast::<T>().ok())
    }

    pub fn embedder_data_or_insert_with<T: Any + Send + Sync>(
        &self,
        init: impl FnOnce() -> T,
    ) -> Arc<T> {
        let mut map = self.inner.embedder_data.lock();
        let key = TypeId::of::<T>();
        if let Some(existing) = map.get(&key).and_then(|v| v.clone().downcast::<T>().ok()) {
            return existing;
        }
        let value = Arc::new(init());
        map.insert(key, value.clone());
        value
    }
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("owner", &self.inner.owner)
            .field("global", &self.inner.global)
            .finish_non_exhaustive()
    }
}

fn parse_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    name.parse().ok()
}

fn array_get(items: &[ScriptValue], name: &str) -> ScriptValue {
    if name == "length" {
        return ScriptValue::Number(items.len() as f64);
    }
    parse_index(name)
        .and_then(|index| items.get(index).cloned())
        .unwrap_or_default()
}

/// Arrays never grow past this many elements
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

fn array_store(items: &mut Vec<ScriptValue>, index: usize, value: ScriptValue) -> ScriptResult<()> {
    if index >= MAX_ARRAY_LENGTH {
        return Err(ScriptError::thrown("RangeError", "Invalid array index"));
    }
    if index >= items.len() {
        items.resize(index + 1, ScriptValue::Undefined);
    }
    items[index] = value;
    Ok(())
}

fn array_set(items: &mut Vec<ScriptValue>, name: &str, value: ScriptValue) -> ScriptResult<()> {
    if name == "length" {
        let len = value
            .as_number()
            .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= MAX_ARRAY_LENGTH as f64)
            .ok_or_else(|| ScriptError::thrown("RangeError", "Invalid array length"))?;
        items.resize(len as usize, ScriptValue::Undefined);
        return Ok(());
    }
    match parse_index(name) {
        Some(index) => array_store(items, index, value),
        None => Err(ScriptError::type_error(format!(
            "cannot set named property '{}' on an array",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_properties() {
        let ctx = ScriptContext::new();
        let obj = ctx.make_object().unwrap();
        ctx.set_property(obj, "a", ScriptValue::Number(1.0)).unwrap();
        ctx.set_property(obj, "b", "two".into()).unwrap();

        assert_eq!(ctx.get_property(obj, "a").unwrap(), ScriptValue::Number(1.0));
        assert!(ctx.get_property(obj, "missing").unwrap().is_undefined());
        assert_eq!(ctx.property_names(obj).unwrap(), vec!["a", "b"]);
        assert!(ctx.delete_property(obj, "a").unwrap());
        assert!(!ctx.has_property(obj, "a").unwrap());
    }

    #[test]
    fn test_arrays() {
        let ctx = ScriptContext::new();
        let arr = ctx
            .make_array(vec![ScriptValue::Number(1.0), ScriptValue::Number(2.0)])
            .unwrap();
        assert_eq!(ctx.length(arr).unwrap(), 2);
        assert_eq!(
            ctx.get_property(arr, "length").unwrap(),
            ScriptValue::Number(2.0)
        );
        ctx.set_index(arr, 3, "x".into()).unwrap();
        assert_eq!(ctx.length(arr).unwrap(), 4);
        assert!(ctx.get_index(arr, 2).unwrap().is_undefined());
        assert_eq!(ctx.push(arr, ScriptValue::Null).unwrap(), 5);
        assert!(ctx.is_array(arr).unwrap());
    }

    #[test]
    fn test_function_call() {
        let ctx = ScriptContext::new();
        let add = ctx
            .make_function("add", |_, _, args| {
                let sum = args.iter().filter_map(ScriptValue::as_number).sum::<f64>();
                Ok(ScriptValue::Number(sum))
            })
            .unwrap();
        let result = ctx
            .call(add, None, &[ScriptValue::Number(2.0), ScriptValue::Number(3.0)])
            .unwrap();
        assert_eq!(result, ScriptValue::Number(5.0));
        assert_eq!(
            ctx.get_property(add, "name").unwrap(),
            ScriptValue::string("add")
        );
        assert_eq!(ctx.type_of(&ScriptValue::Cell(add)).unwrap(), "function");
    }

    #[test]
    fn test_calling_non_function() {
        let ctx = ScriptContext::new();
        let obj = ctx.make_object().unwrap();
        let err = ctx.call(obj, None, &[]).unwrap_err();
        assert_eq!(err.error_type(), "TypeError");
        let err = ctx
            .call_value(&ScriptValue::Number(1.0), None, &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "TypeError: number is not a function");
    }

    #[test]
    fn test_thrown_from_function() {
        let ctx = ScriptContext::new();
        let thrower = ctx
            .make_function("fail", |_, _, _| {
                Err(ScriptError::thrown("RangeError", "too big"))
            })
            .unwrap();
        let err = ctx.call(thrower, None, &[]).unwrap_err();
        assert_eq!(err, ScriptError::thrown("RangeError", "too big"));
    }

    #[test]
    fn test_reentrant_function() {
        let ctx = ScriptContext::new();
        let global = ctx.global();
        let setter = ctx
            .make_function("store", move |ctx, _, args| {
                let value = args.first().cloned().unwrap_or_default();
                ctx.set_property(global, "stored", value)?;
                ctx.get_property(global, "stored")
            })
            .unwrap();
        let result = ctx.call(setter, None, &[ScriptValue::Bool(true)]).unwrap();
        assert_eq!(result, ScriptValue::Bool(true));
    }

    #[test]
    fn test_stale_values_rejected() {
        let ctx = ScriptContext::new();
        let orphan = ctx.make_object().unwrap();
        ctx.collect().unwrap();
        let holder = ctx.make_object().unwrap();
        let err = ctx
            .set_property(holder, "x", ScriptValue::Cell(orphan))
            .unwrap_err();
        assert!(matches!(err, ScriptError::StaleHandle { .. }));
    }

    #[test]
    fn test_embedder_data() {
        struct Marker(u32);
        let ctx = ScriptContext::new();
        assert!(ctx.embedder_data::<Marker>().is_none());
        let first = ctx.embedder_data_or_insert_with(|| Marker(1));
        let second = ctx.embedder_data_or_insert_with(|| Marker(2));
        assert_eq!(first.0, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
