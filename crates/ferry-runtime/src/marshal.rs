//! Objects usable from any thread
//!
//! A marshaled wrapper routes every protocol call onto the engine thread and
//! blocks until it has run. Calls made on the engine thread go straight to
//! the target. Heap entities returned by the target are marshaled in turn,
//! so a chain of `get`s stays usable from the calling thread. Wrappers
//! handed back to their own engine are unwrapped first, so the target sees
//! the entity it produced.

use std::any::Any;
use std::sync::Arc;

use ferry_core::{
    BridgeResult, List, ListRef, Method, MethodRef, Object, ObjectRef, Value,
};
use tracing::warn;

use crate::engine::EngineHandle;

/// Wrap heap entities in `value` so they can be used from any thread
pub fn marshal(value: Value, handle: &EngineHandle) -> Value {
    match value {
        Value::Object(object) if !is_marshaled(object.as_ref(), handle) => {
            Value::Object(Arc::new(MarshaledObject::new(object, handle.clone())))
        }
        Value::Method(method) if !is_marshaled_method(method.as_ref(), handle) => {
            Value::Method(Arc::new(MarshaledMethod::new(method, handle.clone())))
        }
        Value::List(list) if !is_marshaled(list.as_object(), handle) => {
            Value::List(Arc::new(MarshaledList::new(list, handle.clone())))
        }
        other => other,
    }
}

/// Replace wrappers made for `handle`'s engine by the entity they wrap
pub fn unmarshal(value: Value, handle: &EngineHandle) -> Value {
    match value {
        Value::Object(object) => {
            let any = object.as_any();
            if let Some(marshaled) = any.and_then(|any| any.downcast_ref::<MarshaledObject>())
                && marshaled.handle.same_engine(handle)
            {
                return Value::Object(marshaled.target.clone());
            }
            if let Some(marshaled) = any.and_then(|any| any.downcast_ref::<MarshaledList>())
                && marshaled.handle.same_engine(handle)
            {
                return Value::List(marshaled.target.clone());
            }
            Value::Object(object)
        }
        Value::Method(method) => match method
            .as_any()
            .and_then(|any| any.downcast_ref::<MarshaledMethod>())
        {
            Some(marshaled) if marshaled.handle.same_engine(handle) => {
                Value::Method(marshaled.target.clone())
            }
            _ => Value::Method(method),
        },
        Value::List(list) => match list
            .as_object()
            .as_any()
            .and_then(|any| any.downcast_ref::<MarshaledList>())
        {
            Some(marshaled) if marshaled.handle.same_engine(handle) => {
                Value::List(marshaled.target.clone())
            }
            _ => Value::List(list),
        },
        other => other,
    }
}

fn is_marshaled(object: &dyn Object, handle: &EngineHandle) -> bool {
    let Some(any) = object.as_any() else {
        return false;
    };
    if let Some(marshaled) = any.downcast_ref::<MarshaledObject>() {
        return marshaled.handle.same_engine(handle);
    }
    any.downcast_ref::<MarshaledList>()
        .is_some_and(|marshaled| marshaled.handle.same_engine(handle))
}

fn is_marshaled_method(method: &dyn Method, handle: &EngineHandle) -> bool {
    method
        .as_any()
        .and_then(|any| any.downcast_ref::<MarshaledMethod>())
        .is_some_and(|marshaled| marshaled.handle.same_engine(handle))
}

/// Run `f` against `target` on the engine thread, marshaling its result
fn dispatch<T, F>(handle: &EngineHandle, target: &T, f: F) -> BridgeResult<Value>
where
    T: Clone + Send + 'static,
    F: FnOnce(&T) -> BridgeResult<Value> + Send + 'static,
{
    let target = target.clone();
    let value = handle.run(move |_| f(&target))??;
    Ok(marshal(value, handle))
}

fn dispatch_unit<T, F>(handle: &EngineHandle, target: &T, f: F) -> BridgeResult<()>
where
    T: Clone + Send + 'static,
    F: FnOnce(&T) -> BridgeResult<()> + Send + 'static,
{
    let target = target.clone();
    Ok(handle.run(move |_| f(&target))??)
}

fn names_of(handle: &EngineHandle, target: &ObjectRef) -> Vec<String> {
    let target = target.clone();
    match handle.run(move |_| target.property_names()) {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "failed to enumerate marshaled object");
            Vec::new()
        }
    }
}

/// An object whose calls run on the engine thread
pub struct MarshaledObject {
    target: ObjectRef,
    handle: EngineHandle,
}

impl MarshaledObject {
    pub fn new(target: ObjectRef, handle: EngineHandle) -> Self {
        Self { target, handle }
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }
}

impl Object for MarshaledObject {
    fn type_name(&self) -> &str {
        self.target.type_name()
    }

    fn get(&self, name: &str) -> BridgeResult<Value> {
        let name = name.to_string();
        dispatch(&self.handle, &self.target, move |target| target.get(&name))
    }

    fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        let name = name.to_string();
        let value = unmarshal(value, &self.handle);
        dispatch_unit(&self.handle, &self.target, move |target| {
            target.set(&name, value)
        })
    }

    fn property_names(&self) -> Vec<String> {
        names_of(&self.handle, &self.target)
    }

    fn has_property(&self, name: &str) -> bool {
        let target = self.target.clone();
        let name = name.to_string();
        self.handle
            .run(move |_| target.has_property(&name))
            .unwrap_or(false)
    }

    fn equals(&self, other: &dyn Object) -> bool {
        match other
            .as_any()
            .and_then(|any| any.downcast_ref::<MarshaledObject>())
        {
            Some(other) => self.target.equals(other.target.as_ref()),
            None => self.target.equals(other),
        }
    }

    fn display_string(&self, levels: usize) -> String {
        let target = self.target.clone();
        self.handle
            .run(move |_| target.display_string(levels))
            .unwrap_or_else(|_| format!("[{}]", self.target.type_name()))
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

/// A method whose calls run on the engine thread
pub struct MarshaledMethod {
    target: MethodRef,
    handle: EngineHandle,
}

impl MarshaledMethod {
    pub fn new(target: MethodRef, handle: EngineHandle) -> Self {
        Self { target, handle }
    }

    pub fn target(&self) -> &MethodRef {
        &self.target
    }
}

impl Method for MarshaledMethod {
    fn call(&self, args: &[Value]) -> BridgeResult<Value> {
        let args: Vec<Value> = args
            .iter()
            .map(|arg| unmarshal(arg.clone(), &self.handle))
            .collect();
        dispatch(&self.handle, &self.target, move |target| target.call(&args))
    }

    fn type_name(&self) -> &str {
        self.target.type_name()
    }

    fn equals(&self, other: &dyn Method) -> bool {
        match other
            .as_any()
            .and_then(|any| any.downcast_ref::<MarshaledMethod>())
        {
            Some(other) => self.target.equals(other.target.as_ref()),
            None => self.target.equals(other),
        }
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

/// A list whose calls run on the engine thread
pub struct MarshaledList {
    target: ListRef,
    handle: EngineHandle,
}

impl MarshaledList {
    pub fn new(target: ListRef, handle: EngineHandle) -> Self {
        Self { target, handle }
    }

    pub fn target(&self) -> &ListRef {
        &self.target
    }
}

impl Object for MarshaledList {
    fn type_name(&self) -> &str {
        self.target.type_name()
    }

    fn get(&self, name: &str) -> BridgeResult<Value> {
        let name = name.to_string();
        dispatch(&self.handle, &self.target, move |target| target.get(&name))
    }

    fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        let name = name.to_string();
        let value = unmarshal(value, &self.handle);
        dispatch_unit(&self.handle, &self.target, move |target| {
            target.set(&name, value)
        })
    }

    fn property_names(&self) -> Vec<String> {
        let target = self.target.clone();
        match self.handle.run(move |_| target.property_names()) {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "failed to enumerate marshaled list");
                Vec::new()
            }
        }
    }

    fn equals(&self, other: &dyn Object) -> bool {
        match other
            .as_any()
            .and_then(|any| any.downcast_ref::<MarshaledList>())
        {
            Some(other) => self.target.equals(other.target.as_object()),
            None => self.target.equals(other),
        }
    }

    fn display_string(&self, levels: usize) -> String {
        ferry_core::list::display_list(self, levels)
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

impl List for MarshaledList {
    fn size(&self) -> usize {
        let target = self.target.clone();
        self.handle.run(move |_| target.size()).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read marshaled list size");
            0
        })
    }

    fn at(&self, index: usize) -> BridgeResult<Value> {
        dispatch(&self.handle, &self.target, move |target| target.at(index))
    }

    fn set_at(&self, index: usize, value: Value) -> BridgeResult<()> {
        let value = unmarshal(value, &self.handle);
        dispatch_unit(&self.handle, &self.target, move |target| {
            target.set_at(index, value)
        })
    }

    fn append(&self, value: Value) -> BridgeResult<()> {
        let value = unmarshal(value, &self.handle);
        dispatch_unit(&self.handle, &self.target, move |target| {
            target.append(value)
        })
    }

    fn as_object(&self) -> &dyn Object {
        self
    }
}
