//! The object protocol
//!
//! Every native capability and every foreign object is reached through the
//! [`Object`] trait. The typed helpers in [`ObjectExt`] are derived purely from
//! `get`, `set` and [`Method::call`](crate::method::Method::call), so an
//! implementation only has to provide the four primitive operations.

use std::any::Any;
use std::sync::{Arc, Weak};

use crate::error::{BridgeError, BridgeResult};
use crate::list::{List, ListRef};
use crate::method::{Method, MethodRef};
use crate::value::Value;

/// Shared handle to any object
pub type ObjectRef = Arc<dyn Object>;

/// Non-owning handle, used for back-references that would otherwise form a
/// cycle across runtimes
pub type WeakObjectRef = Weak<dyn Object>;

/// An entity with named properties
pub trait Object: Send + Sync + 'static {
    /// Human-readable type name, used for diagnostics and logging
    fn type_name(&self) -> &str;

    /// Read a property. Unknown names yield `Value::Undefined`; only genuine
    /// failures (a throwing getter, a foreign exception) are errors.
    fn get(&self, name: &str) -> BridgeResult<Value>;

    /// Write a property
    fn set(&self, name: &str, value: Value) -> BridgeResult<()>;

    /// Names currently visible on this object, recomputed on every call
    fn property_names(&self) -> Vec<String>;

    fn has_property(&self, name: &str) -> bool {
        matches!(self.get(name), Ok(v) if !v.is_undefined())
    }

    /// Identity by default: two handles are equal when they share an
    /// allocation
    fn equals(&self, other: &dyn Object) -> bool {
        std::ptr::addr_eq(self as *const Self, other as *const dyn Object)
    }

    fn display_string(&self, levels: usize) -> String {
        display_object(self, levels)
    }

    /// Downcast hook for adapters that need to recognise their own wrappers
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }

    /// Bytes held outside the bridge on behalf of this object. A script
    /// heap wrapping it counts them as allocation pressure.
    fn extra_memory_cost(&self) -> usize {
        0
    }
}

/// Render `Type {name: value, ...}`, descending `levels` object levels
pub fn display_object<O: Object + ?Sized>(object: &O, levels: usize) -> String {
    if levels == 0 {
        return format!("[{}]", object.type_name());
    }
    let fields: Vec<String> = object
        .property_names()
        .into_iter()
        .map(|name| {
            let rendered = match object.get(&name) {
                Ok(value) => value.display_string(levels - 1),
                Err(e) => format!("<error: {}>", e.kind()),
            };
            format!("{}: {}", name, rendered)
        })
        .collect();
    format!("{} {{{}}}", object.type_name(), fields.join(", "))
}

fn missing_intermediate(path: &str, segment: &str) -> BridgeError {
    BridgeError::MissingIntermediate {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

fn require_object(path: &str, segment: &str, value: Value) -> BridgeResult<Value> {
    if value.as_object_view().is_some() {
        Ok(value)
    } else {
        Err(missing_intermediate(path, segment))
    }
}

/// Typed accessors, typed setters and namespace traversal for every object
pub trait ObjectExt: Object {
    // -----------------------------------------------------------------------
    // Soft accessors
    // -----------------------------------------------------------------------

    fn get_int(&self, name: &str, default: i32) -> BridgeResult<i32> {
        Ok(self.get(name)?.as_int().unwrap_or(default))
    }

    /// Only a stored Double satisfies this; use `get_number` to accept ints
    fn get_double(&self, name: &str, default: f64) -> BridgeResult<f64> {
        Ok(self.get(name)?.as_double().unwrap_or(default))
    }

    fn get_number(&self, name: &str, default: f64) -> BridgeResult<f64> {
        Ok(self.get(name)?.as_number().unwrap_or(default))
    }

    /// Truthiness of a bool, number or string; `default` for anything else
    fn get_bool(&self, name: &str, default: bool) -> BridgeResult<bool> {
        let value = self.get(name)?;
        Ok(match value {
            Value::Bool(_) | Value::Int(_) | Value::Double(_) | Value::String(_) => {
                value.is_truthy()
            }
            _ => default,
        })
    }

    fn get_string(&self, name: &str, default: &str) -> BridgeResult<String> {
        Ok(self
            .get(name)?
            .as_str()
            .map_or_else(|| default.to_string(), str::to_string))
    }

    fn get_object(&self, name: &str) -> BridgeResult<Option<ObjectRef>> {
        Ok(self.get(name)?.as_object().cloned())
    }

    fn get_method(&self, name: &str) -> BridgeResult<Option<MethodRef>> {
        Ok(self.get(name)?.as_method().cloned())
    }

    fn get_list(&self, name: &str) -> BridgeResult<Option<ListRef>> {
        Ok(self.get(name)?.as_list().cloned())
    }

    /// String items of a list property; non-string items are skipped
    fn get_string_list(&self, name: &str) -> BridgeResult<Vec<String>> {
        let Some(list) = self.get_list(name)? else {
            return Ok(Vec::new());
        };
        let mut strings = Vec::with_capacity(list.size());
        for index in 0..list.size() {
            if let Some(s) = list.at(index)?.as_str() {
                strings.push(s.to_string());
            }
        }
        Ok(strings)
    }

    // -----------------------------------------------------------------------
    // Setters
    // -----------------------------------------------------------------------

    fn set_undefined(&self, name: &str) -> BridgeResult<()> {
        self.set(name, Value::Undefined)
    }

    fn set_null(&self, name: &str) -> BridgeResult<()> {
        self.set(name, Value::Null)
    }

    fn set_int(&self, name: &str, value: i32) -> BridgeResult<()> {
        self.set(name, Value::Int(value))
    }

    fn set_double(&self, name: &str, value: f64) -> BridgeResult<()> {
        self.set(name, Value::Double(value))
    }

    fn set_bool(&self, name: &str, value: bool) -> BridgeResult<()> {
        self.set(name, Value::Bool(value))
    }

    fn set_string(&self, name: &str, value: &str) -> BridgeResult<()> {
        self.set(name, Value::string(value))
    }

    fn set_object(&self, name: &str, value: ObjectRef) -> BridgeResult<()> {
        self.set(name, Value::Object(value))
    }

    fn set_method(&self, name: &str, value: MethodRef) -> BridgeResult<()> {
        self.set(name, Value::Method(value))
    }

    fn set_list(&self, name: &str, value: ListRef) -> BridgeResult<()> {
        self.set(name, Value::List(value))
    }

    // -----------------------------------------------------------------------
    // Namespace traversal
    // -----------------------------------------------------------------------

    /// Resolve a dotted path. A missing or non-object hop yields Undefined.
    fn get_ns(&self, path: &str) -> BridgeResult<Value> {
        let mut segments = path.split('.');
        let mut current = match segments.next() {
            Some(head) => self.get(head)?,
            None => return Ok(Value::Undefined),
        };
        for segment in segments {
            let next = match current.as_object_view() {
                Some(object) => object.get(segment)?,
                None => return Ok(Value::Undefined),
            };
            current = next;
        }
        Ok(current)
    }

    /// Write through a dotted path. Every hop before the last must already
    /// exist and be an object.
    fn set_ns(&self, path: &str, value: Value) -> BridgeResult<()> {
        let Some((parent, leaf)) = path.rsplit_once('.') else {
            return self.set(path, value);
        };
        let mut segments = parent.split('.');
        let head = segments.next().unwrap_or_default();
        let mut current = require_object(path, head, self.get(head)?)?;
        for segment in segments {
            let next = match current.as_object_view() {
                Some(object) => object.get(segment)?,
                None => Value::Undefined,
            };
            current = require_object(path, segment, next)?;
        }
        match current.as_object_view() {
            Some(object) => object.set(leaf, value),
            None => Err(missing_intermediate(path, parent)),
        }
    }

    /// Resolve `path` and invoke it with `args`
    fn call_ns(&self, path: &str, args: &[Value]) -> BridgeResult<Value> {
        match self.get_ns(path)? {
            Value::Method(method) => method.call(args),
            other => Err(BridgeError::CallTargetInvalid {
                path: path.to_string(),
                actual: other.type_name(),
            }),
        }
    }
}

impl<T: Object + ?Sized> ObjectExt for T {}
