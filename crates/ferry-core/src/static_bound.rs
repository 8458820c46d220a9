//! Table-backed objects
//!
//! A [`StaticBoundObject`] is an ordered name to value table. Bindings build
//! one up front with methods and constants and hand it to script runtimes as
//! a plain [`ObjectRef`](crate::object::ObjectRef).

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::logging::object_span;
use crate::method::{MethodRef, NativeMethod};
use crate::object::Object;
use crate::value::Value;

pub struct StaticBoundObject {
    type_name: String,
    properties: RwLock<IndexMap<String, Value>>,
    reserved: RwLock<FxHashSet<String>>,
}

impl StaticBoundObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: RwLock::new(IndexMap::new()),
            reserved: RwLock::new(FxHashSet::default()),
        }
    }

    /// Builder form of `set` that skips the reservation check
    pub fn with_property(self, name: impl Into<String>, value: Value) -> Self {
        self.properties.write().insert(name.into(), value);
        self
    }

    /// Builder form of [`set_method`](Self::set_method)
    pub fn with_method<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&[Value]) -> BridgeResult<Value> + Send + Sync + 'static,
    {
        let method = NativeMethod::shared(name, body);
        self.with_property(name, Value::Method(method))
    }

    /// Bind a native closure under `name`
    pub fn set_method<F>(&self, name: &str, body: F) -> BridgeResult<()>
    where
        F: Fn(&[Value]) -> BridgeResult<Value> + Send + Sync + 'static,
    {
        self.set(name, Value::Method(NativeMethod::shared(name, body)))
    }

    /// Bind an existing method, possibly one that lives in a foreign runtime
    pub fn set_method_ref(&self, name: &str, method: MethodRef) -> BridgeResult<()> {
        self.set(name, Value::Method(method))
    }

    /// Make `name` read-only. Its current value, if any, is kept.
    pub fn reserve(&self, name: impl Into<String>) {
        self.reserved.write().insert(name.into());
    }

    /// Store `value` under `name` and reserve it
    pub fn define_constant(&self, name: &str, value: Value) {
        self.properties.write().insert(name.to_string(), value);
        self.reserve(name);
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.read().contains(name)
    }

    /// Remove `name`, returning the value it held
    pub fn unset(&self, name: &str) -> BridgeResult<Option<Value>> {
        if self.is_reserved(name) {
            return Err(self.rejection(name));
        }
        Ok(self.properties.write().shift_remove(name))
    }

    pub fn len(&self) -> usize {
        self.properties.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.read().is_empty()
    }

    fn rejection(&self, name: &str) -> BridgeError {
        let _span = object_span(&self.type_name).entered();
        debug!(property = name, "rejected write to reserved property");
        BridgeError::property_rejected(&self.type_name, name, "reserved")
    }
}

impl Object for StaticBoundObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get(&self, name: &str) -> BridgeResult<Value> {
        Ok(self
            .properties
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        if self.is_reserved(name) {
            return Err(self.rejection(name));
        }
        self.properties.write().insert(name.to_string(), value);
        Ok(())
    }

    fn property_names(&self) -> Vec<String> {
        self.properties.read().keys().cloned().collect()
    }

    // A stored Undefined still counts as present.
    fn has_property(&self, name: &str) -> bool {
        self.properties.read().contains_key(name)
    }
}

impl std::fmt::Debug for StaticBoundObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticBoundObject")
            .field("type_name", &self.type_name)
            .field("properties", &self.property_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectExt;

    #[test]
    fn test_fresh_object_is_empty() {
        let obj = StaticBoundObject::new("Fresh");
        assert!(obj.get("anything").unwrap().is_undefined());
        assert!(!obj.has_property("anything"));
        assert!(obj.is_empty());
    }

    #[test]
    fn test_insertion_order_and_overwrite() {
        let obj = StaticBoundObject::new("Ordered");
        obj.set_int("b", 1).unwrap();
        obj.set_int("a", 2).unwrap();
        obj.set_int("b", 3).unwrap();
        assert_eq!(obj.property_names(), vec!["b", "a"]);
        assert_eq!(obj.get("b").unwrap(), Value::int(3));
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn test_stored_undefined_is_present() {
        let obj = StaticBoundObject::new("Test");
        obj.set_undefined("hole").unwrap();
        assert!(obj.has_property("hole"));
        assert!(obj.get("hole").unwrap().is_undefined());
    }

    #[test]
    fn test_reserved_rejects_and_keeps_value() {
        let obj = StaticBoundObject::new("Dependency");
        obj.define_constant("name", Value::string("zlib"));
        let err = obj.set_string("name", "other").unwrap_err();
        assert!(matches!(err, BridgeError::PropertyRejected { .. }));
        assert_eq!(obj.get("name").unwrap(), Value::string("zlib"));
        assert!(obj.unset("name").is_err());
    }

    #[test]
    fn test_unset() {
        let obj = StaticBoundObject::new("Test")
            .with_property("a", Value::int(1))
            .with_property("b", Value::int(2));
        assert_eq!(obj.unset("a").unwrap(), Some(Value::int(1)));
        assert_eq!(obj.unset("a").unwrap(), None);
        assert_eq!(obj.property_names(), vec!["b"]);
    }

    #[test]
    fn test_methods() {
        let obj = StaticBoundObject::new("Calc").with_method("twice", |args| {
            let n = args.first().map_or(Ok(0), Value::to_int)?;
            Ok(Value::int(n * 2))
        });
        assert_eq!(
            obj.call_ns("twice", &[Value::int(21)]).unwrap(),
            Value::int(42)
        );
        obj.set_method("zero", |_| Ok(Value::int(0))).unwrap();
        assert_eq!(obj.call_ns("zero", &[]).unwrap(), Value::int(0));
    }
}
