//! Objects with computed properties
//!
//! An [`AccessorObject`] consults its accessor map before falling back to the
//! underlying [`StaticBoundObject`] table. Getters and setters are stored as
//! [`Method`]s, so they may equally be native closures or functions living in
//! a foreign runtime.

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::{BridgeError, BridgeResult};
use crate::logging::object_span;
use crate::method::{Method, MethodRef, NativeMethod};
use crate::object::Object;
use crate::static_bound::StaticBoundObject;
use crate::value::Value;

#[derive(Clone, Default)]
struct Accessor {
    getter: Option<MethodRef>,
    setter: Option<MethodRef>,
}

pub struct AccessorObject {
    table: StaticBoundObject,
    accessors: RwLock<IndexMap<String, Accessor>>,
}

impl AccessorObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            table: StaticBoundObject::new(type_name),
            accessors: RwLock::new(IndexMap::new()),
        }
    }

    /// The plain property table behind the accessors
    pub fn table(&self) -> &StaticBoundObject {
        &self.table
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        self.table = self.table.with_property(name, value);
        self
    }

    pub fn with_method<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&[Value]) -> BridgeResult<Value> + Send + Sync + 'static,
    {
        self.table = self.table.with_method(name, body);
        self
    }

    pub fn with_getter<F>(self, name: &str, getter: F) -> Self
    where
        F: Fn() -> BridgeResult<Value> + Send + Sync + 'static,
    {
        self.define_getter(name, getter);
        self
    }

    pub fn define_getter<F>(&self, name: &str, getter: F)
    where
        F: Fn() -> BridgeResult<Value> + Send + Sync + 'static,
    {
        let method = NativeMethod::shared(name, move |_| getter());
        self.accessors
            .write()
            .entry(name.to_string())
            .or_default()
            .getter = Some(method);
    }

    pub fn define_setter<F>(&self, name: &str, setter: F)
    where
        F: Fn(Value) -> BridgeResult<()> + Send + Sync + 'static,
    {
        let method = NativeMethod::shared(name, move |args| {
            setter(args.first().cloned().unwrap_or_default())?;
            Ok(Value::Undefined)
        });
        self.accessors
            .write()
            .entry(name.to_string())
            .or_default()
            .setter = Some(method);
    }

    pub fn define_accessor<G, S>(&self, name: &str, getter: G, setter: S)
    where
        G: Fn() -> BridgeResult<Value> + Send + Sync + 'static,
        S: Fn(Value) -> BridgeResult<()> + Send + Sync + 'static,
    {
        self.define_getter(name, getter);
        self.define_setter(name, setter);
    }

    /// Install existing methods as accessors, replacing any previous pair
    pub fn define_accessor_methods(
        &self,
        name: &str,
        getter: Option<MethodRef>,
        setter: Option<MethodRef>,
    ) {
        self.accessors
            .write()
            .insert(name.to_string(), Accessor { getter, setter });
    }

    pub fn remove_accessor(&self, name: &str) -> bool {
        self.accessors.write().shift_remove(name).is_some()
    }

    // Cloned out so user code never runs under the accessor lock.
    fn accessor(&self, name: &str) -> Option<Accessor> {
        self.accessors.read().get(name).cloned()
    }
}

impl Object for AccessorObject {
    fn type_name(&self) -> &str {
        self.table.type_name()
    }

    fn get(&self, name: &str) -> BridgeResult<Value> {
        match self.accessor(name) {
            Some(Accessor {
                getter: Some(getter),
                ..
            }) => {
                let _span = object_span(self.type_name()).entered();
                trace!(property = name, "getter");
                getter.call(&[])
            }
            Some(_) => Ok(Value::Undefined),
            None => self.table.get(name),
        }
    }

    fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        match self.accessor(name) {
            Some(Accessor {
                setter: Some(setter),
                ..
            }) => {
                let _span = object_span(self.type_name()).entered();
                trace!(property = name, "setter");
                setter.call(&[value]).map(|_| ())
            }
            Some(_) => Err(BridgeError::property_rejected(
                self.type_name(),
                name,
                "read-only",
            )),
            None => self.table.set(name, value),
        }
    }

    fn property_names(&self) -> Vec<String> {
        let mut names = self.table.property_names();
        for name in self.accessors.read().keys() {
            if !self.table.has_property(name) {
                names.push(name.clone());
            }
        }
        names
    }

    fn has_property(&self, name: &str) -> bool {
        self.accessors.read().contains_key(name) || self.table.has_property(name)
    }
}
