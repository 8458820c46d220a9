//! Ordered sequences
//!
//! A [`List`] is also an [`Object`]: `length` and decimal indices are exposed
//! as properties so that namespace paths can step through lists.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{BridgeError, BridgeResult};
use crate::object::Object;
use crate::value::Value;

/// Shared handle to any list
pub type ListRef = Arc<dyn List>;

pub trait List: Object {
    fn size(&self) -> usize;

    /// Item at `index`; Undefined when out of range
    fn at(&self, index: usize) -> BridgeResult<Value>;

    /// Replace the item at `index`, padding with Undefined past the end
    fn set_at(&self, index: usize, value: Value) -> BridgeResult<()>;

    fn append(&self, value: Value) -> BridgeResult<()>;

    /// This list through the object protocol
    fn as_object(&self) -> &dyn Object;

    fn to_vec(&self) -> BridgeResult<Vec<Value>> {
        (0..self.size()).map(|index| self.at(index)).collect()
    }
}

/// Render `[a, b, c]`, descending `levels` object levels
pub fn display_list<L: List + ?Sized>(list: &L, levels: usize) -> String {
    if levels == 0 {
        return format!("[{}; {}]", list.type_name(), list.size());
    }
    let items: Vec<String> = (0..list.size())
        .map(|index| match list.at(index) {
            Ok(value) => value.display_string(levels - 1),
            Err(e) => format!("<error: {}>", e.kind()),
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// Parse a property name as a list index
pub fn parse_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    name.parse().ok()
}

/// Lists never grow past this many items
pub const MAX_LIST_LENGTH: usize = 1 << 24;

/// A native list of values
#[derive(Default)]
pub struct StaticBoundList {
    items: RwLock<Vec<Value>>,
}

impl StaticBoundList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            items: RwLock::new(values),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl Object for StaticBoundList {
    fn type_name(&self) -> &str {
        "List"
    }

    fn get(&self, name: &str) -> BridgeResult<Value> {
        if name == "length" {
            return Ok(Value::int(i32::try_from(self.size()).unwrap_or(i32::MAX)));
        }
        match parse_index(name) {
            Some(index) => self.at(index),
            None => Ok(Value::Undefined),
        }
    }

    fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        match parse_index(name) {
            Some(index) => self.set_at(index, value),
            None => Err(BridgeError::property_rejected(
                self.type_name(),
                name,
                "lists only accept index properties",
            )),
        }
    }

    fn property_names(&self) -> Vec<String> {
        (0..self.size()).map(|index| index.to_string()).collect()
    }

    fn has_property(&self, name: &str) -> bool {
        name == "length" || parse_index(name).is_some_and(|index| index < self.size())
    }

    fn display_string(&self, levels: usize) -> String {
        display_list(self, levels)
    }
}

impl List for StaticBoundList {
    fn size(&self) -> usize {
        self.items.read().len()
    }

    fn at(&self, index: usize) -> BridgeResult<Value> {
        Ok(self.items.read().get(index).cloned().unwrap_or_default())
    }

    fn set_at(&self, index: usize, value: Value) -> BridgeResult<()> {
        if index >= MAX_LIST_LENGTH {
            return Err(BridgeError::property_rejected(
                self.type_name(),
                index.to_string(),
                "index exceeds the maximum list length",
            ));
        }
        let mut items = self.items.write();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
        Ok(())
    }

    fn append(&self, value: Value) -> BridgeResult<()> {
        self.items.write().push(value);
        Ok(())
    }

    fn as_object(&self) -> &dyn Object {
        self
    }

    fn to_vec(&self) -> BridgeResult<Vec<Value>> {
        Ok(self.items.read().clone())
    }
}
