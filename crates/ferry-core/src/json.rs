//! JSON documents through the object protocol
//!
//! [`JsonObject`] exposes a parsed `serde_json` object as an [`Object`].
//! Nested objects and arrays are converted once, so writes through nested
//! handles are visible from the parent. Equality is structural: two JSON
//! objects are equal when they serialize to the same document.

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{BridgeError, BridgeResult};
use crate::list::{List, StaticBoundList};
use crate::object::Object;
use crate::value::Value;

/// Depth used when a whole document is serialized
pub const MAX_JSON_DEPTH: usize = 64;

impl Value {
    /// Convert a JSON value. Integral numbers that fit in 32 bits become Int.
    pub fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::string(s.as_str()),
            JsonValue::Array(items) => Value::List(Arc::new(StaticBoundList::from_values(
                items.iter().map(Value::from_json).collect(),
            ))),
            JsonValue::Object(map) => Value::Object(Arc::new(JsonObject::from_map(map))),
        }
    }

    /// Serialize, descending at most `levels` object or list levels.
    /// Undefined and method members are omitted from objects.
    pub fn to_json(&self, levels: usize) -> BridgeResult<JsonValue> {
        Ok(match self {
            Value::Undefined | Value::Null | Value::Method(_) => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::Number((*i).into()),
            Value::Double(d) => Number::from_f64(*d).map_or(JsonValue::Null, JsonValue::Number),
            Value::String(s) => JsonValue::String(s.to_string()),
            Value::Object(_) | Value::List(_) if levels == 0 => JsonValue::Null,
            Value::Object(object) => {
                let mut map = Map::new();
                for name in object.property_names() {
                    let value = object.get(&name)?;
                    if value.is_undefined() || value.is_method() {
                        continue;
                    }
                    map.insert(name, value.to_json(levels - 1)?);
                }
                JsonValue::Object(map)
            }
            Value::List(list) => JsonValue::Array(
                list.to_vec()?
                    .iter()
                    .map(|item| item.to_json(levels - 1))
                    .collect::<BridgeResult<_>>()?,
            ),
        })
    }
}

/// A JSON object document
pub struct JsonObject {
    entries: RwLock<IndexMap<String, Value>>,
}

impl JsonObject {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    pub fn from_map(map: &Map<String, JsonValue>) -> Self {
        Self {
            entries: RwLock::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Parse a JSON text whose top level is an object
    pub fn parse(text: &str) -> BridgeResult<Self> {
        match serde_json::from_str::<JsonValue>(text) {
            Ok(JsonValue::Object(map)) => Ok(Self::from_map(&map)),
            Ok(other) => Err(BridgeError::native(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(BridgeError::native(format!("invalid JSON: {}", e))),
        }
    }

    /// The whole document
    pub fn to_json(&self) -> BridgeResult<JsonValue> {
        let mut map = Map::new();
        let entries: Vec<(String, Value)> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in entries {
            if value.is_undefined() || value.is_method() {
                continue;
            }
            map.insert(name, value.to_json(MAX_JSON_DEPTH)?);
        }
        Ok(JsonValue::Object(map))
    }
}

impl Default for JsonObject {
    fn default() -> Self {
        Self::new()
    }
}

fn json_type_name(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl Object for JsonObject {
    fn type_name(&self) -> &str {
        "JsonObject"
    }

    fn get(&self, name: &str) -> BridgeResult<Value> {
        Ok(self.entries.read().get(name).cloned().unwrap_or_default())
    }

    fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        self.entries.write().insert(name.to_string(), value);
        Ok(())
    }

    fn property_names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn has_property(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    fn equals(&self, other: &dyn Object) -> bool {
        let Some(other) = other.as_any().and_then(|a| a.downcast_ref::<JsonObject>()) else {
            return false;
        };
        if std::ptr::eq(self, other) {
            return true;
        }
        match (self.to_json(), other.to_json()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}
