//! Value conversion traits for native method parameters and results.
//!
//! `FromValue` converts a bridge `Value` into a Rust type (for arguments).
//! `IntoValue` converts a Rust type back into a `Value` (for return values).
//! Conversions are strict: no string-to-number coercion happens here.

use std::sync::Arc;

use crate::error::{BridgeError, BridgeResult};
use crate::list::{List, ListRef, StaticBoundList};
use crate::method::MethodRef;
use crate::object::ObjectRef;
use crate::value::Value;

/// Convert a `Value` into a Rust type
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> BridgeResult<Self>;
}

/// Convert a Rust type into a `Value`
pub trait IntoValue {
    fn into_value(self) -> Value;
}

// ---------------------------------------------------------------------------
// FromValue implementations
// ---------------------------------------------------------------------------

impl FromValue for Value {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        value.to_int()
    }
}

/// Accepts both Int and Double
impl FromValue for f64 {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        value.to_number()
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        value.to_bool()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        value.to_str().map(str::to_string)
    }
}

impl FromValue for ObjectRef {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        value.to_object()
    }
}

impl FromValue for MethodRef {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        value.to_method()
    }
}

impl FromValue for ListRef {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        value.to_list()
    }
}

/// Undefined and null map to `None`
impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        match value {
            Value::Undefined | Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> BridgeResult<Self> {
        let list = value
            .as_list()
            .ok_or_else(|| BridgeError::type_mismatch("list", value.type_name()))?;
        list.to_vec()?.iter().map(T::from_value).collect()
    }
}

// ---------------------------------------------------------------------------
// IntoValue implementations
// ---------------------------------------------------------------------------

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Undefined
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Double(self)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for ObjectRef {
    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl IntoValue for MethodRef {
    fn into_value(self) -> Value {
        Value::Method(self)
    }
}

impl IntoValue for ListRef {
    fn into_value(self) -> Value {
        Value::List(self)
    }
}

/// `None` becomes null
impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        let items = self.into_iter().map(IntoValue::into_value).collect();
        Value::List(Arc::new(StaticBoundList::from_values(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_scalars() {
        assert_eq!(i32::from_value(&Value::int(3)).unwrap(), 3);
        assert!(i32::from_value(&Value::string("3")).is_err());
        assert_eq!(f64::from_value(&Value::int(3)).unwrap(), 3.0);
        assert!(bool::from_value(&Value::int(1)).is_err());
    }

    #[test]
    fn test_option() {
        assert_eq!(Option::<String>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(&Value::string("x")).unwrap(),
            Some("x".to_string())
        );
        assert!(None::<i32>.into_value().is_null());
    }

    #[test]
    fn test_vec_round_trip() {
        let value = vec!["a".to_string(), "b".to_string()].into_value();
        assert!(value.is_list());
        let back = Vec::<String>::from_value(&value).unwrap();
        assert_eq!(back, vec!["a", "b"]);
        assert!(Vec::<i32>::from_value(&value).is_err());
    }
}
