//! Bridge values
//!
//! A [`Value`] is the only datum that crosses the bridge. Primitives are held
//! inline; strings, objects, methods and lists are `Arc`-shared, so a value
//! stays alive for as long as any holder keeps a clone of it.

use std::fmt;
use std::sync::Arc;

use crate::error::{BridgeError, BridgeResult};
use crate::list::{List, ListRef};
use crate::method::{Method, MethodRef};
use crate::object::{Object, ObjectRef};

/// Type tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Undefined,
    Null,
    Bool,
    Int,
    Double,
    String,
    Object,
    Method,
    List,
}

impl ValueType {
    /// Lowercase display name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Double => "double",
            Self::String => "string",
            Self::Object => "object",
            Self::Method => "method",
            Self::List => "list",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable, tagged bridge value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    String(Arc<str>),
    Object(ObjectRef),
    Method(MethodRef),
    List(ListRef),
}

/// Shared undefined value, handed out by reference for missing arguments
pub(crate) static UNDEFINED: Value = Value::Undefined;

impl Value {
    /// The null value
    pub fn null() -> Self {
        Self::Null
    }

    /// Create a boolean value
    pub fn bool(b: bool) -> Self {
        Self::Bool(b)
    }

    /// Create an integer value
    pub fn int(i: i32) -> Self {
        Self::Int(i)
    }

    /// Create a double value
    pub fn double(d: f64) -> Self {
        Self::Double(d)
    }

    /// Create a string value
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    /// Create an object value
    pub fn object(object: ObjectRef) -> Self {
        Self::Object(object)
    }

    /// Create a method value
    pub fn method(method: MethodRef) -> Self {
        Self::Method(method)
    }

    /// Create a list value
    pub fn list(list: ListRef) -> Self {
        Self::List(list)
    }

    /// The type tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Undefined => ValueType::Undefined,
            Self::Null => ValueType::Null,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::Object(_) => ValueType::Object,
            Self::Method(_) => ValueType::Method,
            Self::List(_) => ValueType::List,
        }
    }

    /// Name of the type tag
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Self::Double(_))
    }

    /// True for both integer and double values
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Double(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn is_method(&self) -> bool {
        matches!(self, Self::Method(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Numeric view: widens Int to f64, never narrows a Double
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(f64::from(*i)),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_method(&self) -> Option<&MethodRef> {
        match self {
            Self::Method(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Object-protocol view of this value; lists are objects too
    pub fn as_object_view(&self) -> Option<&dyn Object> {
        match self {
            Self::Object(o) => Some(o.as_ref()),
            Self::List(l) => Some(l.as_object()),
            _ => None,
        }
    }

    fn mismatch(&self, expected: &'static str) -> BridgeError {
        BridgeError::type_mismatch(expected, self.type_name())
    }

    /// Strict boolean accessor
    pub fn to_bool(&self) -> BridgeResult<bool> {
        self.as_bool().ok_or_else(|| self.mismatch("bool"))
    }

    /// Strict integer accessor
    pub fn to_int(&self) -> BridgeResult<i32> {
        self.as_int().ok_or_else(|| self.mismatch("int"))
    }

    /// Strict double accessor
    pub fn to_double(&self) -> BridgeResult<f64> {
        self.as_double().ok_or_else(|| self.mismatch("double"))
    }

    /// Strict numeric accessor accepting both Int and Double
    pub fn to_number(&self) -> BridgeResult<f64> {
        self.as_number().ok_or_else(|| self.mismatch("number"))
    }

    /// Strict string accessor
    pub fn to_str(&self) -> BridgeResult<&str> {
        self.as_str().ok_or_else(|| self.mismatch("string"))
    }

    /// Strict object accessor
    pub fn to_object(&self) -> BridgeResult<ObjectRef> {
        self.as_object()
            .cloned()
            .ok_or_else(|| self.mismatch("object"))
    }

    /// Strict method accessor
    pub fn to_method(&self) -> BridgeResult<MethodRef> {
        self.as_method()
            .cloned()
            .ok_or_else(|| self.mismatch("method"))
    }

    /// Strict list accessor
    pub fn to_list(&self) -> BridgeResult<ListRef> {
        self.as_list().cloned().ok_or_else(|| self.mismatch("list"))
    }

    /// Falsey rules shared by every default-taking boolean accessor:
    /// undefined, null, false, zero, NaN and the empty string are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Double(d) => *d != 0.0 && !d.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Object(_) | Self::Method(_) | Self::List(_) => true,
        }
    }

    /// Render this value, descending at most `levels` object levels
    pub fn display_string(&self, levels: usize) -> String {
        match self {
            Self::String(s) => format!("\"{}\"", s),
            Self::Object(o) => o.display_string(levels),
            Self::List(l) => l.display_string(levels),
            Self::Method(m) => format!("<{}>", m.type_name()),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{:?}", d),
            Self::String(s) => f.write_str(s),
            other => f.write_str(&other.display_string(1)),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({})", b),
            Self::Int(i) => write!(f, "Int({})", i),
            Self::Double(d) => write!(f, "Double({:?})", d),
            Self::String(s) => write!(f, "String({:?})", s),
            Self::Object(o) => write!(f, "Object(<{}>)", o.type_name()),
            Self::Method(m) => write!(f, "Method(<{}>)", m.type_name()),
            Self::List(l) => write!(f, "List(<{}>; {})", l.type_name(), l.size()),
        }
    }
}

/// Primitives compare by payload, heap entities through their own `equals`
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.equals(b.as_ref()),
            (Self::Method(a), Self::Method(b)) => a.equals(b.as_ref()),
            (Self::List(a), Self::List(b)) => a.equals(b.as_object()),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Self::Object(o)
    }
}

impl From<MethodRef> for Value {
    fn from(m: MethodRef) -> Self {
        Self::Method(m)
    }
}

impl From<ListRef> for Value {
    fn from(l: ListRef) -> Self {
        Self::List(l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_bound::StaticBoundObject;

    #[test]
    fn test_type_tags() {
        assert_eq!(Value::Undefined.value_type(), ValueType::Undefined);
        assert_eq!(Value::int(3).type_name(), "int");
        assert_eq!(Value::double(3.0).type_name(), "double");
        assert_eq!(Value::string("x").type_name(), "string");
    }

    #[test]
    fn test_int_and_double_are_distinct() {
        assert_ne!(Value::int(1), Value::double(1.0));
        assert!(Value::int(1).is_number());
        assert!(Value::double(1.5).is_number());
    }

    #[test]
    fn test_number_widening_only() {
        assert_eq!(Value::int(7).to_number().unwrap(), 7.0);
        assert_eq!(Value::double(7.5).to_number().unwrap(), 7.5);
        assert!(matches!(
            Value::double(7.0).to_int(),
            Err(BridgeError::TypeMismatch {
                expected: "int",
                actual: "double"
            })
        ));
    }

    #[test]
    fn test_strict_accessors_mismatch() {
        let v = Value::string("hello");
        assert_eq!(v.to_str().unwrap(), "hello");
        assert!(v.to_bool().is_err());
        assert!(v.to_object().is_err());
        assert!(Value::Null.to_method().is_err());
        assert!(Value::Undefined.to_list().is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::int(0).is_truthy());
        assert!(!Value::double(0.0).is_truthy());
        assert!(!Value::double(f64::NAN).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("0").is_truthy());
        assert!(Value::int(-1).is_truthy());
        let obj: ObjectRef = Arc::new(StaticBoundObject::new("Empty"));
        assert!(Value::object(obj).is_truthy());
    }

    #[test]
    fn test_object_equality_is_identity() {
        let a: ObjectRef = Arc::new(StaticBoundObject::new("A"));
        let b: ObjectRef = Arc::new(StaticBoundObject::new("A"));
        assert_eq!(Value::object(a.clone()), Value::object(a.clone()));
        assert_ne!(Value::object(a), Value::object(b));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(Value::int(42).to_string(), "42");
        assert_eq!(Value::double(1.0).to_string(), "1.0");
        assert_eq!(Value::string("raw").to_string(), "raw");
        assert_eq!(Value::string("quoted").display_string(1), "\"quoted\"");
    }
}
