//! Ferry core: the value and object protocol shared by native bindings and
//! embedded script runtimes.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ferry_core::{ObjectExt, StaticBoundObject, Value};
//!
//! let lib = StaticBoundObject::new("Library")
//!     .with_method("getVersion", |_| Ok(Value::string("1.2.3")));
//! assert_eq!(lib.call_ns("getVersion", &[]).unwrap(), Value::string("1.2.3"));
//!
//! let root = StaticBoundObject::new("Root")
//!     .with_property("lib", Value::object(Arc::new(lib)));
//! assert_eq!(root.call_ns("lib.getVersion", &[]).unwrap(), Value::string("1.2.3"));
//! ```

pub mod accessor;
pub mod args;
pub mod convert;
pub mod error;
pub mod json;
pub mod list;
pub mod logging;
pub mod method;
pub mod object;
pub mod static_bound;
pub mod value;

pub use accessor::AccessorObject;
pub use args::ArgList;
pub use convert::{FromValue, IntoValue};
pub use error::{BridgeError, BridgeResult};
pub use json::JsonObject;
pub use list::{List, ListRef, MAX_LIST_LENGTH, StaticBoundList};
pub use method::{Method, MethodRef, NativeMethod};
pub use object::{Object, ObjectExt, ObjectRef, WeakObjectRef};
pub use static_bound::StaticBoundObject;
pub use value::{Value, ValueType};
