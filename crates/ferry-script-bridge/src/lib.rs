//! Ferry script bridge
//!
//! Adapts the ferry script heap to the object protocol in both directions:
//!
//! - native [`Object`](ferry_core::Object)s, [`Method`](ferry_core::Method)s
//!   and [`List`](ferry_core::List)s enter scripts as host objects
//! - script objects, functions and arrays reach native code as
//!   [`ScriptObject`], [`ScriptMethod`] and [`ScriptList`]
//! - exceptions are translated at every crossing

pub mod adapter;
pub mod bridge;
pub mod convert;
pub mod error;
pub mod host;
pub mod protected;

pub use adapter::{ScriptList, ScriptMethod, ScriptObject};
pub use bridge::ScriptBridge;
pub use convert::{WrapperCache, number_to_value, to_native, to_script, wrap_cell};
pub use error::{IntoBridge, IntoScript, RUNTIME_NAME, bridge_error, script_error};
pub use host::{NativeListHost, NativeMethodHost, NativeObjectHost};
pub use protected::Protected;
