//! Ferry script heap
//!
//! An embeddable object runtime: a tracing-collected heap of objects, arrays,
//! functions and host objects, owned by one thread, with counted
//! protections that let embedders keep cells alive from outside the heap.
//!
//! ## Design
//!
//! - **Handles**: [`CellRef`] is a generation-checked index; it never keeps a
//!   cell alive on its own
//! - **Roots**: the global object plus every protected cell
//! - **Collection**: stop-the-world mark-sweep, only at explicit safepoints
//! - **Host objects**: embedder-defined cells; opaque to the collector

pub mod context;
pub mod error;
pub mod heap;
pub mod host;
pub mod value;

pub use context::{MAX_ARRAY_LENGTH, ScriptContext, WeakScriptContext};
pub use error::{Exception, ScriptError, ScriptResult};
pub use heap::{HeapConfig, HeapStats};
pub use host::{HostFn, HostObject};
pub use value::{CellRef, ScriptValue};
