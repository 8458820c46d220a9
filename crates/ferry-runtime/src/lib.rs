//! ferry-runtime - hosting the script runtime for multi-threaded programs.
//!
//! The script heap belongs to one thread. This crate gives that thread to an
//! [`Engine`] and lets the rest of the program reach it:
//!
//! - [`EngineHandle`] queues jobs (`run`, `try_run`, `run_async`)
//! - [`MarshaledObject`], [`MarshaledMethod`] and [`MarshaledList`] turn
//!   script-owned values into objects callable from any thread
//! - [`ScriptRegistry`] dispatches code to evaluators by MIME type
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   jobs (bounded)   ┌──────────────────────────────┐
//! │ EngineHandle │ ─────────────────> │ engine thread                │
//! │ (any thread) │ <───────────────── │  ScriptContext + ScriptBridge │
//! └──────────────┘   results          │  collect_if_needed per job   │
//!        ↑                            └──────────────────────────────┘
//!        │ routes every call
//! ┌──────────────────┐
//! │ MarshaledObject  │
//! └──────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod registry;

pub use config::RuntimeConfig;
pub use engine::{Engine, EngineBuilder, EngineHandle, EngineStats, EngineStatsSnapshot, Job};
pub use error::{RuntimeError, RuntimeResult};
pub use marshal::{MarshaledList, MarshaledMethod, MarshaledObject, marshal, unmarshal};
pub use registry::{Preprocessed, ScriptRegistry, add_evaluator, remove_evaluator};
