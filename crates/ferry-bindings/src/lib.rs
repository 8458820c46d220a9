//! ferry-bindings - native capabilities exposed through the object protocol.
//!
//! - [`config`]: property files and a tree view over their dotted keys
//! - [`dependency`]: manifest dependency descriptors and version matching
//! - [`network`]: interface information and proxy overrides

pub mod config;
pub mod dependency;
pub mod network;

pub use config::{ConfigObject, PropertyFile};
pub use dependency::{
    Dependency, DependencyType, Requirement, Resolution, compare_versions, dependency_binding,
};
pub use network::{Interface, InterfaceAddress, Proxy, network_binding};
