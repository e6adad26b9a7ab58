//! Configuration schema
//!
//! Registry of configuration objects and the dependencies between them.
//!
//! # Core Concepts
//!
//! - [`ObjectSpec`]: Raw object description as found in snapshots
//! - [`SchemaRegistry`]: Validated objects with backend-assigned ordinals
//! - [`DependencyGraph`]: Which objects must be configured before which
//!
//! # Example
//!
//! ```rust,ignore
//! use conf_schema::{ObjectSpec, SchemaRegistry};
//!
//! let mut registry = SchemaRegistry::new();
//! let spec = ObjectSpec::new("/agent/interface").with_access("read_create");
//! let idx = registry.register_spec(&mut backend, &spec)?;
//! assert!(registry.ordinal(idx) > registry.ordinal(registry.agent()));
//! ```

#![warn(unreachable_pub)]

mod graph;
mod object;
mod registry;

pub use graph::{Dependency, DependencyGraph};
pub use object::{DependencySpec, ObjectIdx, ObjectSpec, SchemaObject};
pub use registry::SchemaRegistry;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
