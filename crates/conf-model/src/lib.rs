//! Configuration model
//!
//! Shared vocabulary of the configuration backup engine.
//!
//! # Core Concepts
//!
//! - [`ObjectOid`] / [`InstanceOid`]: Hierarchical identifiers of schema objects and instances
//! - [`ValueType`] / [`Value`]: Typed instance values
//! - [`AccessMode`]: Whether instances may be created and deleted
//! - [`ConfigBackend`]: Contract of the live configuration database
//! - [`ConfError`]: Error type shared by every stage
//!
//! # Example
//!
//! ```rust
//! use conf_model::{InstanceOid, ValueType};
//!
//! let oid: InstanceOid = "/agent:A/interface:eth0/mtu:".parse().unwrap();
//! assert_eq!(oid.object_oid().as_str(), "/agent/interface/mtu");
//! assert_eq!(ValueType::Int32.parse("1500").unwrap().to_string(), "1500");
//! ```

#![warn(unreachable_pub)]

mod access;
mod backend;
mod error;
mod oid;
mod value;

pub use access::{AccessMode, DependencyScope};
pub use backend::{ConfigBackend, Handle, LiveInstance, Registration, Request, Response};
pub use error::{BackendError, BackendErrorKind, ConfError};
pub use oid::{
    compare_oids, in_subtrees, subtree_root, InstanceOid, ObjectOid, OidError, AGENT_SUBID,
    NAME_SEPARATOR, SEPARATOR,
};
pub use value::{Address, Value, ValueError, ValueType};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
