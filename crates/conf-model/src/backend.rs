//! Backend contract
//!
//! Provides the [`ConfigBackend`] trait through which every change to the
//! live configuration database is made, and the [`Request`] values it
//! accepts. All mutations go through [`ConfigBackend::apply`].

use std::fmt::{self, Display, Formatter};

use crate::access::{AccessMode, DependencyScope};
use crate::error::BackendError;
use crate::oid::{InstanceOid, ObjectOid};
use crate::value::{Value, ValueType};

/// Opaque reference to a live instance
///
/// Handles may go stale once the instance is deleted or the backend
/// resynchronizes; always re-check with [`ConfigBackend::instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Object registration sent to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Object identifier
    pub oid: ObjectOid,
    /// Value type of instances
    pub value_type: ValueType,
    /// Access mode
    pub access: AccessMode,
    /// Default value as text
    pub default: Option<String>,
    /// Instances are not persisted
    pub volatile: bool,
    /// Object subtree is configured as a unit
    pub unit: bool,
    /// Implicit dependency on the parent object
    pub parent_dep: bool,
}

impl Registration {
    /// Create a registration with default attributes
    #[must_use]
    pub fn new(oid: ObjectOid) -> Self {
        Self {
            oid,
            value_type: ValueType::None,
            access: AccessMode::ReadCreate,
            default: None,
            volatile: false,
            unit: false,
            parent_dep: true,
        }
    }
}

/// Request to the configuration database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Register a schema object
    Register(Registration),

    /// Declare that `owner` depends on `target`
    AddDependency {
        /// Dependent object
        owner: ObjectOid,
        /// Object depended upon
        target: ObjectOid,
        /// Dependency scope
        scope: DependencyScope,
    },

    /// Create an instance
    Add {
        /// New instance
        oid: InstanceOid,
        /// Initial value (typed objects only)
        value: Option<Value>,
        /// Defer propagation until [`Request::Commit`]
        local: bool,
    },

    /// Change the value of an instance
    Set {
        /// Instance handle
        handle: Handle,
        /// Instance identifier
        oid: InstanceOid,
        /// New value
        value: Value,
        /// Defer propagation until [`Request::Commit`]
        local: bool,
    },

    /// Delete an instance
    Delete {
        /// Instance handle
        handle: Handle,
        /// Instance identifier
        oid: InstanceOid,
    },

    /// Propagate pending local changes under `oid`
    Commit {
        /// Unit root
        oid: InstanceOid,
    },
}

impl Request {
    /// Short request name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::AddDependency { .. } => "add_dependency",
            Self::Add { .. } => "add",
            Self::Set { .. } => "set",
            Self::Delete { .. } => "delete",
            Self::Commit { .. } => "commit",
        }
    }

    /// Identifier the request targets
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Register(reg) => reg.oid.as_str(),
            Self::AddDependency { owner, .. } => owner.as_str(),
            Self::Add { oid, .. }
            | Self::Set { oid, .. }
            | Self::Delete { oid, .. }
            | Self::Commit { oid } => oid.as_str(),
        }
    }

    /// Check if the request changes instances
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Add { .. } | Self::Set { .. } | Self::Delete { .. } | Self::Commit { .. }
        )
    }
}

/// Backend reply to a [`Request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Request applied
    Done,
    /// Object registered with the given ordinal
    Registered {
        /// Registration order of the object
        ordinal: u32,
    },
}

/// Snapshot of one live instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInstance {
    /// Instance handle
    pub handle: Handle,
    /// Instance identifier
    pub oid: InstanceOid,
    /// Current value
    pub value: Option<Value>,
    /// Direct children in tree order
    pub children: Vec<Handle>,
}

/// Live configuration database
///
/// Implementations hold the authoritative instance tree and talk to the
/// agents. The reconciliation engine never mutates state other than through
/// [`ConfigBackend::apply`].
pub trait ConfigBackend {
    /// Apply a single request
    ///
    /// # Errors
    /// Returns [`BackendError`] with kind `NotFound` when a prerequisite is
    /// not present yet; other kinds are fatal for the caller.
    fn apply(&mut self, request: Request) -> Result<Response, BackendError>;

    /// Resolve an instance identifier
    fn find(&self, oid: &InstanceOid) -> Option<Handle>;

    /// Read a live instance
    fn instance(&self, handle: Handle) -> Option<LiveInstance>;

    /// All live instance handles, root included
    fn instances(&self) -> Vec<Handle>;

    /// Pull the agent state of a subtree into the database
    ///
    /// # Errors
    /// Returns [`BackendError`] when the subtree cannot be synchronized.
    fn sync(&mut self, subtree: &str) -> Result<(), BackendError>;
}

impl<B: ConfigBackend + ?Sized> ConfigBackend for &mut B {
    fn apply(&mut self, request: Request) -> Result<Response, BackendError> {
        (**self).apply(request)
    }

    fn find(&self, oid: &InstanceOid) -> Option<Handle> {
        (**self).find(oid)
    }

    fn instance(&self, handle: Handle) -> Option<LiveInstance> {
        (**self).instance(handle)
    }

    fn instances(&self) -> Vec<Handle> {
        (**self).instances()
    }

    fn sync(&mut self, subtree: &str) -> Result<(), BackendError> {
        (**self).sync(subtree)
    }
}
