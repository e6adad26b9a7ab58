//! Access rights of schema objects

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Access mode of a schema object
///
/// Only `read_create` instances may be added or deleted by restore; the
/// other modes are managed by the agent itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Value can only be observed
    ReadOnly,
    /// Value can be changed, instances cannot be created
    ReadWrite,
    /// Instances can be created, changed and deleted
    #[default]
    ReadCreate,
}

impl AccessMode {
    /// Canonical name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ReadWrite => "read_write",
            Self::ReadCreate => "read_create",
        }
    }

    /// Check if instances may be created and deleted
    #[inline]
    #[must_use]
    pub fn allows_create(self) -> bool {
        self == Self::ReadCreate
    }
}

impl Display for AccessMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read_only" => Ok(Self::ReadOnly),
            "read_write" => Ok(Self::ReadWrite),
            "read_create" => Ok(Self::ReadCreate),
            other => Err(format!("unknown access mode '{other}'")),
        }
    }
}

/// Scope of an object dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
    /// Each instance depends on the matching instance of the target
    #[default]
    Instance,
    /// Every instance depends on the target object as a whole
    Object,
}

impl DependencyScope {
    /// Canonical name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Object => "object",
        }
    }
}

impl Display for DependencyScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instance" => Ok(Self::Instance),
            "object" => Ok(Self::Object),
            other => Err(format!("unknown dependency scope '{other}'")),
        }
    }
}
