//! Error types for configuration backup and restore
//!
//! Provides:
//! - [`BackendError`] raised by a [`ConfigBackend`](crate::ConfigBackend)
//! - [`ConfError`] raised by registration, parsing, restore and capture

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use crate::value::ValueError;

/// Failure reported by the configuration database
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    /// Error category
    pub kind: BackendErrorKind,
    /// Human-readable detail
    pub message: String,
}

/// Category of a [`BackendError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// Referenced object or instance is not present (possibly not yet)
    NotFound,
    /// Target already exists
    AlreadyExists,
    /// Operation not supported for the target
    Unsupported,
    /// Agent rejected the change
    Rejected,
    /// Agent or database unreachable
    Unavailable,
}

impl Display for BackendErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::Unsupported => "unsupported",
            Self::Rejected => "rejected",
            Self::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

impl BackendError {
    /// Create error of the given kind
    #[inline]
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Missing prerequisite
    #[inline]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    /// Duplicate target
    #[inline]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::AlreadyExists, message)
    }

    /// Unsupported operation
    #[inline]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unsupported, message)
    }

    /// Rejected change
    #[inline]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Rejected, message)
    }

    /// Check if the error means "not present (yet)"
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }
}

/// Main error type of configuration backup and restore
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    /// Object description or snapshot structure is invalid
    #[error("invalid schema at '{oid}': {reason}")]
    InvalidSchema { oid: String, reason: String },

    /// Referenced object or instance does not exist
    #[error("{what} not found: {oid}")]
    NotFound { what: &'static str, oid: String },

    /// Value does not fit the object type
    #[error("bad value for '{oid}': {source}")]
    Value {
        oid: String,
        #[source]
        source: ValueError,
    },

    /// Restore could not resolve every instance
    #[error("restore incomplete: {} instance(s) could not be created", .pending.len())]
    Incomplete { pending: Vec<String> },

    /// Backend refused a request
    #[error("backend failed on '{oid}': {source}")]
    Backend {
        oid: String,
        #[source]
        source: BackendError,
    },

    /// Live state differs from the snapshot
    #[error(
        "configuration diverged: {missing} missing, {unexpected} unexpected, {changed} changed"
    )]
    Diverged {
        missing: usize,
        unexpected: usize,
        changed: usize,
    },

    /// File access failed
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document could not be (de)serialized
    #[error("document format error: {0}")]
    Format(String),
}

impl ConfError {
    /// Schema error
    #[inline]
    pub fn invalid_schema(oid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            oid: oid.into(),
            reason: reason.into(),
        }
    }

    /// Missing object or instance
    #[inline]
    pub fn not_found(what: &'static str, oid: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            oid: oid.into(),
        }
    }

    /// Value conversion error
    #[inline]
    pub fn value(oid: impl Into<String>, source: ValueError) -> Self {
        Self::Value {
            oid: oid.into(),
            source,
        }
    }

    /// Backend failure
    #[inline]
    pub fn backend(oid: impl Into<String>, source: BackendError) -> Self {
        Self::Backend {
            oid: oid.into(),
            source,
        }
    }

    /// File access failure
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_display() {
        let err = BackendError::not_found("no parent for /agent:A/x:1");
        assert_eq!(err.to_string(), "not found: no parent for /agent:A/x:1");
        assert!(err.is_not_found());
        assert!(!BackendError::rejected("bad mtu").is_not_found());
    }

    #[test]
    fn conf_error_display() {
        let err = ConfError::invalid_schema("/agent/x", "parent object is not registered");
        assert_eq!(
            err.to_string(),
            "invalid schema at '/agent/x': parent object is not registered"
        );
        let err = ConfError::Incomplete {
            pending: vec!["/agent:A/x:1".into(), "/agent:A/x:2".into()],
        };
        assert_eq!(err.to_string(), "restore incomplete: 2 instance(s) could not be created");
    }
}
