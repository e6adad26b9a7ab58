//! Snapshot documents
//!
//! Provides [`Snapshot`] (object descriptions followed by instance entries)
//! and [`FilterDocument`] (a list of subtree roots), with JSON and YAML
//! encodings.

use std::fs;
use std::path::Path;

use conf_model::ConfError;
use conf_schema::ObjectSpec;
use serde::{Deserialize, Serialize};

/// Encoding of a snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

impl SnapshotFormat {
    /// Pick the format from a file extension, JSON unless `.yaml`/`.yml`
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// One instance entry of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceEntry {
    /// Instance identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    /// Value as text (typed objects only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl InstanceEntry {
    /// Entry with identifier and optional value
    #[must_use]
    pub fn new(oid: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            oid: Some(oid.into()),
            value: value.map(str::to_string),
        }
    }
}

/// Configuration snapshot
///
/// Objects are listed parents first; instances follow in pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Object descriptions
    pub objects: Vec<ObjectSpec>,
    /// Instance entries
    pub instances: Vec<InstanceEntry>,
}

impl Snapshot {
    /// Decode a snapshot
    ///
    /// # Errors
    /// Returns [`ConfError::Format`] when the text is not a snapshot.
    pub fn parse(text: &str, format: SnapshotFormat) -> Result<Self, ConfError> {
        match format {
            SnapshotFormat::Json => {
                serde_json::from_str(text).map_err(|e| ConfError::Format(e.to_string()))
            }
            SnapshotFormat::Yaml => {
                serde_yaml::from_str(text).map_err(|e| ConfError::Format(e.to_string()))
            }
        }
    }

    /// Encode a snapshot
    ///
    /// # Errors
    /// Returns [`ConfError::Format`] when encoding fails.
    pub fn render(&self, format: SnapshotFormat) -> Result<String, ConfError> {
        match format {
            SnapshotFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| ConfError::Format(e.to_string()))
            }
            SnapshotFormat::Yaml => {
                serde_yaml::to_string(self).map_err(|e| ConfError::Format(e.to_string()))
            }
        }
    }

    /// Read a snapshot file, format chosen by extension
    ///
    /// # Errors
    /// Returns [`ConfError::Io`] or [`ConfError::Format`].
    pub fn load(path: &Path) -> Result<Self, ConfError> {
        let text = fs::read_to_string(path).map_err(|e| ConfError::io(path, e))?;
        Self::parse(&text, SnapshotFormat::from_path(path))
    }
}

/// Subtree filter document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDocument {
    /// Subtree roots
    #[serde(default)]
    pub subtrees: Vec<String>,
}

impl FilterDocument {
    /// Filter over the given subtrees
    #[must_use]
    pub fn new(subtrees: &[String]) -> Self {
        Self {
            subtrees: subtrees.to_vec(),
        }
    }

    /// Read a filter file, format chosen by extension
    ///
    /// # Errors
    /// Returns [`ConfError::Io`] or [`ConfError::Format`].
    pub fn load(path: &Path) -> Result<Self, ConfError> {
        let text = fs::read_to_string(path).map_err(|e| ConfError::io(path, e))?;
        match SnapshotFormat::from_path(path) {
            SnapshotFormat::Json => {
                serde_json::from_str(&text).map_err(|e| ConfError::Format(e.to_string()))
            }
            SnapshotFormat::Yaml => {
                serde_yaml::from_str(&text).map_err(|e| ConfError::Format(e.to_string()))
            }
        }
    }
}
