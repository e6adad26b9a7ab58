//! Restore configuration

use conf_model::ConfError;
use serde::{Deserialize, Serialize};

/// Round bound used when none is configured
pub const DEFAULT_MAX_ROUNDS: usize = 11;

/// Tuning of the reconciliation loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Maximum number of prune/apply rounds before giving up on
    /// dependency effects settling
    pub max_rounds: usize,
    /// Subtree resynchronized when no subtree filter is given
    pub root_subtree: String,
    /// Treat `NotFound` on delete as already done
    pub tolerate_missing_on_delete: bool,
}

impl RestoreConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With round bound (at least one round always runs)
    #[inline]
    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// With root resynchronization subtree
    #[inline]
    #[must_use]
    pub fn with_root_subtree(mut self, subtree: impl Into<String>) -> Self {
        self.root_subtree = subtree.into();
        self
    }

    /// Fail the restore when a delete reports `NotFound`
    #[inline]
    #[must_use]
    pub fn strict_deletes(mut self) -> Self {
        self.tolerate_missing_on_delete = false;
        self
    }

    /// Parse from TOML, missing keys keep their defaults
    ///
    /// # Errors
    /// Returns [`ConfError::Format`] for malformed TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfError::Format(e.to_string()))?;
        let max_rounds = config.max_rounds;
        Ok(config.with_max_rounds(max_rounds))
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            root_subtree: "/:".to_string(),
            tolerate_missing_on_delete: true,
        }
    }
}
