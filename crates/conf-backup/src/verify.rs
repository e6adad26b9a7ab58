//! Snapshot verification
//!
//! Compares the live state with a snapshot without changing anything.

use std::collections::BTreeMap;

use conf_model::{in_subtrees, ConfError, ConfigBackend, InstanceOid};
use conf_schema::SchemaRegistry;

use crate::document::Snapshot;
use crate::writer::capture;

/// Instance whose live value differs from the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMismatch {
    /// Instance identifier
    pub oid: String,
    /// Value in the snapshot
    pub expected: Option<String>,
    /// Live value
    pub actual: Option<String>,
}

/// Differences between the live state and a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// In the snapshot, not live
    pub missing: Vec<String>,
    /// Live, not in the snapshot
    pub unexpected: Vec<String>,
    /// Present on both sides with different values
    pub changed: Vec<ValueMismatch>,
}

impl VerifyReport {
    /// Check if live state matches the snapshot
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.changed.is_empty()
    }

    /// Turn differences into [`ConfError::Diverged`]
    ///
    /// # Errors
    /// Fails when the report is not clean.
    pub fn into_result(self) -> Result<(), ConfError> {
        if self.is_clean() {
            return Ok(());
        }
        Err(ConfError::Diverged {
            missing: self.missing.len(),
            unexpected: self.unexpected.len(),
            changed: self.changed.len(),
        })
    }
}

/// Compare live instances under `subtrees` with the snapshot
///
/// Values are compared after parsing under the object type, so `010` and
/// `10` are equal for an integer object.
///
/// # Errors
/// Fails when the live state cannot be captured (see [`capture`]).
pub fn verify<B>(
    registry: &SchemaRegistry,
    backend: &B,
    snapshot: &Snapshot,
    subtrees: &[String],
) -> Result<VerifyReport, ConfError>
where
    B: ConfigBackend + ?Sized,
{
    let live: BTreeMap<String, Option<String>> = capture(registry, backend, subtrees)?
        .instances
        .into_iter()
        .filter_map(|entry| entry.oid.map(|oid| (oid, entry.value)))
        .collect();
    let expected: BTreeMap<String, Option<String>> = snapshot
        .instances
        .iter()
        .filter_map(|entry| entry.oid.clone().map(|oid| (oid, entry.value.clone())))
        .filter(|(oid, _)| in_subtrees(subtrees, oid))
        .collect();

    let mut report = VerifyReport::default();
    for (oid, value) in &expected {
        match live.get(oid) {
            None => report.missing.push(oid.clone()),
            Some(actual) if !same_value(registry, oid, value.as_deref(), actual.as_deref()) => {
                report.changed.push(ValueMismatch {
                    oid: oid.clone(),
                    expected: value.clone(),
                    actual: actual.clone(),
                });
            }
            Some(_) => {}
        }
    }
    report.unexpected = live.keys().filter(|oid| !expected.contains_key(*oid)).cloned().collect();

    if !report.is_clean() {
        tracing::warn!(
            "Configuration differs from snapshot: {} missing, {} unexpected, {} changed",
            report.missing.len(),
            report.unexpected.len(),
            report.changed.len()
        );
    }
    Ok(report)
}

fn same_value(
    registry: &SchemaRegistry,
    oid: &str,
    expected: Option<&str>,
    actual: Option<&str>,
) -> bool {
    if expected == actual {
        return true;
    }
    let (Some(expected), Some(actual)) = (expected, actual) else {
        return false;
    };
    let Some(value_type) = oid
        .parse::<InstanceOid>()
        .ok()
        .and_then(|oid| registry.object_for_instance(&oid))
        .map(|idx| registry.get(idx).value_type())
    else {
        return false;
    };
    matches!((value_type.parse(expected), value_type.parse(actual)), (Ok(a), Ok(b)) if a == b)
}
