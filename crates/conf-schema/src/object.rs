//! Object descriptions
//!
//! Provides [`ObjectSpec`] (the raw, textual description of an object as it
//! appears in a snapshot) and [`SchemaObject`] (a validated, registered
//! object).

use conf_model::{AccessMode, ObjectOid, ValueType};
use serde::{Deserialize, Serialize};

/// Index of a registered object inside its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectIdx(pub(crate) usize);

impl ObjectIdx {
    /// Position in the registry arena
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Raw object description
///
/// Every attribute is kept as text so that validation errors can be
/// reported against the original spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectSpec {
    /// Object identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    /// `read_only`, `read_write` or `read_create`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    /// Value type name
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    /// Default value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// `true` or `false`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatile: Option<String>,
    /// `true` or `false`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// `yes` or `no`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_dep: Option<String>,
    /// Objects this one depends on
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<DependencySpec>,
}

impl ObjectSpec {
    /// Description with only an identifier
    #[must_use]
    pub fn new(oid: impl Into<String>) -> Self {
        Self {
            oid: Some(oid.into()),
            ..Self::default()
        }
    }

    /// Set value type
    #[must_use]
    pub fn with_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = Some(value_type.into());
        self
    }

    /// Set access mode
    #[must_use]
    pub fn with_access(mut self, access: impl Into<String>) -> Self {
        self.access = Some(access.into());
        self
    }

    /// Set default value
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Mark as volatile
    #[must_use]
    pub fn volatile(mut self) -> Self {
        self.volatile = Some("true".to_string());
        self
    }

    /// Mark as unit root
    #[must_use]
    pub fn unit(mut self) -> Self {
        self.unit = Some("true".to_string());
        self
    }

    /// Drop the implicit dependency on the parent
    #[must_use]
    pub fn without_parent_dep(mut self) -> Self {
        self.parent_dep = Some("no".to_string());
        self
    }

    /// Add a dependency
    #[must_use]
    pub fn depends_on(mut self, oid: impl Into<String>, scope: Option<&str>) -> Self {
        self.depends.push(DependencySpec {
            oid: Some(oid.into()),
            scope: scope.map(str::to_string),
        });
        self
    }
}

/// Raw dependency description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencySpec {
    /// Target object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    /// `instance` (default) or `object`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Registered object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    pub(crate) oid: ObjectOid,
    pub(crate) value_type: ValueType,
    pub(crate) access: AccessMode,
    pub(crate) default: Option<String>,
    pub(crate) volatile: bool,
    pub(crate) unit: bool,
    pub(crate) unit_part: bool,
    pub(crate) parent_dep: bool,
    pub(crate) ordinal: u32,
    pub(crate) parent: Option<ObjectIdx>,
    pub(crate) children: Vec<ObjectIdx>,
}

impl SchemaObject {
    /// Object identifier
    #[inline]
    #[must_use]
    pub fn oid(&self) -> &ObjectOid {
        &self.oid
    }

    /// Value type
    #[inline]
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Access mode
    #[inline]
    #[must_use]
    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Default value text
    #[inline]
    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Volatile flag of the object itself (see
    /// [`SchemaRegistry::is_volatile`](crate::SchemaRegistry::is_volatile) for
    /// the inherited flag)
    #[inline]
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    /// Object roots a unit
    #[inline]
    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.unit
    }

    /// Object lies strictly inside a unit
    #[inline]
    #[must_use]
    pub fn is_unit_part(&self) -> bool {
        self.unit_part
    }

    /// Implicit dependency on the parent object
    #[inline]
    #[must_use]
    pub fn parent_dep(&self) -> bool {
        self.parent_dep
    }

    /// Registration order
    #[inline]
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Parent object
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<ObjectIdx> {
        self.parent
    }

    /// Child objects in registration order
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[ObjectIdx] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_builder() {
        let spec = ObjectSpec::new("/agent/bridge")
            .with_access("read_create")
            .unit()
            .depends_on("/agent/interface", Some("object"));
        assert_eq!(spec.unit.as_deref(), Some("true"));
        assert_eq!(spec.depends.len(), 1);
        assert_eq!(spec.depends[0].scope.as_deref(), Some("object"));
    }

    #[test]
    fn spec_serde_uses_type_key() {
        let json = r#"{"oid":"/agent/mtu","type":"int32","default":"1500"}"#;
        let spec: ObjectSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.value_type.as_deref(), Some("int32"));
        assert_eq!(serde_json::to_string(&spec).unwrap(), json);
    }
}
