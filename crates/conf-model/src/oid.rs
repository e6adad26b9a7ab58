//! Identifiers for the configuration tree
//!
//! Provides [`ObjectOid`] for addressing schema objects and [`InstanceOid`]
//! for addressing concrete instances, plus the tree ordering used everywhere
//! instances are sorted.
//!
//! # Format
//! - Object: `/agent/interface/mtu` (root is `/`)
//! - Instance: `/agent:A/interface:eth0/mtu:` (root is `/:`)

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separator between identifier levels
pub const SEPARATOR: char = '/';

/// Separator between sub-identifier and instance name
pub const NAME_SEPARATOR: char = ':';

/// Sub-identifier of agent root objects
pub const AGENT_SUBID: &str = "agent";

/// Compare two identifiers in tree order
///
/// Byte-wise lexicographic comparison where `/` sorts before every other
/// character, so that every node is immediately followed by its descendants.
///
/// # Examples
/// `/a:1/b:1` < `/a:1/b:1/c:1` < `/a:1/b:1-x`
#[must_use]
pub fn compare_oids(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut i = 0;
    loop {
        match (a.get(i), b.get(i)) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x == y => i += 1,
            (Some(b'/'), Some(_)) => return Ordering::Less,
            (Some(_), Some(b'/')) => return Ordering::Greater,
            (Some(x), Some(y)) => return x.cmp(y),
        }
    }
}

/// Check whether `oid` falls under one of the subtree filters
///
/// Filters are plain string prefixes; an empty filter list matches every
/// identifier.
#[must_use]
pub fn in_subtrees<S: AsRef<str>>(subtrees: &[S], oid: &str) -> bool {
    if subtrees.is_empty() {
        return oid.starts_with(SEPARATOR);
    }
    subtrees.iter().any(|s| oid.starts_with(s.as_ref()))
}

/// Instance identifier a subtree filter is rooted at
///
/// Filters may be written with a trailing `/` (`/agent:A/`) to keep the
/// prefix match from reaching sibling names such as `/agent:AB`.
#[must_use]
pub fn subtree_root(filter: &str) -> &str {
    match filter.strip_suffix(SEPARATOR) {
        Some(root) if !root.is_empty() => root,
        _ => filter,
    }
}

/// Identifier of a schema object
///
/// Absolute path of sub-identifiers, e.g. `/agent/interface`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectOid(String);

impl ObjectOid {
    /// Root object `/`
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    /// Agent object `/agent`
    #[inline]
    #[must_use]
    pub fn agent() -> Self {
        Self(format!("{SEPARATOR}{AGENT_SUBID}"))
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the root object
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Number of levels below the root
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches(SEPARATOR).count()
        }
    }

    /// Last sub-identifier (empty for root)
    #[inline]
    #[must_use]
    pub fn subid(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or_default()
    }

    /// Parent object (none for root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(0) => Some(Self::root()),
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => None,
        }
    }

    /// Child object with the given sub-identifier
    #[must_use]
    pub fn child(&self, subid: &str) -> Self {
        if self.is_root() {
            Self(format!("{SEPARATOR}{subid}"))
        } else {
            Self(format!("{}{SEPARATOR}{subid}", self.0))
        }
    }

    /// Check if this object is `other` or one of its ancestors
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.is_root()
            || other.0 == self.0
            || (other.0.starts_with(&self.0) && other.0[self.0.len()..].starts_with(SEPARATOR))
    }
}

impl Display for ObjectOid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectOid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix(SEPARATOR) else {
            return Err(OidError::NotAbsolute(s.to_string()));
        };
        if rest.is_empty() {
            return Ok(Self::root());
        }
        for segment in rest.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(OidError::EmptySegment(s.to_string()));
            }
            if segment.contains(NAME_SEPARATOR) || segment.contains(char::is_whitespace) {
                return Err(OidError::InvalidSegment {
                    oid: s.to_string(),
                    segment: segment.to_string(),
                });
            }
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ObjectOid {
    type Error = OidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectOid> for String {
    fn from(oid: ObjectOid) -> Self {
        oid.0
    }
}

/// Identifier of a concrete instance
///
/// Each level carries a sub-identifier and an instance name separated by
/// `:`, e.g. `/agent:A/interface:eth0`. Ordering follows [`compare_oids`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceOid(String);

impl InstanceOid {
    /// Root instance `/:`
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(format!("{SEPARATOR}{NAME_SEPARATOR}"))
    }

    /// Agent root instance `/agent:<name>`
    #[inline]
    #[must_use]
    pub fn agent(name: &str) -> Self {
        Self(format!("{SEPARATOR}{AGENT_SUBID}{NAME_SEPARATOR}{name}"))
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the root instance
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 2
    }

    /// Number of levels below the root
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches(SEPARATOR).count()
        }
    }

    fn segments(&self) -> impl Iterator<Item = (&str, &str)> {
        let rest = if self.is_root() { "" } else { &self.0[1..] };
        rest.split(SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.split_once(NAME_SEPARATOR).unwrap_or((segment, "")))
    }

    /// Sub-identifier of the last level (empty for root)
    #[must_use]
    pub fn subid(&self) -> &str {
        self.segments().last().map_or("", |(subid, _)| subid)
    }

    /// Instance name of the last level (empty for root)
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments().last().map_or("", |(_, name)| name)
    }

    /// Object this instance belongs to
    #[must_use]
    pub fn object_oid(&self) -> ObjectOid {
        if self.is_root() {
            return ObjectOid::root();
        }
        let mut oid = String::with_capacity(self.0.len());
        for (subid, _) in self.segments() {
            oid.push(SEPARATOR);
            oid.push_str(subid);
        }
        ObjectOid(oid)
    }

    /// Parent instance (none for root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(0) => Some(Self::root()),
            Some(pos) => Some(Self(self.0[..pos].to_string())),
            None => None,
        }
    }

    /// Child instance with the given sub-identifier and name
    #[must_use]
    pub fn child(&self, subid: &str, name: &str) -> Self {
        if self.is_root() {
            Self(format!("{SEPARATOR}{subid}{NAME_SEPARATOR}{name}"))
        } else {
            Self(format!("{}{SEPARATOR}{subid}{NAME_SEPARATOR}{name}", self.0))
        }
    }

    /// Check if this is an agent root `/agent:<name>`
    #[must_use]
    pub fn is_agent_root(&self) -> bool {
        self.depth() == 1 && self.subid() == AGENT_SUBID
    }

    /// Name of the agent owning this instance
    #[must_use]
    pub fn agent_name(&self) -> Option<&str> {
        match self.segments().next() {
            Some((AGENT_SUBID, name)) => Some(name),
            _ => None,
        }
    }

    /// Check if this instance is `ancestor` or lies below it
    #[must_use]
    pub fn is_within(&self, ancestor: &Self) -> bool {
        ancestor.is_root()
            || self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0)
                && self.0[ancestor.0.len()..].starts_with(SEPARATOR))
    }
}

impl Display for InstanceOid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialOrd for InstanceOid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InstanceOid {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_oids(&self.0, &other.0)
    }
}

impl FromStr for InstanceOid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix(SEPARATOR) else {
            return Err(OidError::NotAbsolute(s.to_string()));
        };
        if rest == ":" {
            return Ok(Self::root());
        }
        if rest.is_empty() {
            return Err(OidError::EmptySegment(s.to_string()));
        }
        for segment in rest.split(SEPARATOR) {
            match segment.split_once(NAME_SEPARATOR) {
                Some((subid, _)) if !subid.is_empty() && !subid.contains(char::is_whitespace) => {}
                Some(_) => {
                    return Err(OidError::InvalidSegment {
                        oid: s.to_string(),
                        segment: segment.to_string(),
                    })
                }
                None => {
                    return Err(OidError::MissingName {
                        oid: s.to_string(),
                        segment: segment.to_string(),
                    })
                }
            }
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for InstanceOid {
    type Error = OidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstanceOid> for String {
    fn from(oid: InstanceOid) -> Self {
        oid.0
    }
}

/// Malformed identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OidError {
    /// Identifier does not start with `/`
    #[error("identifier '{0}' is not absolute")]
    NotAbsolute(String),

    /// Two consecutive separators or trailing separator
    #[error("identifier '{0}' contains an empty level")]
    EmptySegment(String),

    /// Level with forbidden characters
    #[error("identifier '{oid}' has invalid level '{segment}'")]
    InvalidSegment { oid: String, segment: String },

    /// Instance level without `:` name separator
    #[error("instance identifier '{oid}' has level '{segment}' without a name")]
    MissingName { oid: String, segment: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inst(s: &str) -> InstanceOid {
        s.parse().unwrap()
    }

    #[test]
    fn object_root_and_parent() {
        let oid: ObjectOid = "/agent/interface".parse().unwrap();
        assert_eq!(oid.depth(), 2);
        assert_eq!(oid.subid(), "interface");
        assert_eq!(oid.parent(), Some(ObjectOid::agent()));
        assert_eq!(ObjectOid::agent().parent(), Some(ObjectOid::root()));
        assert_eq!(ObjectOid::root().parent(), None);
        assert_eq!(ObjectOid::root().depth(), 0);
    }

    #[test]
    fn object_rejects_malformed() {
        assert!(matches!("agent".parse::<ObjectOid>(), Err(OidError::NotAbsolute(_))));
        assert!(matches!("/agent//x".parse::<ObjectOid>(), Err(OidError::EmptySegment(_))));
        assert!(matches!(
            "/agent:A".parse::<ObjectOid>(),
            Err(OidError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn object_prefix_respects_levels() {
        let a: ObjectOid = "/agent/route".parse().unwrap();
        let b: ObjectOid = "/agent/route/gw".parse().unwrap();
        let c: ObjectOid = "/agent/router".parse().unwrap();
        assert!(a.is_prefix_of(&b));
        assert!(!a.is_prefix_of(&c));
        assert!(ObjectOid::root().is_prefix_of(&c));
    }

    #[test]
    fn instance_parts() {
        let oid = inst("/agent:A/interface:eth0/mtu:");
        assert_eq!(oid.depth(), 3);
        assert_eq!(oid.subid(), "mtu");
        assert_eq!(oid.name(), "");
        assert_eq!(oid.object_oid().as_str(), "/agent/interface/mtu");
        assert_eq!(oid.agent_name(), Some("A"));
        assert_eq!(oid.parent(), Some(inst("/agent:A/interface:eth0")));
    }

    #[test]
    fn instance_root() {
        let root = inst("/:");
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.object_oid(), ObjectOid::root());
        assert_eq!(inst("/agent:A").parent(), Some(root));
    }

    #[test]
    fn instance_name_keeps_extra_colons() {
        let oid = inst("/agent:A/neigh:fe80::1");
        assert_eq!(oid.name(), "fe80::1");
        assert_eq!(oid.object_oid().as_str(), "/agent/neigh");
    }

    #[test]
    fn instance_rejects_malformed() {
        assert!(matches!("/agent".parse::<InstanceOid>(), Err(OidError::MissingName { .. })));
        assert!(matches!("/".parse::<InstanceOid>(), Err(OidError::EmptySegment(_))));
        assert!(matches!(
            "/:A/x:1".parse::<InstanceOid>(),
            Err(OidError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn agent_root_detection() {
        assert!(InstanceOid::agent("A").is_agent_root());
        assert!(!inst("/agent:A/interface:eth0").is_agent_root());
        assert!(!inst("/local:A").is_agent_root());
        assert_eq!(inst("/local:A").agent_name(), None);
    }

    #[test]
    fn within_is_level_aware() {
        let agent = InstanceOid::agent("A");
        assert!(inst("/agent:A/x:1").is_within(&agent));
        assert!(agent.is_within(&agent));
        assert!(!inst("/agent:AB/x:1").is_within(&agent));
    }

    #[test]
    fn slash_sorts_first() {
        let mut oids = vec![inst("/a:1/b:c-d"), inst("/a:1/b:c/y:1"), inst("/a:1/b:c")];
        oids.sort();
        assert_eq!(oids, vec![inst("/a:1/b:c"), inst("/a:1/b:c/y:1"), inst("/a:1/b:c-d")]);
    }

    #[test]
    fn subtree_root_strips_trailing_separator() {
        assert_eq!(subtree_root("/agent:A/"), "/agent:A");
        assert_eq!(subtree_root("/agent:A"), "/agent:A");
        assert_eq!(subtree_root("/"), "/");
        assert!(!in_subtrees(&["/agent:A/"], "/agent:AB/x:1"));
    }

    #[test]
    fn subtree_filters() {
        assert!(in_subtrees::<&str>(&[], "/agent:A/x:1"));
        assert!(in_subtrees(&["/agent:A"], "/agent:A/x:1"));
        assert!(!in_subtrees(&["/agent:B"], "/agent:A/x:1"));
    }

    #[test]
    fn string_conversions_round_trip() {
        let oid = inst("/agent:A/interface:eth0");
        let text = String::from(oid.clone());
        assert_eq!(InstanceOid::try_from(text).unwrap(), oid);
    }

    fn oid_strategy() -> impl Strategy<Value = String> {
        proptest::collection::vec("[a-c/:-]{0,3}", 1..4)
            .prop_map(|parts| format!("/{}", parts.join("/")))
    }

    proptest! {
        #[test]
        fn tree_order_is_total(a in oid_strategy(), b in oid_strategy(), c in oid_strategy()) {
            prop_assert_eq!(compare_oids(&a, &b), compare_oids(&b, &a).reverse());
            prop_assert_eq!(compare_oids(&a, &b) == Ordering::Equal, a == b);
            if compare_oids(&a, &b) != Ordering::Greater
                && compare_oids(&b, &c) != Ordering::Greater
            {
                prop_assert_ne!(compare_oids(&a, &c), Ordering::Greater);
            }
        }

        #[test]
        fn descendants_follow_ancestor(
            base in "[a-c]{1,3}",
            tail in "[a-c-]{1,3}",
            sibling in "[a-c-]{1,3}",
        ) {
            let parent = format!("/x:{base}");
            let child = format!("{parent}/y:{tail}");
            let later = format!("{parent}{sibling}");
            prop_assert_eq!(compare_oids(&parent, &child), Ordering::Less);
            prop_assert_eq!(compare_oids(&child, &later), Ordering::Less);
        }
    }
}
