//! Instance tree builder
//!
//! Reconstructs parent/child links of a flat instance list by sorting the
//! identifiers in tree order and tracking depth.

use conf_model::{compare_oids, ConfError};

use crate::instance::{InstanceIdx, InstanceSet};

/// Link every record to its parent within the set
///
/// Records whose parent is not part of the set become tree roots. Existing
/// links are replaced, the processing order is left untouched.
///
/// # Errors
/// Returns [`ConfError::InvalidSchema`] when a record is more than one level
/// below its predecessor in tree order, or when the inferred parent is not an
/// ancestor of the record.
pub fn fill_children(set: &mut InstanceSet) -> Result<(), ConfError> {
    set.clear_links();

    let mut sorted: Vec<InstanceIdx> = set.order().to_vec();
    sorted.sort_by(|a, b| compare_oids(set.get(*a).oid().as_str(), set.get(*b).oid().as_str()));

    let mut prev: Option<(InstanceIdx, usize)> = None;
    for &idx in &sorted {
        let level = set.get(idx).oid().depth();
        let parent = match prev {
            None => None,
            Some((prev_idx, prev_level)) if level > prev_level => {
                if level > prev_level + 1 {
                    let oid = set.get(idx).oid();
                    tracing::error!("Instance {oid} has no immediate parent");
                    return Err(ConfError::invalid_schema(
                        oid.as_str(),
                        "instance has no immediate parent",
                    ));
                }
                Some(prev_idx)
            }
            Some((prev_idx, prev_level)) => {
                let mut parent = set.get(prev_idx).parent();
                for _ in level..prev_level {
                    match parent {
                        Some(p) => parent = set.get(p).parent(),
                        None => break,
                    }
                }
                parent
            }
        };

        if let Some(parent) = parent {
            let parent_oid = set.get(parent).oid();
            let oid = set.get(idx).oid();
            if !oid.is_within(parent_oid) {
                tracing::error!("{parent_oid} does not seem to be parent of {oid}");
                return Err(ConfError::invalid_schema(
                    oid.as_str(),
                    format!("'{parent_oid}' does not seem to be its parent"),
                ));
            }
            set.get_mut(idx).parent = Some(parent);
            set.get_mut(parent).children.push(idx);
        }
        prev = Some((idx, level));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceRecord;
    use conf_schema::SchemaRegistry;

    fn set_of(oids: &[&str]) -> InstanceSet {
        let registry = SchemaRegistry::new();
        let mut set = InstanceSet::new();
        for oid in oids {
            set.push(InstanceRecord::new(oid.parse().unwrap(), registry.root(), None, None));
        }
        set
    }

    fn oid_of(set: &InstanceSet, idx: Option<InstanceIdx>) -> Option<String> {
        idx.map(|i| set.get(i).oid().to_string())
    }

    #[test]
    fn links_parents_regardless_of_input_order() {
        let mut set = set_of(&[
            "/agent:A/bridge:br0/port:p1",
            "/agent:A/bridge:br0",
            "/agent:A/bridge:br0-x",
            "/agent:A/bridge:br0/port:p2",
        ]);
        fill_children(&mut set).unwrap();
        let order = set.order().to_vec();
        let br0 = Some("/agent:A/bridge:br0");
        assert_eq!(oid_of(&set, set.get(order[0]).parent()).as_deref(), br0);
        assert_eq!(set.get(order[1]).children().len(), 2);
        assert_eq!(set.get(order[2]).parent(), None);
        assert_eq!(oid_of(&set, set.get(order[3]).parent()).as_deref(), br0);
    }

    #[test]
    fn walks_back_up_several_levels() {
        let mut set = set_of(&[
            "/agent:A/x:1",
            "/agent:A/x:1/y:1",
            "/agent:A/x:1/y:1/z:1",
            "/agent:A/x:1/zz:1",
        ]);
        fill_children(&mut set).unwrap();
        let order = set.order().to_vec();
        assert_eq!(oid_of(&set, set.get(order[3]).parent()).as_deref(), Some("/agent:A/x:1"));
        assert_eq!(set.get(order[0]).children().len(), 2);
    }

    #[test]
    fn gap_in_levels_is_rejected() {
        let mut set = set_of(&["/agent:A/x:1", "/agent:A/x:1/y:1/z:1"]);
        assert!(matches!(fill_children(&mut set), Err(ConfError::InvalidSchema { .. })));
    }

    #[test]
    fn sibling_sharing_a_name_prefix_is_not_a_parent() {
        let mut set = set_of(&["/agent:A/bridge:br0", "/agent:A/bridge:br0x/port:p1"]);
        assert!(matches!(fill_children(&mut set), Err(ConfError::InvalidSchema { .. })));
        assert!(set.iter().all(|r| r.parent().is_none() && r.children().is_empty()));
    }

    #[test]
    fn first_entry_may_start_deep() {
        let mut set = set_of(&["/agent:A/x:1/y:1", "/agent:B/x:1"]);
        fill_children(&mut set).unwrap();
        assert!(set.iter().all(|r| r.parent().is_none()));
    }

    #[test]
    fn rebuilding_replaces_links() {
        let mut set = set_of(&["/agent:A/x:1", "/agent:A/x:1/y:1"]);
        fill_children(&mut set).unwrap();
        fill_children(&mut set).unwrap();
        assert_eq!(set.get(set.order()[0]).children().len(), 1);
    }
}
