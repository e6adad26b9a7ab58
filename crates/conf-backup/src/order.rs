//! Topological orderer
//!
//! Orders instances by the registration ordinal of their object, so that
//! parents and dependency targets are configured before dependants.

use std::collections::HashSet;

use conf_model::{InstanceOid, ObjectOid};
use conf_schema::SchemaRegistry;

use crate::instance::InstanceSet;

/// Order diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderReport {
    /// Instances whose ordinal is lower than their predecessor's
    pub broken_order: Vec<InstanceOid>,
    /// Objects depending on an object registered after them
    pub forward_dependencies: Vec<(ObjectOid, ObjectOid)>,
}

impl OrderReport {
    /// Check if no diagnostics were raised
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.broken_order.is_empty() && self.forward_dependencies.is_empty()
    }
}

/// Sort the processing order by object ordinal, ascending and stable
pub fn topo_sort(set: &mut InstanceSet, registry: &SchemaRegistry) -> OrderReport {
    let mut order = set.order().to_vec();
    order.sort_by_key(|idx| registry.ordinal(set.get(*idx).object()));
    set.set_order(order);
    check_order(set, registry)
}

/// Diagnose ordering problems without changing the order
pub fn check_order(set: &InstanceSet, registry: &SchemaRegistry) -> OrderReport {
    let mut report = OrderReport::default();

    let mut last = 0;
    for record in set.iter() {
        let ordinal = registry.ordinal(record.object());
        if ordinal < last {
            tracing::warn!("Wrong order of instances: {} goes after ordinal {last}", record.oid());
            report.broken_order.push(record.oid().clone());
        }
        last = last.max(ordinal);
    }

    let mut seen = HashSet::new();
    for record in set.iter() {
        let object = record.object();
        if !seen.insert(object) {
            continue;
        }
        for dep in registry.depends_on(object) {
            if registry.ordinal(dep.target) > registry.ordinal(object) {
                let owner = registry.get(object).oid().clone();
                let target = registry.get(dep.target).oid().clone();
                tracing::warn!("{owner} depends on {target}, which is ordered after it");
                report.forward_dependencies.push((owner, target));
            }
        }
    }
    report
}
