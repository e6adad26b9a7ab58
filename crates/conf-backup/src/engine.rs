//! Reconciliation engine
//!
//! Provides [`Reconciler`], which replays an [`InstanceSet`] against the
//! live database in rounds:
//!
//! 1. prune live `read_create` instances that are absent from the set,
//! 2. add or update every pending instance, retrying those whose
//!    prerequisites appear during the pass,
//! 3. resynchronize with the agents when a change may have triggered
//!    dependency effects, and go again.
//!
//! The loop ends when a round triggers no dependency effects or after
//! [`RestoreConfig::max_rounds`].

use std::collections::HashSet;

use conf_model::{
    in_subtrees, subtree_root, BackendError, ConfError, ConfigBackend, LiveInstance, Request,
    ValueType,
};
use conf_schema::SchemaRegistry;
use serde::Serialize;

use crate::config::RestoreConfig;
use crate::instance::{InstanceIdx, InstanceSet};
use crate::order::topo_sort;
use crate::tree::fill_children;

/// Outcome of a successful restore
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Rounds run
    pub rounds: usize,
    /// Instances created
    pub added: usize,
    /// Instance values changed
    pub updated: usize,
    /// Instances deleted
    pub deleted: usize,
    /// Unit commits issued
    pub commits: usize,
    /// Agent resynchronizations
    pub resyncs: usize,
    /// False when the round bound stopped the loop
    pub converged: bool,
}

impl RestoreReport {
    /// Total number of mutations issued
    #[inline]
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.added + self.updated + self.deleted + self.commits
    }
}

#[derive(Debug, Default)]
struct PassFlags {
    need_retry: bool,
    change_made: bool,
}

/// Applies an instance set to the live database
pub struct Reconciler<'a, B: ConfigBackend + ?Sized> {
    registry: &'a SchemaRegistry,
    backend: &'a mut B,
    config: &'a RestoreConfig,
    report: RestoreReport,
}

impl<'a, B: ConfigBackend + ?Sized> Reconciler<'a, B> {
    /// Create reconciler over a registry and backend
    pub fn new(
        registry: &'a SchemaRegistry,
        backend: &'a mut B,
        config: &'a RestoreConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            config,
            report: RestoreReport::default(),
        }
    }

    /// Make the live state under `subtrees` match `set`
    ///
    /// An empty subtree list covers the whole tree. The set is consumed.
    ///
    /// # Errors
    /// - [`ConfError::InvalidSchema`] when the set does not form a tree
    /// - [`ConfError::Incomplete`] when some instances could never be created
    /// - [`ConfError::Backend`] when the backend fails for any other reason
    pub fn restore(
        mut self,
        mut set: InstanceSet,
        subtrees: &[String],
    ) -> Result<RestoreReport, ConfError> {
        fill_children(&mut set)?;
        topo_sort(&mut set, self.registry);

        let targets: HashSet<String> = set.iter().map(|r| r.oid().to_string()).collect();
        let max_rounds = self.config.max_rounds.max(1);
        tracing::info!("Restoring {} instances", set.len());

        let mut deps_might_fire = true;
        while deps_might_fire {
            self.report.rounds += 1;
            let round = self.report.rounds;
            let _span = tracing::debug_span!("restore_round", round).entered();
            deps_might_fire = false;

            self.remove_excessive(&targets, subtrees, &mut deps_might_fire)
                .map_err(|e| {
                    tracing::error!("Failed to remove excessive entries: {e}");
                    e
                })?;

            if self.apply_pending(&mut set, &mut deps_might_fire)? {
                let pending = self.pending(&set);
                tracing::error!(
                    "Cannot restore {} instance(s), first is {:?}",
                    pending.len(),
                    pending.first()
                );
                return Err(ConfError::Incomplete { pending });
            }

            if deps_might_fire {
                self.resync(subtrees)?;
                if round >= max_rounds {
                    tracing::warn!("Loop dependency suspected, giving up after {round} rounds");
                    tracing::info!("Restore stopped: {:?}", self.report);
                    return Ok(self.report);
                }
            }
        }

        self.report.converged = true;
        tracing::info!("Restore finished: {:?}", self.report);
        Ok(self.report)
    }

    fn pending(&self, set: &InstanceSet) -> Vec<String> {
        set.iter()
            .filter(|r| !r.is_added() && !self.registry.get(r.object()).is_unit_part())
            .map(|r| r.oid().to_string())
            .collect()
    }

    fn remove_excessive(
        &mut self,
        targets: &HashSet<String>,
        subtrees: &[String],
        deps_might_fire: &mut bool,
    ) -> Result<(), ConfError> {
        let mut candidates = Vec::new();
        for handle in self.backend.instances() {
            let Some(live) = self.backend.instance(handle) else {
                continue;
            };
            let Some(object) = self.registry.object_for_instance(&live.oid) else {
                continue;
            };
            if !self.registry.get(object).access().allows_create()
                || !in_subtrees(subtrees, live.oid.as_str())
            {
                continue;
            }
            candidates.push((self.registry.ordinal(object), handle));
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, handle) in candidates {
            let Some(live) = self.backend.instance(handle) else {
                continue;
            };
            if targets.contains(live.oid.as_str()) {
                continue;
            }
            self.delete_with_children(&live, deps_might_fire)?;
        }
        Ok(())
    }

    fn delete_with_children(
        &mut self,
        live: &LiveInstance,
        deps_might_fire: &mut bool,
    ) -> Result<(), ConfError> {
        let Some(object) = self.registry.object_for_instance(&live.oid) else {
            return Ok(());
        };
        if self.registry.is_volatile(object)
            || !self.registry.get(object).access().allows_create()
        {
            return Ok(());
        }
        if self.registry.has_dependants(object) {
            *deps_might_fire = true;
        }

        for &child in &live.children {
            if let Some(child) = self.backend.instance(child) {
                self.delete_with_children(&child, deps_might_fire)?;
            }
        }

        tracing::debug!("Deleting {}", live.oid);
        match self.backend.apply(Request::Delete {
            handle: live.handle,
            oid: live.oid.clone(),
        }) {
            Ok(_) => {
                self.report.deleted += 1;
                Ok(())
            }
            Err(e) if e.is_not_found() && self.config.tolerate_missing_on_delete => {
                tracing::warn!("Instance {} disappeared before it was deleted", live.oid);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to delete {}: {e}", live.oid);
                Err(ConfError::backend(live.oid.as_str(), e))
            }
        }
    }

    /// Run passes until nothing changes or no retry is needed; returns
    /// whether a retry is still pending
    fn apply_pending(
        &mut self,
        set: &mut InstanceSet,
        deps_might_fire: &mut bool,
    ) -> Result<bool, ConfError> {
        loop {
            let mut flags = PassFlags::default();
            let order = set.order().to_vec();
            for idx in order {
                let record = set.get(idx);
                if record.is_added() || self.registry.get(record.object()).is_unit_part() {
                    continue;
                }
                self.restore_entry(set, idx, &mut flags, deps_might_fire)?;
            }
            if !(flags.change_made && flags.need_retry) {
                return Ok(flags.need_retry);
            }
            tracing::debug!("Some instances need another pass");
        }
    }

    fn restore_entry(
        &mut self,
        set: &mut InstanceSet,
        idx: InstanceIdx,
        flags: &mut PassFlags,
        deps_might_fire: &mut bool,
    ) -> Result<(), ConfError> {
        let unit = self.registry.get(set.get(idx).object()).is_unit();
        let mut changed = false;
        let mut retry = false;
        self.restore_entry_aux(set, idx, unit, &mut retry, &mut changed, deps_might_fire)?;
        if retry {
            flags.need_retry = true;
            // a unit stays pending until every member is in place
            if unit {
                set.get_mut(idx).added = false;
            }
        }
        if !changed {
            return Ok(());
        }
        flags.change_made = true;
        if !unit {
            return Ok(());
        }

        let oid = set.get(idx).oid().clone();
        tracing::debug!("Committing unit {oid}");
        self.backend
            .apply(Request::Commit { oid: oid.clone() })
            .map_err(|e| {
                tracing::error!("Failed to commit {oid}: {e}");
                ConfError::backend(oid.as_str(), e)
            })?;
        self.report.commits += 1;
        Ok(())
    }

    fn restore_entry_aux(
        &mut self,
        set: &mut InstanceSet,
        idx: InstanceIdx,
        local: bool,
        need_retry: &mut bool,
        changed: &mut bool,
        deps_might_fire: &mut bool,
    ) -> Result<(), ConfError> {
        match self.add_or_set(set, idx, local, deps_might_fire) {
            Ok(did_change) => {
                set.get_mut(idx).added = true;
                *changed |= did_change;
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!("Instance {} cannot be restored yet: {e}", set.get(idx).oid());
                *need_retry = true;
            }
            Err(e) => {
                let oid = set.get(idx).oid();
                tracing::error!("Failed to add/set instance {oid}: {e}");
                return Err(ConfError::backend(oid.as_str(), e));
            }
        }

        if local {
            let children = set.get(idx).children().to_vec();
            for child in children {
                self.restore_entry_aux(set, child, local, need_retry, changed, deps_might_fire)?;
            }
        }
        Ok(())
    }

    fn add_or_set(
        &mut self,
        set: &mut InstanceSet,
        idx: InstanceIdx,
        local: bool,
        deps_might_fire: &mut bool,
    ) -> Result<bool, BackendError> {
        let record = set.get(idx);
        if record.oid().is_agent_root() {
            return Ok(false);
        }
        let oid = record.oid().clone();
        let value = record.value().cloned();
        let object = record.object();

        let live = record
            .handle()
            .and_then(|handle| self.backend.instance(handle))
            .filter(|live| live.oid == oid)
            .or_else(|| self.backend.find(&oid).and_then(|handle| self.backend.instance(handle)));
        set.get_mut(idx).handle = live.as_ref().map(|l| l.handle);

        let schema = self.registry.get(object);
        let has_dependants = self.registry.has_dependants(object);

        match live {
            Some(live) => {
                if schema.value_type() == ValueType::None || live.value == value {
                    return Ok(false);
                }
                let Some(value) = value else {
                    return Ok(false);
                };
                if has_dependants {
                    *deps_might_fire = true;
                }
                tracing::debug!("Setting {oid} to {value}");
                self.backend.apply(Request::Set {
                    handle: live.handle,
                    oid,
                    value,
                    local,
                })?;
                self.report.updated += 1;
            }
            None => {
                if has_dependants {
                    *deps_might_fire = true;
                }
                tracing::debug!("Adding {oid}");
                self.backend.apply(Request::Add { oid, value, local })?;
                self.report.added += 1;
            }
        }
        Ok(true)
    }

    fn resync(&mut self, subtrees: &[String]) -> Result<(), ConfError> {
        let roots: Vec<&str> = if subtrees.is_empty() {
            vec![self.config.root_subtree.as_str()]
        } else {
            subtrees.iter().map(|s| subtree_root(s)).collect()
        };
        for subtree in roots {
            tracing::debug!("Synchronizing {subtree}");
            self.backend.sync(subtree).map_err(|e| {
                tracing::error!("Failed to synchronize {subtree}: {e}");
                ConfError::backend(subtree, e)
            })?;
            self.report.resyncs += 1;
        }
        Ok(())
    }
}
