//! Object dependency graph
//!
//! Provides [`DependencyGraph`], a directed graph over registered objects
//! where an edge `owner -> target` means instances of `owner` need the
//! target to be configured first.

use conf_model::DependencyScope;
use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use crate::object::ObjectIdx;

/// Declared dependency of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    /// Object depended upon
    pub target: ObjectIdx,
    /// Dependency scope
    pub scope: DependencyScope,
}

/// Directed dependency graph between objects
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    inner: DiGraphMap<ObjectIdx, DependencyScope>,
}

impl DependencyGraph {
    /// Create empty graph
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an object
    pub fn add_node(&mut self, node: ObjectIdx) {
        self.inner.add_node(node);
    }

    /// Add `owner -> target`
    ///
    /// Returns `true` when the new edge closes a cycle. Cycles are kept:
    /// the restore loop tolerates them and bounds its rounds instead.
    pub fn add_edge(
        &mut self,
        owner: ObjectIdx,
        target: ObjectIdx,
        scope: DependencyScope,
    ) -> bool {
        self.inner.add_node(owner);
        self.inner.add_node(target);
        let closes_cycle = has_path_connecting(&self.inner, target, owner, None);
        self.inner.add_edge(owner, target, scope);
        closes_cycle
    }

    /// Dependencies declared by `owner`
    #[must_use]
    pub fn depends_on(&self, owner: ObjectIdx) -> Vec<Dependency> {
        if !self.inner.contains_node(owner) {
            return Vec::new();
        }
        self.inner
            .edges_directed(owner, Direction::Outgoing)
            .map(|(_, target, scope)| Dependency {
                target,
                scope: *scope,
            })
            .collect()
    }

    /// Objects depending on `target`
    #[must_use]
    pub fn dependants(&self, target: ObjectIdx) -> Vec<ObjectIdx> {
        if !self.inner.contains_node(target) {
            return Vec::new();
        }
        self.inner
            .neighbors_directed(target, Direction::Incoming)
            .collect()
    }

    /// Check if anything depends on `target`
    #[must_use]
    pub fn has_dependants(&self, target: ObjectIdx) -> bool {
        self.inner.contains_node(target)
            && self
                .inner
                .neighbors_directed(target, Direction::Incoming)
                .next()
                .is_some()
    }

    /// Strongly connected groups that form dependency cycles
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<ObjectIdx>> {
        tarjan_scc(&self.inner)
            .into_iter()
            .filter(|group| {
                group.len() > 1 || group.iter().any(|n| self.inner.contains_edge(*n, *n))
            })
            .map(|mut group| {
                group.sort_unstable();
                group
            })
            .collect()
    }

    /// Number of dependency edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }
}
