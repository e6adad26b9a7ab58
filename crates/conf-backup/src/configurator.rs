//! Configurator facade
//!
//! Provides [`Configurator`], which owns the schema registry, the live
//! database handle and the restore configuration, and strings the parse,
//! order, reconcile, capture and verify stages together.

use std::path::Path;

use conf_model::{
    ConfError, ConfigBackend, InstanceOid, ObjectOid, AGENT_SUBID, NAME_SEPARATOR, SEPARATOR,
};
use conf_schema::{ObjectSpec, SchemaRegistry};

use crate::config::RestoreConfig;
use crate::document::{Snapshot, SnapshotFormat};
use crate::engine::{Reconciler, RestoreReport};
use crate::parse::parse_instances;
use crate::verify::{verify, VerifyReport};
use crate::writer::{capture, write_filter_file, write_snapshot};

/// How a snapshot is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessMode {
    /// Register the snapshot's objects first, then restore its instances
    Initial,
    /// Objects are already registered, only restore instances
    #[default]
    Restore,
}

/// Subtree filter covering everything below agent `name`
#[inline]
#[must_use]
pub fn agent_subtree(name: &str) -> String {
    format!("{SEPARATOR}{AGENT_SUBID}{NAME_SEPARATOR}{name}{SEPARATOR}")
}

/// Backup and restore front end over a live configuration database
#[derive(Debug)]
pub struct Configurator<B: ConfigBackend> {
    registry: SchemaRegistry,
    backend: B,
    config: RestoreConfig,
}

impl<B: ConfigBackend> Configurator<B> {
    /// Create configurator with default restore configuration
    #[inline]
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, RestoreConfig::default())
    }

    /// Create configurator with explicit restore configuration
    #[must_use]
    pub fn with_config(backend: B, config: RestoreConfig) -> Self {
        Self {
            registry: SchemaRegistry::new(),
            backend,
            config,
        }
    }

    /// Registered schema
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Live database
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Live database, mutable
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Restore configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RestoreConfig {
        &self.config
    }

    /// Give the live database back
    #[inline]
    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Register object descriptions and then their dependencies
    ///
    /// All objects go first so that a dependency may name an object
    /// described later in the list.
    ///
    /// # Errors
    /// Fails on the first object or dependency the registry rejects.
    pub fn register_schema(&mut self, objects: &[ObjectSpec]) -> Result<(), ConfError> {
        for spec in objects {
            self.registry.register_object(&mut self.backend, spec)?;
        }
        let mut edges = 0;
        for spec in objects.iter().filter(|spec| !spec.depends.is_empty()) {
            let Some(text) = spec.oid.as_deref() else {
                return Err(ConfError::invalid_schema("-", "object has no oid"));
            };
            let owner: ObjectOid = text
                .parse()
                .map_err(|e| ConfError::invalid_schema(text, format!("{e}")))?;
            edges += self.registry.register_dependencies(&mut self.backend, &owner, &spec.depends)?;
        }
        tracing::info!("Registered {} objects and {edges} dependencies", objects.len());
        Ok(())
    }

    /// Apply a snapshot to the live database
    ///
    /// # Errors
    /// Registration, parse and reconciliation errors are returned as is.
    pub fn process_snapshot(
        &mut self,
        snapshot: &Snapshot,
        mode: ProcessMode,
        subtrees: &[String],
    ) -> Result<RestoreReport, ConfError> {
        if mode == ProcessMode::Initial {
            self.register_schema(&snapshot.objects)?;
            let set = parse_instances(&self.registry, &self.backend, &snapshot.instances)?;
            let root = self.config.root_subtree.clone();
            tracing::debug!("Synchronizing {root} before the initial restore");
            self.backend
                .sync(&root)
                .map_err(|e| ConfError::backend(root.as_str(), e))?;
            return Reconciler::new(&self.registry, &mut self.backend, &self.config)
                .restore(set, subtrees);
        }
        self.restore(snapshot, subtrees)
    }

    /// Make the live state under `subtrees` match the snapshot's instances
    ///
    /// # Errors
    /// Parse and reconciliation errors.
    pub fn restore(
        &mut self,
        snapshot: &Snapshot,
        subtrees: &[String],
    ) -> Result<RestoreReport, ConfError> {
        let set = parse_instances(&self.registry, &self.backend, &snapshot.instances)?;
        Reconciler::new(&self.registry, &mut self.backend, &self.config).restore(set, subtrees)
    }

    /// Load a snapshot file and process it
    ///
    /// # Errors
    /// File, format and processing errors.
    pub fn process_file(
        &mut self,
        path: &Path,
        mode: ProcessMode,
        subtrees: &[String],
    ) -> Result<RestoreReport, ConfError> {
        let snapshot = Self::load_snapshot(path)?;
        tracing::info!("Processing {}", path.display());
        self.process_snapshot(&snapshot, mode, subtrees)
    }

    /// Capture the live state
    ///
    /// # Errors
    /// See [`capture`].
    pub fn create_backup(&self, subtrees: &[String]) -> Result<Snapshot, ConfError> {
        capture(&self.registry, &self.backend, subtrees)
    }

    /// Capture the live state into a file
    ///
    /// # Errors
    /// Capture errors, or file errors; the file is never left half written.
    pub fn save_backup(
        &self,
        path: &Path,
        format: SnapshotFormat,
        subtrees: &[String],
    ) -> Result<Snapshot, ConfError> {
        let snapshot = self.create_backup(subtrees)?;
        write_snapshot(path, &snapshot, format)?;
        Ok(snapshot)
    }

    /// Read a snapshot file
    ///
    /// # Errors
    /// File and format errors.
    pub fn load_snapshot(path: &Path) -> Result<Snapshot, ConfError> {
        Snapshot::load(path)
    }

    /// Write a subtree filter file
    ///
    /// # Errors
    /// File and format errors.
    pub fn write_filter(path: &Path, subtrees: &[String]) -> Result<(), ConfError> {
        write_filter_file(path, subtrees)
    }

    /// Compare the live state with a snapshot
    ///
    /// # Errors
    /// See [`verify`].
    pub fn verify(
        &self,
        snapshot: &Snapshot,
        subtrees: &[String],
    ) -> Result<VerifyReport, ConfError> {
        verify(&self.registry, &self.backend, snapshot, subtrees)
    }

    /// Restore only when the live state diverged from the snapshot
    ///
    /// Returns `None` when nothing had to be done.
    ///
    /// # Errors
    /// Restore errors, or [`ConfError::Diverged`] when differences remain
    /// after the restore.
    pub fn verify_and_restore(
        &mut self,
        snapshot: &Snapshot,
        subtrees: &[String],
    ) -> Result<Option<RestoreReport>, ConfError> {
        if self.verify(snapshot, subtrees)?.is_clean() {
            return Ok(None);
        }
        tracing::warn!("Configuration differs from backup, restoring");
        let report = self.restore(snapshot, subtrees)?;
        self.verify(snapshot, subtrees)?.into_result().map_err(|e| {
            tracing::error!("Configuration still differs after restore: {e}");
            e
        })?;
        Ok(Some(report))
    }

    /// [`Self::verify_and_restore`] scoped to the given agents
    ///
    /// # Errors
    /// See [`Self::verify_and_restore`].
    pub fn verify_and_restore_agents(
        &mut self,
        snapshot: &Snapshot,
        agents: &[&str],
    ) -> Result<Option<RestoreReport>, ConfError> {
        if agents.is_empty() {
            return Ok(None);
        }
        let subtrees: Vec<String> = agents.iter().map(|name| agent_subtree(name)).collect();
        self.verify_and_restore(snapshot, &subtrees)
    }

    /// Re-apply the known configuration of an agent after it restarted
    ///
    /// The agent's non-volatile instances are captured from the database,
    /// the database is synchronized with the agent, and the captured state
    /// is then restored within the agent's subtree.
    ///
    /// # Errors
    /// [`ConfError::NotFound`] when the agent is unknown, otherwise capture,
    /// synchronization and reconciliation errors.
    pub fn restore_agent(&mut self, name: &str) -> Result<RestoreReport, ConfError> {
        let agent = InstanceOid::agent(name);
        if self.backend.find(&agent).is_none() {
            tracing::error!("Agent {name} is unknown");
            return Err(ConfError::not_found("agent", agent.as_str()));
        }
        let subtrees = [agent_subtree(name)];
        let known = capture(&self.registry, &self.backend, &subtrees)?;

        self.backend.sync(agent.as_str()).map_err(|e| {
            tracing::error!("Failed to synchronize {agent}: {e}");
            ConfError::backend(agent.as_str(), e)
        })?;

        tracing::info!("Restoring {} instances of agent {name}", known.instances.len());
        let set = parse_instances(&self.registry, &self.backend, &known.instances)?;
        Reconciler::new(&self.registry, &mut self.backend, &self.config).restore(set, &subtrees)
    }
}
