//! Configuration backup and restore
//!
//! Captures the live configuration tree into a [`Snapshot`] and replays a
//! snapshot against a live database until both agree.
//!
//! # Pipeline
//!
//! 1. [`parse_instances`]: snapshot entries to an [`InstanceSet`]
//! 2. [`fill_children`]: rebuild the instance tree from identifiers
//! 3. [`topo_sort`]: order instances by object ordinal
//! 4. [`Reconciler`]: prune, add and update in rounds, resynchronizing
//!    agents when dependency effects may have fired
//!
//! [`capture`] and [`verify`] go the other way, and [`Configurator`] ties
//! everything to one registry and backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use conf_backup::{Configurator, ProcessMode, Snapshot};
//!
//! let mut conf = Configurator::new(backend);
//! let snapshot = Snapshot::load("backup.json".as_ref())?;
//! let report = conf.process_snapshot(&snapshot, ProcessMode::Initial, &[])?;
//! assert!(report.converged);
//! ```

#![warn(unreachable_pub)]

mod config;
mod configurator;
mod document;
mod engine;
mod instance;
mod order;
mod parse;
mod tree;
mod verify;
mod writer;

pub use config::{RestoreConfig, DEFAULT_MAX_ROUNDS};
pub use configurator::{agent_subtree, Configurator, ProcessMode};
pub use document::{FilterDocument, InstanceEntry, Snapshot, SnapshotFormat};
pub use engine::{Reconciler, RestoreReport};
pub use instance::{InstanceIdx, InstanceRecord, InstanceSet};
pub use order::{check_order, topo_sort, OrderReport};
pub use parse::parse_instances;
pub use tree::fill_children;
pub use verify::{verify, ValueMismatch, VerifyReport};
pub use writer::{capture, write_filter_file, write_snapshot};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
