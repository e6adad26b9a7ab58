//! Testing utilities for the configurator workspace
//!
//! Shared in-memory backend, schema fixtures and tracing setup.

#![allow(missing_docs)]

mod memory;

pub use memory::{Change, MemoryDatabase};

use conf_schema::{ObjectSpec, SchemaRegistry};
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Small network-agent schema used across tests
///
/// - `interface` (read_create) with `mtu` and `status` (read_write)
/// - `route` (read_create, string) depending on `interface` as a whole
/// - `bridge` unit root with `port` (read_create) and `stp` (read_write)
/// - `stats` (read_only, volatile) and `neigh` (read_create, volatile)
pub fn network_schema() -> Vec<ObjectSpec> {
    vec![
        ObjectSpec::new("/agent/interface"),
        ObjectSpec::new("/agent/interface/mtu")
            .with_access("read_write")
            .with_type("int32")
            .with_default("1500"),
        ObjectSpec::new("/agent/interface/status")
            .with_access("read_write")
            .with_type("bool")
            .with_default("false"),
        ObjectSpec::new("/agent/route")
            .with_type("string")
            .depends_on("/agent/interface", Some("object")),
        ObjectSpec::new("/agent/bridge").unit(),
        ObjectSpec::new("/agent/bridge/port").with_type("string"),
        ObjectSpec::new("/agent/bridge/stp")
            .with_access("read_write")
            .with_type("bool"),
        ObjectSpec::new("/agent/stats")
            .with_access("read_only")
            .with_type("uint64")
            .volatile(),
        ObjectSpec::new("/agent/neigh").with_type("address").volatile(),
    ]
}

/// Register [`network_schema`] against `db`
pub fn network_registry(db: &mut MemoryDatabase) -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    for spec in network_schema() {
        registry.register_spec(db, &spec).unwrap();
    }
    registry
}
