//! Backup files, round trips and the configurator front end

use std::fs;

use conf_backup::{
    Configurator, InstanceEntry, ProcessMode, RestoreConfig, Snapshot, SnapshotFormat,
};
use conf_model::{ConfError, Value};
use conf_test_utils::{init_tracing, network_schema, Change, MemoryDatabase};
use pretty_assertions::assert_eq;

fn configured() -> Configurator<MemoryDatabase> {
    let mut conf = Configurator::new(MemoryDatabase::new().with_agent("A").with_agent("B"));
    let snapshot = Snapshot {
        objects: network_schema(),
        instances: [
            ("/agent:A/interface:eth0", None),
            ("/agent:A/interface:eth0/mtu:", Some("9000")),
            ("/agent:A/interface:eth1", None),
            ("/agent:A/route:default", Some("10.0.0.1")),
            ("/agent:A/bridge:br0", None),
            ("/agent:A/bridge:br0/port:p1", Some("eth1")),
            ("/agent:A/bridge:br0/stp:", Some("true")),
            ("/agent:B/interface:lo", None),
        ]
        .into_iter()
        .map(|(oid, value)| InstanceEntry::new(oid, value))
        .collect(),
    };
    conf.process_snapshot(&snapshot, ProcessMode::Initial, &[]).unwrap();
    conf.backend_mut().insert("/agent:A/neigh:gw", Some(Value::String("10.0.0.1".into())));
    conf.backend_mut().clear_history();
    conf
}

/// Capture, wipe and restore reproduces the same values
#[test]
fn capture_wipe_restore_round_trip() {
    init_tracing();
    let mut conf = configured();
    let backup = conf.create_backup(&[]).unwrap();
    assert_eq!(backup.instances.len(), 8);

    let empty = Snapshot {
        objects: backup.objects.clone(),
        instances: Vec::new(),
    };
    let report = conf.restore(&empty, &[]).unwrap();
    assert_eq!(report.deleted, 6);
    assert!(!conf.backend().contains("/agent:A/interface:eth0/mtu:"));
    assert!(conf.backend().contains("/agent:A/neigh:gw"));

    let report = conf.restore(&backup, &[]).unwrap();
    assert_eq!(report.added, 8);
    assert!(conf.verify(&backup, &[]).unwrap().is_clean());
    assert_eq!(conf.create_backup(&[]).unwrap(), backup);
}

/// A backup restores onto a fresh database through the initial mode
#[test]
fn backup_moves_to_another_database() {
    init_tracing();
    let conf = configured();
    let backup = conf.create_backup(&[]).unwrap();

    let mut fresh = Configurator::new(MemoryDatabase::new().with_agent("A").with_agent("B"));
    let report = fresh.process_snapshot(&backup, ProcessMode::Initial, &[]).unwrap();
    assert!(report.converged);
    assert_eq!(fresh.create_backup(&[]).unwrap(), backup);
}

/// Files are written whole and read back in either format
#[test]
fn save_and_process_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut conf = configured();

    for name in ["backup.json", "backup.yaml"] {
        let path = dir.path().join(name);
        let format = SnapshotFormat::from_path(&path);
        let saved = conf.save_backup(&path, format, &[]).unwrap();
        let loaded = Configurator::<MemoryDatabase>::load_snapshot(&path).unwrap();
        assert_eq!(loaded, saved);

        let report = conf.process_file(&path, ProcessMode::Restore, &[]).unwrap();
        assert_eq!(report.mutations(), 0);
    }

    let filter = dir.path().join("filter.json");
    Configurator::<MemoryDatabase>::write_filter(&filter, &["/agent:A/".to_string()]).unwrap();
    let text = fs::read_to_string(&filter).unwrap();
    assert!(text.contains("/agent:A/"));
}

/// A failed write leaves neither a partial target nor temporary files behind
#[test]
fn failed_write_leaves_nothing_behind() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let conf = configured();

    let blocked = dir.path().join("backup.json");
    fs::create_dir(&blocked).unwrap();
    let err = conf.save_backup(&blocked, SnapshotFormat::Json, &[]).unwrap_err();
    assert!(matches!(err, ConfError::Io { .. }));
    assert!(blocked.is_dir());

    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);

    let missing_dir = dir.path().join("nope").join("backup.json");
    assert!(conf.save_backup(&missing_dir, SnapshotFormat::Json, &[]).is_err());
    assert!(!missing_dir.exists());
}

/// Divergence is repaired, scoped to the selected agents
#[test]
fn verify_and_restore_agents_repairs_divergence() {
    init_tracing();
    let mut conf = configured();
    let backup = conf.create_backup(&[]).unwrap();

    conf.backend_mut().insert("/agent:A/interface:eth0/mtu:", Some(Value::Int32(1400)));
    conf.backend_mut().insert("/agent:A/interface:eth9", None);
    conf.backend_mut().insert("/agent:B/interface:eth9", None);

    let report = conf.verify_and_restore_agents(&backup, &["A"]).unwrap().unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 1);
    assert!(conf.backend().contains("/agent:B/interface:eth9"));
    assert_eq!(conf.backend().value("/agent:A/interface:eth0/mtu:"), Some(&Value::Int32(9000)));

    assert_eq!(conf.verify_and_restore_agents(&backup, &["A"]).unwrap(), None);
    let report = conf.verify_and_restore(&backup, &[]).unwrap().unwrap();
    assert_eq!(report.deleted, 1);
}

/// Round bound and resync root from the configuration drive the restore
#[test]
fn configurator_uses_its_restore_config() {
    init_tracing();
    let config = RestoreConfig::from_toml_str("max_rounds = 2\n")
        .unwrap()
        .with_root_subtree("/agent:A");
    let mut conf = Configurator::with_config(MemoryDatabase::new().with_agent("A"), config);
    conf.backend_mut()
        .on_every_sync(Change::Upsert("/agent:A/interface:eth7".parse().unwrap(), None));

    let snapshot = Snapshot {
        objects: network_schema(),
        instances: vec![InstanceEntry::new("/agent:A/interface:eth0", None)],
    };
    let report = conf.process_snapshot(&snapshot, ProcessMode::Initial, &[]).unwrap();

    assert_eq!(report.rounds, 2);
    assert!(!report.converged);
    assert_eq!(report.added, 1);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.resyncs, 2);
    assert_eq!(conf.backend().syncs(), vec!["/agent:A".to_string(); 3].as_slice());
    assert!(conf.backend().contains("/agent:A/interface:eth0"));
}
