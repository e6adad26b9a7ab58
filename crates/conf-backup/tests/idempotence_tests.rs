//! Restoring a snapshot over a matching live state issues no mutation

use conf_backup::{parse_instances, InstanceEntry, Reconciler, RestoreConfig};
use conf_model::{
    BackendError, ConfigBackend, Handle, InstanceOid, LiveInstance, Request, Response, Value,
};
use conf_test_utils::{init_tracing, network_registry, MemoryDatabase};
use mockall::mock;

mock! {
    Database {}

    impl ConfigBackend for Database {
        fn apply(&mut self, request: Request) -> Result<Response, BackendError>;
        fn find(&self, oid: &InstanceOid) -> Option<Handle>;
        fn instance(&self, handle: Handle) -> Option<LiveInstance>;
        fn instances(&self) -> Vec<Handle>;
        fn sync(&mut self, subtree: &str) -> Result<(), BackendError>;
    }
}

/// Read-only view of `db` that fails the test on any write
fn read_only(db: &MemoryDatabase) -> MockDatabase {
    let mut mock = MockDatabase::new();
    let view = db.clone();
    mock.expect_find().returning(move |oid| view.find(oid));
    let view = db.clone();
    mock.expect_instance().returning(move |handle| view.instance(handle));
    let view = db.clone();
    mock.expect_instances().returning(move || view.instances());
    mock.expect_apply().never();
    mock.expect_sync().never();
    mock
}

#[test]
fn matching_state_needs_no_requests() {
    init_tracing();
    let mut db = MemoryDatabase::new().with_agent("A").with_agent("B");
    let registry = network_registry(&mut db);
    db.insert("/agent:A/interface:eth0", None);
    db.insert("/agent:A/interface:eth0/mtu:", Some(Value::Int32(1500)));
    db.insert("/agent:A/interface:eth0/status:", Some(Value::Bool(true)));
    db.insert("/agent:A/bridge:br0", None);
    db.insert("/agent:A/bridge:br0/port:p1", Some(Value::String("eth0".into())));
    db.insert("/agent:B/route:default", Some(Value::String("10.0.0.1".into())));
    db.insert("/agent:B/stats:rx", Some(Value::Uint64(3)));

    let entries: Vec<InstanceEntry> = [
        ("/agent:B/route:default", Some("10.0.0.1")),
        ("/agent:A/bridge:br0/port:p1", Some("eth0")),
        ("/agent:A/interface:eth0/status:", Some("1")),
        ("/agent:A/interface:eth0", None),
        ("/agent:A/bridge:br0", None),
        ("/agent:A/interface:eth0/mtu:", Some("01500")),
    ]
    .into_iter()
    .map(|(oid, value)| InstanceEntry::new(oid, value))
    .collect();

    let mut mock = read_only(&db);
    let set = parse_instances(&registry, &mock, &entries).unwrap();
    let config = RestoreConfig::default();
    let report = Reconciler::new(&registry, &mut mock, &config)
        .restore(set, &[])
        .unwrap();

    assert_eq!(report.mutations(), 0);
    assert_eq!(report.resyncs, 0);
    assert_eq!(report.rounds, 1);
    assert!(report.converged);
}
