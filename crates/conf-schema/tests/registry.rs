//! Registry behaviour against an in-memory backend

use conf_model::{BackendError, ConfError, DependencyScope, ObjectOid, Request};
use conf_schema::{DependencySpec, ObjectSpec, SchemaRegistry};
use conf_test_utils::{network_registry, network_schema, MemoryDatabase};
use pretty_assertions::assert_eq;

fn oid(s: &str) -> ObjectOid {
    s.parse().unwrap()
}

/// Ordinals come from the backend and grow with registration order
#[test]
fn ordinals_follow_registration() {
    let mut db = MemoryDatabase::new();
    let registry = network_registry(&mut db);
    let interface = registry.lookup(&oid("/agent/interface")).unwrap();
    let mtu = registry.lookup(&oid("/agent/interface/mtu")).unwrap();
    assert!(registry.ordinal(interface) > registry.ordinal(registry.agent()));
    assert!(registry.ordinal(mtu) > registry.ordinal(interface));
    assert_eq!(db.ordinal("/agent/interface/mtu"), Some(registry.ordinal(mtu)));
    assert_eq!(registry.get(mtu).parent(), Some(interface));
}

/// Registering an object whose parent is unknown fails without touching the backend
#[test]
fn missing_parent_is_invalid_schema() {
    let mut db = MemoryDatabase::new();
    let mut registry = SchemaRegistry::new();
    let err = registry
        .register_object(&mut db, &ObjectSpec::new("/agent/interface/mtu").with_type("int32"))
        .unwrap_err();
    assert!(matches!(err, ConfError::InvalidSchema { .. }));
    assert!(db.requests().is_empty());
    assert_eq!(registry.len(), 2);
}

/// Identical re-registration is a no-op, a conflicting one is rejected
#[test]
fn re_registration() {
    let mut db = MemoryDatabase::new();
    let mut registry = SchemaRegistry::new();
    let spec = ObjectSpec::new("/agent/interface");
    let first = registry.register_object(&mut db, &spec).unwrap();
    let second = registry.register_object(&mut db, &spec).unwrap();
    assert_eq!(first, second);
    assert_eq!(db.count("register"), 1);

    let err = registry
        .register_object(&mut db, &spec.clone().with_access("read_only"))
        .unwrap_err();
    assert!(matches!(err, ConfError::InvalidSchema { .. }));
}

/// Bootstrap objects cannot be redefined
#[test]
fn bootstrap_cannot_be_redefined() {
    let mut db = MemoryDatabase::new();
    let mut registry = SchemaRegistry::new();
    assert!(registry.register_object(&mut db, &ObjectSpec::new("/agent")).is_err());
}

/// Backend refusals surface as backend errors
#[test]
fn backend_refusal() {
    let mut db = MemoryDatabase::new();
    db.fail_on("/agent/interface", BackendError::unsupported("no such object on agents"));
    let mut registry = SchemaRegistry::new();
    let err = registry
        .register_object(&mut db, &ObjectSpec::new("/agent/interface"))
        .unwrap_err();
    assert!(matches!(err, ConfError::Backend { .. }));
    assert!(registry.lookup(&oid("/agent/interface")).is_none());
}

/// Unit flag propagates to descendants as unit membership
#[test]
fn unit_membership() {
    let mut db = MemoryDatabase::new();
    let registry = network_registry(&mut db);
    let bridge = registry.lookup(&oid("/agent/bridge")).unwrap();
    let port = registry.lookup(&oid("/agent/bridge/port")).unwrap();
    let interface = registry.lookup(&oid("/agent/interface")).unwrap();
    assert!(registry.get(bridge).is_unit());
    assert!(!registry.get(bridge).is_unit_part());
    assert!(registry.get(port).is_unit_part());
    assert!(!registry.get(interface).is_unit_part());
}

/// Dependencies are forwarded to the backend and tracked locally
#[test]
fn dependencies() {
    let mut db = MemoryDatabase::new();
    let registry = network_registry(&mut db);
    let interface = registry.lookup(&oid("/agent/interface")).unwrap();
    let route = registry.lookup(&oid("/agent/route")).unwrap();
    assert!(registry.has_dependants(interface));
    assert!(!registry.has_dependants(route));
    assert_eq!(registry.dependants(interface), vec![route]);
    assert_eq!(
        db.dependencies(),
        &[(oid("/agent/route"), oid("/agent/interface"), DependencyScope::Object)]
    );
    assert!(registry.dependency_cycles().is_empty());
}

/// Unknown scope and unknown target are rejected
#[test]
fn bad_dependencies() {
    let mut db = MemoryDatabase::new();
    let mut registry = network_registry(&mut db);
    let scope = [DependencySpec {
        oid: Some("/agent/interface".into()),
        scope: Some("global".into()),
    }];
    assert!(matches!(
        registry.register_dependencies(&mut db, &oid("/agent/route"), &scope),
        Err(ConfError::InvalidSchema { .. })
    ));
    let target = [DependencySpec {
        oid: Some("/agent/vlan".into()),
        scope: None,
    }];
    assert!(matches!(
        registry.register_dependencies(&mut db, &oid("/agent/route"), &target),
        Err(ConfError::NotFound { .. })
    ));
}

/// Cycles are accepted and reported
#[test]
fn cycles_are_reported() {
    let mut db = MemoryDatabase::new();
    let mut registry = network_registry(&mut db);
    let back = [DependencySpec {
        oid: Some("/agent/route".into()),
        scope: None,
    }];
    registry
        .register_dependencies(&mut db, &oid("/agent/interface"), &back)
        .unwrap();
    assert_eq!(
        registry.dependency_cycles(),
        vec![vec![oid("/agent/interface"), oid("/agent/route")]]
    );
}

/// Volatility is inherited from ancestors
#[test]
fn volatile_inheritance() {
    let mut db = MemoryDatabase::new();
    let mut registry = network_registry(&mut db);
    let child = registry
        .register_object(&mut db, &ObjectSpec::new("/agent/neigh/state").with_type("string"))
        .unwrap();
    assert!(!registry.get(child).is_volatile());
    assert!(registry.is_volatile(child));
}

/// Pre-order visits parents before children
#[test]
fn preorder_parents_first() {
    let mut db = MemoryDatabase::new();
    let registry = network_registry(&mut db);
    let order: Vec<&str> = registry
        .preorder()
        .into_iter()
        .map(|idx| registry.get(idx).oid().as_str())
        .collect();
    assert_eq!(&order[..4], &["/", "/agent", "/agent/interface", "/agent/interface/mtu"]);
    assert_eq!(order.len(), network_schema().len() + 2);
    assert!(db.requests().iter().all(|r| !matches!(r, Request::Add { .. })));
}
