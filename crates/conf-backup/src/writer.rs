//! Snapshot writer
//!
//! Captures the registered schema and the live instance tree into a
//! [`Snapshot`] and writes snapshot and filter documents to disk.

use std::io::Write;
use std::path::Path;

use conf_model::{subtree_root, ConfError, ConfigBackend, Handle, InstanceOid, ValueError};
use conf_schema::{ObjectIdx, ObjectSpec, SchemaRegistry};
use tempfile::NamedTempFile;

use crate::document::{FilterDocument, InstanceEntry, Snapshot, SnapshotFormat};

/// Capture schema and live instances
///
/// With an empty subtree list the whole tree is captured, otherwise only
/// the listed subtrees (each identified by its root instance).
///
/// # Errors
/// - [`ConfError::NotFound`] when a subtree root or an instance's object
///   does not exist
/// - [`ConfError::Value`] when a typed live instance has no value
pub fn capture<B>(
    registry: &SchemaRegistry,
    backend: &B,
    subtrees: &[String],
) -> Result<Snapshot, ConfError>
where
    B: ConfigBackend + ?Sized,
{
    let objects = registry
        .preorder()
        .into_iter()
        .filter(|idx| !registry.is_bootstrap(*idx))
        .map(|idx| object_spec(registry, idx))
        .collect();

    let mut instances = Vec::new();
    if subtrees.is_empty() {
        let root = backend
            .find(&InstanceOid::root())
            .ok_or_else(|| ConfError::not_found("instance", "/:"))?;
        put_instance(registry, backend, root, &mut instances)?;
    } else {
        for subtree in subtrees {
            let handle = subtree_root(subtree)
                .parse::<InstanceOid>()
                .ok()
                .and_then(|oid| backend.find(&oid))
                .ok_or_else(|| {
                    tracing::error!("Cannot back up {subtree}: no such instance");
                    ConfError::not_found("subtree instance", subtree.as_str())
                })?;
            put_instance(registry, backend, handle, &mut instances)?;
        }
    }

    tracing::info!("Captured {} instances", instances.len());
    Ok(Snapshot { objects, instances })
}

fn object_spec(registry: &SchemaRegistry, idx: ObjectIdx) -> ObjectSpec {
    let object = registry.get(idx);
    let mut spec = ObjectSpec::new(object.oid().as_str()).with_access(object.access().as_str());
    if object.value_type().has_value() {
        spec = spec.with_type(object.value_type().as_str());
    }
    if let Some(default) = object.default_value() {
        spec = spec.with_default(default);
    }
    if object.is_volatile() {
        spec = spec.volatile();
    }
    if object.is_unit() {
        spec = spec.unit();
    }
    if !object.parent_dep() {
        spec = spec.without_parent_dep();
    }
    for dep in registry.depends_on(idx) {
        spec = spec.depends_on(registry.get(dep.target).oid().as_str(), Some(dep.scope.as_str()));
    }
    spec
}

fn put_instance<B>(
    registry: &SchemaRegistry,
    backend: &B,
    handle: Handle,
    out: &mut Vec<InstanceEntry>,
) -> Result<(), ConfError>
where
    B: ConfigBackend + ?Sized,
{
    let Some(live) = backend.instance(handle) else {
        return Ok(());
    };
    let object = registry
        .object_for_instance(&live.oid)
        .ok_or_else(|| ConfError::not_found("object of instance", live.oid.as_str()))?;
    if registry.is_volatile(object) {
        return Ok(());
    }

    if !live.oid.is_root() && !live.oid.is_agent_root() {
        let value = if registry.get(object).value_type().has_value() {
            let value = live
                .value
                .as_ref()
                .ok_or_else(|| ConfError::value(live.oid.as_str(), ValueError::Missing))?;
            Some(value.to_string())
        } else {
            None
        };
        out.push(InstanceEntry {
            oid: Some(live.oid.to_string()),
            value,
        });
    }

    for &child in &live.children {
        put_instance(registry, backend, child, out)?;
    }
    Ok(())
}

/// Write a snapshot atomically
///
/// The document is written to a temporary file next to `path` and moved
/// into place only once complete.
///
/// # Errors
/// Returns [`ConfError::Io`] or [`ConfError::Format`]; `path` is untouched
/// in either case.
pub fn write_snapshot(
    path: &Path,
    snapshot: &Snapshot,
    format: SnapshotFormat,
) -> Result<(), ConfError> {
    let text = snapshot.render(format)?;
    write_atomically(path, text.as_bytes())?;
    tracing::info!("Configuration backup written to {}", path.display());
    Ok(())
}

/// Write a subtree filter document
///
/// # Errors
/// Returns [`ConfError::Io`] or [`ConfError::Format`].
pub fn write_filter_file(path: &Path, subtrees: &[String]) -> Result<(), ConfError> {
    let document = FilterDocument::new(subtrees);
    let text = match SnapshotFormat::from_path(path) {
        SnapshotFormat::Json => {
            serde_json::to_string_pretty(&document).map_err(|e| ConfError::Format(e.to_string()))?
        }
        SnapshotFormat::Yaml => {
            serde_yaml::to_string(&document).map_err(|e| ConfError::Format(e.to_string()))?
        }
    };
    write_atomically(path, text.as_bytes())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), ConfError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(|e| ConfError::io(dir, e))?;
    file.write_all(bytes).map_err(|e| ConfError::io(file.path(), e))?;
    file.as_file().sync_all().map_err(|e| ConfError::io(file.path(), e))?;
    file.persist(path).map_err(|e| {
        tracing::error!("Failed to store {}: {}", path.display(), e.error);
        ConfError::io(path, e.error)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conf_model::Value;
    use conf_test_utils::{network_registry, MemoryDatabase};
    use pretty_assertions::assert_eq;

    fn seeded() -> (MemoryDatabase, SchemaRegistry) {
        let mut db = MemoryDatabase::new().with_agent("A").with_agent("B");
        let registry = network_registry(&mut db);
        db.insert("/agent:A/interface:eth0", None);
        db.insert("/agent:A/interface:eth0/mtu:", Some(Value::Int32(9000)));
        db.insert("/agent:A/stats:rx", Some(Value::Uint64(12)));
        db.insert("/agent:B/route:default", Some(Value::String("10.0.0.1".into())));
        (db, registry)
    }

    #[test]
    fn objects_skip_bootstrap_and_keep_attributes() {
        let (db, registry) = seeded();
        let snapshot = capture(&registry, &db, &[]).unwrap();
        assert_eq!(snapshot.objects[0].oid.as_deref(), Some("/agent/interface"));
        let route = snapshot
            .objects
            .iter()
            .find(|o| o.oid.as_deref() == Some("/agent/route"))
            .unwrap();
        assert_eq!(route.value_type.as_deref(), Some("string"));
        assert_eq!(route.depends[0].oid.as_deref(), Some("/agent/interface"));
        assert_eq!(route.depends[0].scope.as_deref(), Some("object"));
    }

    #[test]
    fn instances_skip_roots_and_volatile() {
        let (db, registry) = seeded();
        let snapshot = capture(&registry, &db, &[]).unwrap();
        assert_eq!(
            snapshot.instances,
            vec![
                InstanceEntry::new("/agent:A/interface:eth0", None),
                InstanceEntry::new("/agent:A/interface:eth0/mtu:", Some("9000")),
                InstanceEntry::new("/agent:B/route:default", Some("10.0.0.1")),
            ]
        );
    }

    #[test]
    fn subtree_capture() {
        let (db, registry) = seeded();
        let snapshot = capture(&registry, &db, &["/agent:B".to_string()]).unwrap();
        assert_eq!(
            snapshot.instances,
            vec![InstanceEntry::new("/agent:B/route:default", Some("10.0.0.1"))]
        );
        let err = capture(&registry, &db, &["/agent:C".to_string()]).unwrap_err();
        assert!(matches!(err, ConfError::NotFound { .. }));
    }
}
