//! Instance list parser
//!
//! Turns the textual instance entries of a snapshot into an
//! [`InstanceSet`], resolving objects and live handles and parsing values
//! under the object type.

use conf_model::{ConfError, ConfigBackend, InstanceOid, ValueError};
use conf_schema::SchemaRegistry;

use crate::document::InstanceEntry;
use crate::instance::{InstanceRecord, InstanceSet};

/// Parse snapshot instance entries
///
/// # Errors
/// - [`ConfError::InvalidSchema`] for a missing or malformed identifier, or a
///   value on an object that carries none
/// - [`ConfError::NotFound`] when the object is not registered
/// - [`ConfError::Value`] when a typed instance has no value or a bad one
pub fn parse_instances<B>(
    registry: &SchemaRegistry,
    backend: &B,
    entries: &[InstanceEntry],
) -> Result<InstanceSet, ConfError>
where
    B: ConfigBackend + ?Sized,
{
    let mut set = InstanceSet::new();
    for entry in entries {
        let record = parse_entry(registry, backend, entry).map_err(|e| {
            tracing::error!("Failed to parse instance entry: {e}");
            e
        })?;
        set.push(record);
    }
    tracing::debug!("Parsed {} instances", set.len());
    Ok(set)
}

fn parse_entry<B>(
    registry: &SchemaRegistry,
    backend: &B,
    entry: &InstanceEntry,
) -> Result<InstanceRecord, ConfError>
where
    B: ConfigBackend + ?Sized,
{
    let Some(text) = entry.oid.as_deref() else {
        return Err(ConfError::invalid_schema("-", "instance entry has no oid"));
    };
    let oid: InstanceOid = text
        .parse()
        .map_err(|e| ConfError::invalid_schema(text, format!("{e}")))?;
    let object = registry
        .object_for_instance(&oid)
        .ok_or_else(|| ConfError::not_found("object of instance", text))?;
    let value_type = registry.get(object).value_type();

    let value = match (value_type.has_value(), entry.value.as_deref()) {
        (true, Some(raw)) => Some(value_type.parse(raw).map_err(|e| ConfError::value(text, e))?),
        (true, None) => return Err(ConfError::value(text, ValueError::Missing)),
        (false, Some(_)) => {
            return Err(ConfError::invalid_schema(
                text,
                "value is prohibited for objects of type none",
            ))
        }
        (false, None) => None,
    };

    let handle = backend.find(&oid);
    Ok(InstanceRecord::new(oid, object, value, handle))
}
