//! Schema registry
//!
//! Provides [`SchemaRegistry`], the set of objects known to the
//! configurator. Objects are validated from their raw [`ObjectSpec`],
//! registered with the backend (which assigns the ordinal) and kept in an
//! arena indexed by [`ObjectIdx`].

use std::str::FromStr;

use conf_model::{
    AccessMode, ConfError, ConfigBackend, DependencyScope, InstanceOid, ObjectOid, Registration,
    Request, Response, ValueType,
};
use indexmap::IndexMap;

use crate::graph::{Dependency, DependencyGraph};
use crate::object::{DependencySpec, ObjectIdx, ObjectSpec, SchemaObject};

/// Registered objects and their dependencies
///
/// Always contains the root object `/` (ordinal 0) and the agent object
/// `/agent` (ordinal 1).
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    objects: Vec<SchemaObject>,
    by_oid: IndexMap<ObjectOid, ObjectIdx>,
    graph: DependencyGraph,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Registry holding only the bootstrap objects
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            objects: Vec::new(),
            by_oid: IndexMap::new(),
            graph: DependencyGraph::new(),
        };
        let root = registry.insert(
            Registration {
                access: AccessMode::ReadOnly,
                ..Registration::new(ObjectOid::root())
            },
            0,
            None,
        );
        registry.insert(
            Registration {
                access: AccessMode::ReadOnly,
                ..Registration::new(ObjectOid::agent())
            },
            1,
            Some(root),
        );
        registry
    }

    /// Root object `/`
    #[inline]
    #[must_use]
    pub fn root(&self) -> ObjectIdx {
        ObjectIdx(0)
    }

    /// Agent object `/agent`
    #[inline]
    #[must_use]
    pub fn agent(&self) -> ObjectIdx {
        ObjectIdx(1)
    }

    /// Check if the object is one of the bootstrap objects
    #[inline]
    #[must_use]
    pub fn is_bootstrap(&self, idx: ObjectIdx) -> bool {
        idx.0 < 2
    }

    /// Number of registered objects, bootstrap objects included
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Always false: bootstrap objects are present
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Registered object
    ///
    /// # Panics
    /// Panics if `idx` was produced by a different registry.
    #[inline]
    #[must_use]
    pub fn get(&self, idx: ObjectIdx) -> &SchemaObject {
        &self.objects[idx.0]
    }

    /// Find an object by identifier
    #[inline]
    #[must_use]
    pub fn lookup(&self, oid: &ObjectOid) -> Option<ObjectIdx> {
        self.by_oid.get(oid).copied()
    }

    /// Find an object by textual identifier
    #[must_use]
    pub fn lookup_str(&self, oid: &str) -> Option<ObjectIdx> {
        oid.parse::<ObjectOid>().ok().and_then(|oid| self.lookup(&oid))
    }

    /// Object an instance belongs to
    #[must_use]
    pub fn object_for_instance(&self, oid: &InstanceOid) -> Option<ObjectIdx> {
        self.lookup(&oid.object_oid())
    }

    /// Registration order of an object
    #[inline]
    #[must_use]
    pub fn ordinal(&self, idx: ObjectIdx) -> u32 {
        self.objects[idx.0].ordinal
    }

    /// Check whether the object or one of its ancestors is volatile
    #[must_use]
    pub fn is_volatile(&self, idx: ObjectIdx) -> bool {
        let mut current = Some(idx);
        while let Some(i) = current {
            let object = &self.objects[i.0];
            if object.volatile {
                return true;
            }
            current = object.parent;
        }
        false
    }

    /// Check if any object depends on this one
    #[inline]
    #[must_use]
    pub fn has_dependants(&self, idx: ObjectIdx) -> bool {
        self.graph.has_dependants(idx)
    }

    /// Dependencies declared by an object
    #[inline]
    #[must_use]
    pub fn depends_on(&self, idx: ObjectIdx) -> Vec<Dependency> {
        self.graph.depends_on(idx)
    }

    /// Objects declaring a dependency on this one
    #[inline]
    #[must_use]
    pub fn dependants(&self, idx: ObjectIdx) -> Vec<ObjectIdx> {
        self.graph.dependants(idx)
    }

    /// Dependency cycles, as object identifiers
    #[must_use]
    pub fn dependency_cycles(&self) -> Vec<Vec<ObjectOid>> {
        self.graph
            .cycles()
            .into_iter()
            .map(|group| group.into_iter().map(|i| self.objects[i.0].oid.clone()).collect())
            .collect()
    }

    /// Objects in registration order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectIdx, &SchemaObject)> {
        self.by_oid.values().map(|&idx| (idx, &self.objects[idx.0]))
    }

    /// Objects in pre-order: each parent before its children
    #[must_use]
    pub fn preorder(&self) -> Vec<ObjectIdx> {
        let mut out = Vec::with_capacity(self.objects.len());
        let mut stack = vec![self.root()];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.objects[idx.0].children.iter().rev().copied());
        }
        out
    }

    /// Validate a raw object description
    ///
    /// # Errors
    /// Returns [`ConfError::InvalidSchema`] when the identifier is missing or
    /// malformed, an attribute has an unexpected spelling, or the default
    /// value does not parse under the object type.
    pub fn validate(spec: &ObjectSpec) -> Result<Registration, ConfError> {
        let Some(text) = spec.oid.as_deref() else {
            return Err(ConfError::invalid_schema("-", "object description has no oid"));
        };
        let oid: ObjectOid = text
            .parse()
            .map_err(|e| ConfError::invalid_schema(text, format!("{e}")))?;

        let value_type = match spec.value_type.as_deref() {
            Some(name) => ValueType::from_str(name)
                .map_err(|e| ConfError::invalid_schema(text, format!("{e}")))?,
            None => ValueType::None,
        };
        let access = match spec.access.as_deref() {
            Some(name) => {
                AccessMode::from_str(name).map_err(|e| ConfError::invalid_schema(text, e))?
            }
            None => AccessMode::ReadCreate,
        };
        let volatile = parse_flag(text, "volatile", spec.volatile.as_deref())?;
        let unit = parse_flag(text, "unit", spec.unit.as_deref())?;
        let parent_dep = match spec.parent_dep.as_deref() {
            None | Some("yes") => true,
            Some("no") => false,
            Some(other) => {
                return Err(ConfError::invalid_schema(
                    text,
                    format!("parent-dep must be 'yes' or 'no', got '{other}'"),
                ))
            }
        };
        if let Some(default) = spec.default.as_deref() {
            value_type.parse(default).map_err(|e| {
                ConfError::invalid_schema(text, format!("incorrect default value '{default}': {e}"))
            })?;
        }

        Ok(Registration {
            oid,
            value_type,
            access,
            default: spec.default.clone(),
            volatile,
            unit,
            parent_dep,
        })
    }

    /// Validate and register an object
    ///
    /// Registering an identical description twice is a no-op returning the
    /// existing index.
    ///
    /// # Errors
    /// - [`ConfError::InvalidSchema`] for a malformed description, a
    ///   conflicting re-registration or an unregistered parent
    /// - [`ConfError::Backend`] when the backend refuses the registration
    pub fn register_object<B>(
        &mut self,
        backend: &mut B,
        spec: &ObjectSpec,
    ) -> Result<ObjectIdx, ConfError>
    where
        B: ConfigBackend + ?Sized,
    {
        let registration = Self::validate(spec)?;
        let oid = registration.oid.clone();

        if let Some(existing) = self.lookup(&oid) {
            let object = &self.objects[existing.0];
            if self.is_bootstrap(existing) || !same_registration(object, &registration) {
                tracing::error!("Object {oid} is already registered with different attributes");
                return Err(ConfError::invalid_schema(
                    oid.as_str(),
                    "object is already registered with different attributes",
                ));
            }
            tracing::debug!("Object {oid} is already registered");
            return Ok(existing);
        }

        let parent = oid
            .parent()
            .and_then(|parent| self.lookup(&parent))
            .ok_or_else(|| {
                tracing::error!("Cannot register {oid}: parent object is not registered");
                ConfError::invalid_schema(oid.as_str(), "parent object is not registered")
            })?;

        let ordinal = match backend.apply(Request::Register(registration.clone())) {
            Ok(Response::Registered { ordinal }) => ordinal,
            Ok(Response::Done) => self.next_ordinal(),
            Err(e) => {
                tracing::error!("Failed to register object {oid}: {e}");
                return Err(ConfError::backend(oid.as_str(), e));
            }
        };

        let idx = self.insert(registration, ordinal, Some(parent));
        tracing::debug!("Registered object {oid} with ordinal {ordinal}");
        Ok(idx)
    }

    /// Register the dependencies of an object
    ///
    /// Returns the number of edges added.
    ///
    /// # Errors
    /// - [`ConfError::NotFound`] when the owner or a target is not registered
    /// - [`ConfError::InvalidSchema`] for a missing target or unknown scope
    /// - [`ConfError::Backend`] when the backend refuses the dependency
    pub fn register_dependencies<B>(
        &mut self,
        backend: &mut B,
        owner: &ObjectOid,
        edges: &[DependencySpec],
    ) -> Result<usize, ConfError>
    where
        B: ConfigBackend + ?Sized,
    {
        let owner_idx = self
            .lookup(owner)
            .ok_or_else(|| ConfError::not_found("object", owner.as_str()))?;

        for edge in edges {
            let Some(text) = edge.oid.as_deref() else {
                return Err(ConfError::invalid_schema(owner.as_str(), "dependency has no oid"));
            };
            let target: ObjectOid = text
                .parse()
                .map_err(|e| ConfError::invalid_schema(owner.as_str(), format!("{e}")))?;
            let target_idx = self
                .lookup(&target)
                .ok_or_else(|| ConfError::not_found("dependency target", text))?;
            let scope = match edge.scope.as_deref() {
                Some(scope) => DependencyScope::from_str(scope)
                    .map_err(|e| ConfError::invalid_schema(owner.as_str(), e))?,
                None => DependencyScope::Instance,
            };

            backend
                .apply(Request::AddDependency {
                    owner: owner.clone(),
                    target: target.clone(),
                    scope,
                })
                .map_err(|e| {
                    tracing::error!("Failed to add dependency {owner} -> {target}: {e}");
                    ConfError::backend(owner.as_str(), e)
                })?;

            if self.graph.add_edge(owner_idx, target_idx, scope) {
                tracing::warn!("Dependency {owner} -> {target} closes a dependency cycle");
            }
            if self.ordinal(target_idx) > self.ordinal(owner_idx) {
                tracing::warn!(
                    "{owner} depends on {target}, which was registered later; \
                     instances may be restored in the wrong order"
                );
            }
        }
        Ok(edges.len())
    }

    /// Register an object followed by its own dependencies
    ///
    /// # Errors
    /// See [`Self::register_object`] and [`Self::register_dependencies`].
    pub fn register_spec<B>(
        &mut self,
        backend: &mut B,
        spec: &ObjectSpec,
    ) -> Result<ObjectIdx, ConfError>
    where
        B: ConfigBackend + ?Sized,
    {
        let idx = self.register_object(backend, spec)?;
        let oid = self.objects[idx.0].oid.clone();
        self.register_dependencies(backend, &oid, &spec.depends)?;
        Ok(idx)
    }

    fn next_ordinal(&self) -> u32 {
        self.objects.iter().map(|o| o.ordinal).max().map_or(0, |max| max + 1)
    }

    fn insert(
        &mut self,
        registration: Registration,
        ordinal: u32,
        parent: Option<ObjectIdx>,
    ) -> ObjectIdx {
        let idx = ObjectIdx(self.objects.len());
        let unit_part = parent.is_some_and(|p| {
            let parent = &self.objects[p.0];
            parent.unit || parent.unit_part
        });
        self.objects.push(SchemaObject {
            oid: registration.oid.clone(),
            value_type: registration.value_type,
            access: registration.access,
            default: registration.default,
            volatile: registration.volatile,
            unit: registration.unit,
            unit_part,
            parent_dep: registration.parent_dep,
            ordinal,
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.objects[p.0].children.push(idx);
        }
        self.by_oid.insert(registration.oid, idx);
        self.graph.add_node(idx);
        idx
    }
}

fn parse_flag(oid: &str, name: &str, value: Option<&str>) -> Result<bool, ConfError> {
    match value {
        None | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(ConfError::invalid_schema(
            oid,
            format!("{name} must be 'true' or 'false', got '{other}'"),
        )),
    }
}

fn same_registration(object: &SchemaObject, registration: &Registration) -> bool {
    object.value_type == registration.value_type
        && object.access == registration.access
        && object.default == registration.default
        && object.volatile == registration.volatile
        && object.unit == registration.unit
        && object.parent_dep == registration.parent_dep
}
