//! In-memory configuration database

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use conf_model::{
    AccessMode, BackendError, ConfigBackend, DependencyScope, Handle, InstanceOid, LiveInstance,
    ObjectOid, Request, Response, Value, ValueType,
};

#[derive(Debug, Clone)]
struct MemoryObject {
    value_type: ValueType,
    access: AccessMode,
    ordinal: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    handle: Handle,
    value: Option<Value>,
}

/// State change applied by the simulated agents on synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Create the instance or overwrite its value
    Upsert(InstanceOid, Option<Value>),
    /// Remove the instance with its subtree
    Remove(InstanceOid),
}

impl Change {
    fn oid(&self) -> &InstanceOid {
        match self {
            Self::Upsert(oid, _) | Self::Remove(oid) => oid,
        }
    }
}

#[derive(Debug, Clone)]
struct SyncEffect {
    change: Change,
    trigger: Option<InstanceOid>,
    armed: bool,
    repeat: bool,
}

/// Configuration database kept in memory
///
/// Behaves like the real database for the requests the restore engine
/// issues, records every request and synchronization, and lets tests
/// script agent-side effects and failures.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    objects: HashMap<ObjectOid, MemoryObject>,
    next_ordinal: u32,
    dependencies: Vec<(ObjectOid, ObjectOid, DependencyScope)>,
    instances: BTreeMap<InstanceOid, Slot>,
    handles: HashMap<Handle, InstanceOid>,
    next_handle: u64,
    requests: Vec<Request>,
    syncs: Vec<String>,
    failures: HashMap<String, BackendError>,
    requirements: Vec<(InstanceOid, InstanceOid)>,
    effects: Vec<SyncEffect>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    /// Database with the root and agent objects and the root instance
    pub fn new() -> Self {
        let mut db = Self {
            objects: HashMap::new(),
            next_ordinal: 2,
            dependencies: Vec::new(),
            instances: BTreeMap::new(),
            handles: HashMap::new(),
            next_handle: 0,
            requests: Vec::new(),
            syncs: Vec::new(),
            failures: HashMap::new(),
            requirements: Vec::new(),
            effects: Vec::new(),
        };
        for (oid, ordinal) in [(ObjectOid::root(), 0), (ObjectOid::agent(), 1)] {
            db.objects.insert(
                oid,
                MemoryObject {
                    value_type: ValueType::None,
                    access: AccessMode::ReadOnly,
                    ordinal,
                },
            );
        }
        db.insert_raw(InstanceOid::root(), None);
        db
    }

    /// Add an agent root instance `/agent:<name>`
    pub fn with_agent(mut self, name: &str) -> Self {
        self.insert_raw(InstanceOid::agent(name), None);
        self
    }

    /// Seed an instance without going through request validation
    pub fn insert(&mut self, oid: &str, value: Option<Value>) -> Handle {
        self.insert_raw(parse(oid), value)
    }

    /// Fail every request (and sync) targeting `oid` with `error`
    pub fn fail_on(&mut self, oid: &str, error: BackendError) {
        self.failures.insert(oid.to_string(), error);
    }

    /// Stop failing requests targeting `oid`
    pub fn clear_failure(&mut self, oid: &str) {
        self.failures.remove(oid);
    }

    /// Make adding `instance` fail with `NotFound` until `needs` exists
    pub fn require(&mut self, instance: &str, needs: &str) {
        self.requirements.push((parse(instance), parse(needs)));
    }

    /// Apply `change` on the next synchronization covering it
    pub fn on_sync(&mut self, change: Change) {
        self.effects.push(SyncEffect {
            change,
            trigger: None,
            armed: true,
            repeat: false,
        });
    }

    /// Apply `change` on every synchronization covering it
    pub fn on_every_sync(&mut self, change: Change) {
        self.effects.push(SyncEffect {
            change,
            trigger: None,
            armed: true,
            repeat: true,
        });
    }

    /// Apply `change` on the first synchronization after `trigger` is added
    pub fn after_add(&mut self, trigger: &str, change: Change) {
        self.effects.push(SyncEffect {
            change,
            trigger: Some(parse(trigger)),
            armed: false,
            repeat: false,
        });
    }

    /// Every request received, in order
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Requests that change instances
    pub fn mutations(&self) -> Vec<&Request> {
        self.requests.iter().filter(|r| r.is_mutation()).collect()
    }

    /// Number of requests of the given kind (see [`Request::kind`])
    pub fn count(&self, kind: &str) -> usize {
        self.requests.iter().filter(|r| r.kind() == kind).count()
    }

    /// Subtrees synchronized, in order
    pub fn syncs(&self) -> &[String] {
        &self.syncs
    }

    /// Forget recorded requests and synchronizations
    pub fn clear_history(&mut self) {
        self.requests.clear();
        self.syncs.clear();
    }

    /// Check if an instance exists
    pub fn contains(&self, oid: &str) -> bool {
        self.instances.contains_key(&parse(oid))
    }

    /// Current value of an instance
    pub fn value(&self, oid: &str) -> Option<&Value> {
        self.instances.get(&parse(oid)).and_then(|slot| slot.value.as_ref())
    }

    /// All instance identifiers except the root, in tree order
    pub fn instance_oids(&self) -> Vec<String> {
        self.instances
            .keys()
            .filter(|oid| !oid.is_root())
            .map(|oid| oid.as_str().to_string())
            .collect()
    }

    /// Ordinal assigned to a registered object
    pub fn ordinal(&self, oid: &str) -> Option<u32> {
        oid.parse::<ObjectOid>()
            .ok()
            .and_then(|oid| self.objects.get(&oid).map(|o| o.ordinal))
    }

    /// Registered dependencies
    pub fn dependencies(&self) -> &[(ObjectOid, ObjectOid, DependencyScope)] {
        &self.dependencies
    }

    fn insert_raw(&mut self, oid: InstanceOid, value: Option<Value>) -> Handle {
        if let Some(slot) = self.instances.get_mut(&oid) {
            slot.value = value;
            return slot.handle;
        }
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        self.handles.insert(handle, oid.clone());
        self.instances.insert(oid, Slot { handle, value });
        handle
    }

    fn remove_subtree(&mut self, oid: &InstanceOid) {
        let doomed: Vec<InstanceOid> = self
            .instances
            .range(oid.clone()..)
            .take_while(|(candidate, _)| candidate.is_within(oid))
            .map(|(candidate, _)| candidate.clone())
            .collect();
        for candidate in doomed {
            if let Some(slot) = self.instances.remove(&candidate) {
                self.handles.remove(&slot.handle);
            }
        }
    }

    fn add(&mut self, oid: InstanceOid, value: Option<Value>) -> Result<Response, BackendError> {
        if self.instances.contains_key(&oid) {
            return Err(BackendError::already_exists(format!("{oid} exists")));
        }
        let object_oid = oid.object_oid();
        let Some(object) = self.objects.get(&object_oid) else {
            return Err(BackendError::not_found(format!("object {object_oid} is unknown")));
        };
        match (object.value_type.has_value(), &value) {
            (true, None) => return Err(BackendError::rejected(format!("{oid} needs a value"))),
            (false, Some(_)) => return Err(BackendError::rejected(format!("{oid} takes no value"))),
            _ => {}
        }
        if let Some(parent) = oid.parent() {
            if !self.instances.contains_key(&parent) {
                return Err(BackendError::not_found(format!("parent {parent} is missing")));
            }
        }
        if let Some((_, needs)) = self
            .requirements
            .iter()
            .find(|(inst, needs)| *inst == oid && !self.instances.contains_key(needs))
        {
            return Err(BackendError::not_found(format!("{oid} needs {needs}")));
        }
        self.insert_raw(oid.clone(), value);
        for effect in &mut self.effects {
            if effect.trigger.as_ref() == Some(&oid) {
                effect.armed = true;
            }
        }
        Ok(Response::Done)
    }
}

fn parse(oid: &str) -> InstanceOid {
    oid.parse()
        .unwrap_or_else(|e| panic!("bad instance identifier {oid}: {e}"))
}

impl ConfigBackend for MemoryDatabase {
    fn apply(&mut self, request: Request) -> Result<Response, BackendError> {
        self.requests.push(request.clone());
        if let Some(error) = self.failures.get(request.target()) {
            return Err(error.clone());
        }

        match request {
            Request::Register(reg) => {
                if self.objects.contains_key(&reg.oid) {
                    return Err(BackendError::already_exists(format!("object {} exists", reg.oid)));
                }
                let Some(parent) = reg.oid.parent() else {
                    return Err(BackendError::unsupported("cannot register the root"));
                };
                if !self.objects.contains_key(&parent) {
                    return Err(BackendError::not_found(format!("object {parent} is unknown")));
                }
                let ordinal = self.next_ordinal;
                self.next_ordinal += 1;
                self.objects.insert(
                    reg.oid,
                    MemoryObject {
                        value_type: reg.value_type,
                        access: reg.access,
                        ordinal,
                    },
                );
                Ok(Response::Registered { ordinal })
            }
            Request::AddDependency { owner, target, scope } => {
                for oid in [&owner, &target] {
                    if !self.objects.contains_key(oid) {
                        return Err(BackendError::not_found(format!("object {oid} is unknown")));
                    }
                }
                self.dependencies.push((owner, target, scope));
                Ok(Response::Done)
            }
            Request::Add { oid, value, .. } => self.add(oid, value),
            Request::Set { handle, oid, value, .. } => {
                let Some(current) = self.handles.get(&handle) else {
                    return Err(BackendError::not_found(format!("stale handle {handle} for {oid}")));
                };
                let current = current.clone();
                if let Some(object) = self.objects.get(&current.object_oid()) {
                    if object.access == AccessMode::ReadOnly {
                        return Err(BackendError::rejected(format!("{current} is read-only")));
                    }
                }
                if let Some(slot) = self.instances.get_mut(&current) {
                    slot.value = Some(value);
                }
                Ok(Response::Done)
            }
            Request::Delete { handle, oid } => {
                let Some(current) = self.handles.get(&handle).cloned() else {
                    return Err(BackendError::not_found(format!("stale handle {handle} for {oid}")));
                };
                self.remove_subtree(&current);
                Ok(Response::Done)
            }
            Request::Commit { oid } => {
                if self.instances.contains_key(&oid) {
                    Ok(Response::Done)
                } else {
                    Err(BackendError::not_found(format!("nothing to commit at {oid}")))
                }
            }
        }
    }

    fn find(&self, oid: &InstanceOid) -> Option<Handle> {
        self.instances.get(oid).map(|slot| slot.handle)
    }

    fn instance(&self, handle: Handle) -> Option<LiveInstance> {
        let oid = self.handles.get(&handle)?;
        let slot = self.instances.get(oid)?;
        let depth = oid.depth();
        let children = self
            .instances
            .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
            .take_while(|(candidate, _)| candidate.is_within(oid))
            .filter(|(candidate, _)| candidate.depth() == depth + 1)
            .map(|(_, child)| child.handle)
            .collect();
        Some(LiveInstance {
            handle,
            oid: oid.clone(),
            value: slot.value.clone(),
            children,
        })
    }

    fn instances(&self) -> Vec<Handle> {
        self.instances.values().map(|slot| slot.handle).collect()
    }

    fn sync(&mut self, subtree: &str) -> Result<(), BackendError> {
        self.syncs.push(subtree.to_string());
        if let Some(error) = self.failures.get(subtree) {
            return Err(error.clone());
        }
        let covers = |oid: &InstanceOid| subtree == "/:" || oid.as_str().starts_with(subtree);
        let due: Vec<Change> = self
            .effects
            .iter()
            .filter(|e| e.armed && covers(e.change.oid()))
            .map(|e| e.change.clone())
            .collect();
        self.effects
            .retain(|e| e.repeat || !(e.armed && covers(e.change.oid())));
        for change in due {
            match change {
                Change::Upsert(oid, value) => {
                    self.insert_raw(oid, value);
                }
                Change::Remove(oid) => self.remove_subtree(&oid),
            }
        }
        Ok(())
    }
}
