//! Instance records of a restore pass
//!
//! Provides [`InstanceSet`], an arena of [`InstanceRecord`]s with a separate
//! processing order. Tree links are indices into the same arena.

use conf_model::{Handle, InstanceOid, Value};
use conf_schema::ObjectIdx;

/// Index of a record inside its [`InstanceSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceIdx(usize);

/// One instance to be restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    oid: InstanceOid,
    object: ObjectIdx,
    value: Option<Value>,
    pub(crate) handle: Option<Handle>,
    pub(crate) parent: Option<InstanceIdx>,
    pub(crate) children: Vec<InstanceIdx>,
    pub(crate) added: bool,
}

impl InstanceRecord {
    /// Create record, not yet linked into a tree
    #[must_use]
    pub fn new(
        oid: InstanceOid,
        object: ObjectIdx,
        value: Option<Value>,
        handle: Option<Handle>,
    ) -> Self {
        Self {
            oid,
            object,
            value,
            handle,
            parent: None,
            children: Vec::new(),
            added: false,
        }
    }

    /// Instance identifier
    #[inline]
    #[must_use]
    pub fn oid(&self) -> &InstanceOid {
        &self.oid
    }

    /// Owning object
    #[inline]
    #[must_use]
    pub fn object(&self) -> ObjectIdx {
        self.object
    }

    /// Target value
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Last known live handle
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    /// Parent within the snapshot tree
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<InstanceIdx> {
        self.parent
    }

    /// Children within the snapshot tree
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[InstanceIdx] {
        &self.children
    }

    /// Already applied during this restore
    #[inline]
    #[must_use]
    pub fn is_added(&self) -> bool {
        self.added
    }
}

/// Arena of instance records with a processing order
#[derive(Debug, Clone, Default)]
pub struct InstanceSet {
    records: Vec<InstanceRecord>,
    order: Vec<InstanceIdx>,
}

impl InstanceSet {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record at the end of the processing order
    pub fn push(&mut self, record: InstanceRecord) -> InstanceIdx {
        let idx = InstanceIdx(self.records.len());
        self.records.push(record);
        self.order.push(idx);
        idx
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record by index
    ///
    /// # Panics
    /// Panics if `idx` belongs to a different set.
    #[inline]
    #[must_use]
    pub fn get(&self, idx: InstanceIdx) -> &InstanceRecord {
        &self.records[idx.0]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, idx: InstanceIdx) -> &mut InstanceRecord {
        &mut self.records[idx.0]
    }

    /// Current processing order
    #[inline]
    #[must_use]
    pub fn order(&self) -> &[InstanceIdx] {
        &self.order
    }

    pub(crate) fn set_order(&mut self, order: Vec<InstanceIdx>) {
        self.order = order;
    }

    /// Records in processing order
    pub fn iter(&self) -> impl Iterator<Item = &InstanceRecord> {
        self.order.iter().map(|idx| &self.records[idx.0])
    }

    /// Drop all tree links
    pub(crate) fn clear_links(&mut self) {
        for record in &mut self.records {
            record.parent = None;
            record.children.clear();
        }
    }
}
