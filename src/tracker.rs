use ahash::AHashMap;

use crate::entity::{DirtyRecord, EntityKey};

/// Dirty bookkeeping for a session. Holds entity keys only, never entity
/// data: a record whose key no longer resolves in the session belongs to an
/// evicted entity and is dropped at the next commit.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    records: AHashMap<EntityKey, DirtyRecord>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an (initially empty) dirty record. New entities are dirty
    /// from birth so that commit picks them up even with no properties set.
    pub fn ensure(&mut self, key: EntityKey) {
        self.records.entry(key).or_default();
    }

    pub fn mark_property(&mut self, key: EntityKey, name: &str) {
        self.records
            .entry(key)
            .or_default()
            .properties
            .insert(name.to_string());
    }

    pub fn mark_association(&mut self, key: EntityKey, name: &str) {
        self.records
            .entry(key)
            .or_default()
            .associations
            .insert(name.to_string());
    }

    pub fn unmark_association(&mut self, key: EntityKey, name: &str) {
        if let Some(record) = self.records.get_mut(&key) {
            record.associations.remove(name);
        }
    }

    pub fn is_dirty(&self, key: EntityKey) -> bool {
        self.records.contains_key(&key)
    }

    pub fn record(&self, key: EntityKey) -> Option<&DirtyRecord> {
        self.records.get(&key)
    }

    /// Dirty state in ascending key order, for deterministic commits.
    pub fn snapshot(&self) -> Vec<(EntityKey, DirtyRecord)> {
        let mut entries: Vec<(EntityKey, DirtyRecord)> = self
            .records
            .iter()
            .map(|(key, record)| (*key, record.clone()))
            .collect();
        entries.sort_unstable_by_key(|(key, _)| *key);
        entries
    }

    pub fn clear(&mut self, key: EntityKey) {
        self.records.remove(&key);
    }

    pub fn clear_all(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
