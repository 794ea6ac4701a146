//! Association collection state. Each collection holds one side of a typed
//! relationship as session-local entity keys, plus a baseline of the store
//! edges it was hydrated from; the sync engine diffs membership against the
//! baseline at commit. Collections never touch the store themselves —
//! inverse mirroring and hydration live on the session.

use ahash::AHashSet;

use crate::{
    backend::EdgeId,
    entity::EntityKey,
    errors::ObjectGraphError,
    schema::Cardinality,
};

#[derive(Clone, Debug, PartialEq)]
pub enum AssocContent {
    Single(Option<EntityKey>),
    List(Vec<EntityKey>),
    Set(AHashSet<EntityKey>),
}

/// One committed store edge backing a collection member. `position` is only
/// carried for list associations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkRecord {
    pub target: EntityKey,
    pub edge: EdgeId,
    pub position: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct Association {
    pub(crate) content: AssocContent,
    pub(crate) loaded: bool,
    pub(crate) baseline: Vec<LinkRecord>,
}

impl Association {
    /// Unloaded collection for a hydrated entity; members are fetched on
    /// first access.
    pub(crate) fn unloaded(cardinality: Cardinality) -> Self {
        Self {
            content: AssocContent::empty(cardinality),
            loaded: false,
            baseline: Vec::new(),
        }
    }

    /// Empty, loaded collection for a transient entity.
    pub(crate) fn fresh(cardinality: Cardinality) -> Self {
        Self {
            content: AssocContent::empty(cardinality),
            loaded: true,
            baseline: Vec::new(),
        }
    }

    pub fn members(&self) -> Vec<EntityKey> {
        self.content.members()
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.content.contains(key)
    }
}

impl AssocContent {
    pub(crate) fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::Single => AssocContent::Single(None),
            Cardinality::List { .. } => AssocContent::List(Vec::new()),
            Cardinality::Set => AssocContent::Set(AHashSet::new()),
        }
    }

    /// Membership snapshot: zero or one key for a single reference, list
    /// order for lists, keys sorted for sets.
    pub(crate) fn members(&self) -> Vec<EntityKey> {
        match self {
            AssocContent::Single(value) => value.iter().copied().collect(),
            AssocContent::List(items) => items.clone(),
            AssocContent::Set(items) => {
                let mut keys: Vec<EntityKey> = items.iter().copied().collect();
                keys.sort_unstable();
                keys
            }
        }
    }

    pub(crate) fn contains(&self, key: EntityKey) -> bool {
        match self {
            AssocContent::Single(value) => *value == Some(key),
            AssocContent::List(items) => items.contains(&key),
            AssocContent::Set(items) => items.contains(&key),
        }
    }

    pub(crate) fn single(&self) -> Option<EntityKey> {
        match self {
            AssocContent::Single(value) => *value,
            _ => None,
        }
    }

    /// Add `key` at `position` (lists only; `None` appends). Single slots
    /// overwrite; sets ignore a present member.
    pub(crate) fn insert(&mut self, key: EntityKey, position: Option<usize>) {
        match self {
            AssocContent::Single(value) => *value = Some(key),
            AssocContent::List(items) => match position {
                Some(index) => items.insert(index, key),
                None => items.push(key),
            },
            AssocContent::Set(items) => {
                items.insert(key);
            }
        }
    }

    /// Remove one occurrence of `key`. Returns whether anything changed.
    pub(crate) fn remove(&mut self, key: EntityKey) -> bool {
        match self {
            AssocContent::Single(value) => {
                if *value == Some(key) {
                    *value = None;
                    true
                } else {
                    false
                }
            }
            AssocContent::List(items) => match items.iter().position(|k| *k == key) {
                Some(index) => {
                    items.remove(index);
                    true
                }
                None => false,
            },
            AssocContent::Set(items) => items.remove(&key),
        }
    }

    /// Replace list order with `new_order`, which must be a permutation of
    /// the current membership.
    pub(crate) fn reorder(&mut self, new_order: &[EntityKey]) -> Result<(), ObjectGraphError> {
        let AssocContent::List(items) = self else {
            return Err(ObjectGraphError::invalid_input(
                "reorder applies to ordered lists only",
            ));
        };
        if !same_multiset(items, new_order) {
            return Err(ObjectGraphError::invalid_input(
                "new order must be a permutation of the current members",
            ));
        }
        items.clear();
        items.extend_from_slice(new_order);
        Ok(())
    }
}

fn same_multiset(a: &[EntityKey], b: &[EntityKey]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<EntityKey> = a.to_vec();
    let mut right: Vec<EntityKey> = b.to_vec();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}
