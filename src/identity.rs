use ahash::AHashMap;

use crate::{backend::NodeId, entity::EntityKey, errors::ObjectGraphError};

/// Per-session registry guaranteeing at most one live entity per node id.
/// Resolving the same handle twice while it stays registered yields the same
/// key, which is what makes mutation-through-reference coherent everywhere
/// else in the crate.
#[derive(Debug, Default)]
pub struct IdentityMap {
    by_node: AHashMap<NodeId, EntityKey>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: NodeId) -> Option<EntityKey> {
        self.by_node.get(&id).copied()
    }

    /// Bind a newly persisted or hydrated entity to its handle. Binding a
    /// handle twice to different keys would break the one-instance guarantee
    /// and is rejected.
    pub fn register(&mut self, id: NodeId, key: EntityKey) -> Result<(), ObjectGraphError> {
        match self.by_node.get(&id) {
            Some(existing) if *existing != key => Err(ObjectGraphError::invalid_input(format!(
                "node {id} is already registered to {existing}"
            ))),
            _ => {
                self.by_node.insert(id, key);
                Ok(())
            }
        }
    }

    pub fn evict(&mut self, id: NodeId) -> Option<EntityKey> {
        self.by_node.remove(&id)
    }

    pub fn clear(&mut self) {
        self.by_node.clear();
    }

    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}
