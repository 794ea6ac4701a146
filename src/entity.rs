use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashSet;

use crate::{backend::NodeId, collections::Association, value::PropertyMap};

/// Session-local entity key. Two reads of the same key observe the same
/// canonical entity state; the identity map guarantees one key per node id,
/// so key equality is instance identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(pub(crate) u64);

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Per-session lifecycle: `Transient` (no handle yet) becomes `Clean` on
/// first commit; mutation moves `Clean` to `Dirty` and commit back to
/// `Clean`; `Deleted` is terminal and rejects further mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityStatus {
    Transient,
    Clean,
    Dirty,
    Deleted,
}

#[derive(Debug)]
pub(crate) struct EntityData {
    pub(crate) label: String,
    pub(crate) node: Option<NodeId>,
    pub(crate) properties: PropertyMap,
    pub(crate) associations: BTreeMap<String, Association>,
    pub(crate) status: EntityStatus,
}

/// Unsaved changes for one entity since its last commit: property names and
/// association names whose membership changed. Marking is idempotent.
#[derive(Clone, Debug, Default)]
pub struct DirtyRecord {
    pub properties: AHashSet<String>,
    pub associations: AHashSet<String>,
}

impl DirtyRecord {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.associations.is_empty()
    }
}
