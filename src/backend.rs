//! Backend trait bridging the mapping layer with a concrete graph store. The
//! in-memory [`crate::graph::MemoryGraph`] is the default implementation; a
//! remote store implements the same contract and may additionally fail with
//! [`ObjectGraphError::StoreUnavailable`] or [`ObjectGraphError::StoreTimeout`],
//! which the sync engine surfaces to the caller instead of retrying. Remote
//! implementations are expected to bound every operation with a caller-supplied
//! timeout rather than block a session indefinitely.

use serde::{Deserialize, Serialize};

use crate::{errors::ObjectGraphError, value::PropertyMap};

/// Store-assigned node handle. Positive and monotonically increasing for the
/// in-memory store; an external identifier for remote stores.
pub type NodeId = i64;
pub type EdgeId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchDirection {
    Outgoing,
    Incoming,
}

#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub label: String,
    pub properties: PropertyMap,
}

#[derive(Clone, Debug)]
pub struct EdgeSpec {
    pub edge_type: String,
    pub from: NodeId,
    pub to: NodeId,
    pub properties: PropertyMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub label: String,
    pub properties: PropertyMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub edge_type: String,
    pub from: NodeId,
    pub to: NodeId,
    pub properties: PropertyMap,
}

pub trait GraphBackend {
    fn create_node(&self, spec: NodeSpec) -> Result<NodeId, ObjectGraphError>;

    /// Merge-write: keys present in `properties` are written, other keys on
    /// the node are left untouched.
    fn update_node(&self, id: NodeId, properties: PropertyMap) -> Result<(), ObjectGraphError>;

    /// Fails with `Referential` while edges still reference the node, unless
    /// the store is configured to cascade.
    fn delete_node(&self, id: NodeId) -> Result<(), ObjectGraphError>;

    fn create_edge(&self, spec: EdgeSpec) -> Result<EdgeId, ObjectGraphError>;

    fn delete_edge(&self, id: EdgeId) -> Result<(), ObjectGraphError>;

    fn fetch_node(&self, id: NodeId) -> Result<NodeRecord, ObjectGraphError>;

    fn fetch_edge(&self, id: EdgeId) -> Result<EdgeRecord, ObjectGraphError>;

    /// Enumerate edges of `edge_type` incident to `node`, following the given
    /// direction. Returns `(edge, other_end)` pairs in a stable order.
    fn fetch_edges(
        &self,
        node: NodeId,
        edge_type: &str,
        direction: FetchDirection,
    ) -> Result<Vec<(EdgeId, NodeId)>, ObjectGraphError>;

    /// Scan primitive for the find layer: all node ids carrying `label`,
    /// ascending.
    fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeId>, ObjectGraphError>;
}

impl<'a, B> GraphBackend for &'a B
where
    B: GraphBackend + ?Sized,
{
    fn create_node(&self, spec: NodeSpec) -> Result<NodeId, ObjectGraphError> {
        (*self).create_node(spec)
    }

    fn update_node(&self, id: NodeId, properties: PropertyMap) -> Result<(), ObjectGraphError> {
        (*self).update_node(id, properties)
    }

    fn delete_node(&self, id: NodeId) -> Result<(), ObjectGraphError> {
        (*self).delete_node(id)
    }

    fn create_edge(&self, spec: EdgeSpec) -> Result<EdgeId, ObjectGraphError> {
        (*self).create_edge(spec)
    }

    fn delete_edge(&self, id: EdgeId) -> Result<(), ObjectGraphError> {
        (*self).delete_edge(id)
    }

    fn fetch_node(&self, id: NodeId) -> Result<NodeRecord, ObjectGraphError> {
        (*self).fetch_node(id)
    }

    fn fetch_edge(&self, id: EdgeId) -> Result<EdgeRecord, ObjectGraphError> {
        (*self).fetch_edge(id)
    }

    fn fetch_edges(
        &self,
        node: NodeId,
        edge_type: &str,
        direction: FetchDirection,
    ) -> Result<Vec<(EdgeId, NodeId)>, ObjectGraphError> {
        (*self).fetch_edges(node, edge_type, direction)
    }

    fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeId>, ObjectGraphError> {
        (*self).nodes_with_label(label)
    }
}
