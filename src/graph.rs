use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    backend::{
        EdgeId, EdgeRecord, EdgeSpec, FetchDirection, GraphBackend, NodeId, NodeRecord, NodeSpec,
    },
    errors::ObjectGraphError,
    value::PropertyMap,
};

/// What `delete_node` does about incident edges. `Restrict` (the default)
/// refuses with a `Referential` error; `Cascade` deletes them with the node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CascadePolicy {
    #[default]
    Restrict,
    Cascade,
}

#[derive(Default)]
struct GraphTables {
    nodes: AHashMap<NodeId, NodeRecord>,
    edges: AHashMap<EdgeId, EdgeRecord>,
    outgoing: AHashMap<NodeId, Vec<EdgeId>>,
    incoming: AHashMap<NodeId, Vec<EdgeId>>,
    next_node: NodeId,
    next_edge: EdgeId,
}

/// In-memory graph store. Mutating operations serialize behind the write
/// lock so concurrent sessions never observe a half-applied creation;
/// fetches share the read lock. Node and edge lookup are O(1), edge
/// enumeration is O(degree). Ids are assigned monotonically from 1.
pub struct MemoryGraph {
    tables: RwLock<GraphTables>,
    policy: CascadePolicy,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::with_policy(CascadePolicy::Restrict)
    }

    pub fn with_policy(policy: CascadePolicy) -> Self {
        Self {
            tables: RwLock::new(GraphTables::default()),
            policy,
        }
    }

    pub fn policy(&self) -> CascadePolicy {
        self.policy
    }

    pub fn node_count(&self) -> usize {
        self.tables.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.tables.read().edges.len()
    }

    /// Delete all nodes and edges. Handles are not reused.
    pub fn clear(&self) {
        let mut tables = self.tables.write();
        tables.nodes.clear();
        tables.edges.clear();
        tables.outgoing.clear();
        tables.incoming.clear();
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBackend for MemoryGraph {
    fn create_node(&self, spec: NodeSpec) -> Result<NodeId, ObjectGraphError> {
        if spec.label.trim().is_empty() {
            return Err(ObjectGraphError::invalid_input("node label must be set"));
        }
        let mut tables = self.tables.write();
        tables.next_node += 1;
        let id = tables.next_node;
        tables.nodes.insert(
            id,
            NodeRecord {
                id,
                label: spec.label,
                properties: spec.properties,
            },
        );
        debug!(node = id, "created node");
        Ok(id)
    }

    fn update_node(&self, id: NodeId, properties: PropertyMap) -> Result<(), ObjectGraphError> {
        let mut tables = self.tables.write();
        let node = tables
            .nodes
            .get_mut(&id)
            .ok_or_else(|| ObjectGraphError::not_found(format!("node {id}")))?;
        for (name, value) in properties {
            node.properties.insert(name, value);
        }
        Ok(())
    }

    fn delete_node(&self, id: NodeId) -> Result<(), ObjectGraphError> {
        let mut tables = self.tables.write();
        if !tables.nodes.contains_key(&id) {
            return Err(ObjectGraphError::not_found(format!("node {id}")));
        }
        let mut incident: Vec<EdgeId> = Vec::new();
        incident.extend(tables.outgoing.get(&id).into_iter().flatten());
        incident.extend(tables.incoming.get(&id).into_iter().flatten());
        if !incident.is_empty() {
            if self.policy == CascadePolicy::Restrict {
                return Err(ObjectGraphError::referential(format!(
                    "node {id} still has {} incident edge(s); unlink first",
                    incident.len()
                )));
            }
            incident.sort_unstable();
            incident.dedup();
            for edge_id in incident {
                remove_edge(&mut tables, edge_id);
            }
        }
        tables.nodes.remove(&id);
        tables.outgoing.remove(&id);
        tables.incoming.remove(&id);
        debug!(node = id, "deleted node");
        Ok(())
    }

    fn create_edge(&self, spec: EdgeSpec) -> Result<EdgeId, ObjectGraphError> {
        if spec.edge_type.trim().is_empty() {
            return Err(ObjectGraphError::invalid_input("edge type must be set"));
        }
        let mut tables = self.tables.write();
        if !tables.nodes.contains_key(&spec.from) || !tables.nodes.contains_key(&spec.to) {
            return Err(ObjectGraphError::invalid_input(
                "edge endpoints must reference existing nodes",
            ));
        }
        tables.next_edge += 1;
        let id = tables.next_edge;
        tables.outgoing.entry(spec.from).or_default().push(id);
        tables.incoming.entry(spec.to).or_default().push(id);
        tables.edges.insert(
            id,
            EdgeRecord {
                id,
                edge_type: spec.edge_type,
                from: spec.from,
                to: spec.to,
                properties: spec.properties,
            },
        );
        debug!(edge = id, "created edge");
        Ok(id)
    }

    fn delete_edge(&self, id: EdgeId) -> Result<(), ObjectGraphError> {
        let mut tables = self.tables.write();
        if !tables.edges.contains_key(&id) {
            return Err(ObjectGraphError::not_found(format!("edge {id}")));
        }
        remove_edge(&mut tables, id);
        debug!(edge = id, "deleted edge");
        Ok(())
    }

    fn fetch_node(&self, id: NodeId) -> Result<NodeRecord, ObjectGraphError> {
        self.tables
            .read()
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| ObjectGraphError::not_found(format!("node {id}")))
    }

    fn fetch_edge(&self, id: EdgeId) -> Result<EdgeRecord, ObjectGraphError> {
        self.tables
            .read()
            .edges
            .get(&id)
            .cloned()
            .ok_or_else(|| ObjectGraphError::not_found(format!("edge {id}")))
    }

    fn fetch_edges(
        &self,
        node: NodeId,
        edge_type: &str,
        direction: FetchDirection,
    ) -> Result<Vec<(EdgeId, NodeId)>, ObjectGraphError> {
        let tables = self.tables.read();
        if !tables.nodes.contains_key(&node) {
            return Err(ObjectGraphError::not_found(format!("node {node}")));
        }
        let incident = match direction {
            FetchDirection::Outgoing => tables.outgoing.get(&node),
            FetchDirection::Incoming => tables.incoming.get(&node),
        };
        let mut result = Vec::new();
        for edge_id in incident.into_iter().flatten() {
            let Some(edge) = tables.edges.get(edge_id) else {
                continue;
            };
            if edge.edge_type != edge_type {
                continue;
            }
            let other = match direction {
                FetchDirection::Outgoing => edge.to,
                FetchDirection::Incoming => edge.from,
            };
            result.push((*edge_id, other));
        }
        Ok(result)
    }

    fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeId>, ObjectGraphError> {
        let tables = self.tables.read();
        let mut ids: Vec<NodeId> = tables
            .nodes
            .values()
            .filter(|node| node.label == label)
            .map(|node| node.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

fn remove_edge(tables: &mut GraphTables, id: EdgeId) {
    if let Some(edge) = tables.edges.remove(&id) {
        if let Some(out) = tables.outgoing.get_mut(&edge.from) {
            out.retain(|e| *e != id);
        }
        if let Some(inc) = tables.incoming.get_mut(&edge.to) {
            inc.retain(|e| *e != id);
        }
    }
}
