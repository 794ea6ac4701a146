//! Commit protocol. A commit walks the dirty snapshot in key order and
//! issues: node creations, property updates (changed keys only), edge
//! creations, edge deletions, then staged node deletions. Handles and edge
//! baselines advance as each store call succeeds and dirty records are only
//! cleared at the end, so a failed commit leaves the session retryable
//! without re-deriving changes and a retry never re-applies finished work.
//! Already-applied in-memory-store operations are not rolled back on
//! failure; a transactional remote store rolls back its own side.

use ahash::AHashSet;
use tracing::debug;

use crate::{
    backend::{EdgeSpec, GraphBackend, NodeId, NodeSpec},
    collections::{AssocContent, Association, LinkRecord},
    entity::{DirtyRecord, EntityKey, EntityStatus},
    errors::ObjectGraphError,
    schema::Direction,
    session::{POSITION_PROP, Session},
    value::{PropertyMap, PropertyValue},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub nodes_created: usize,
    pub nodes_updated: usize,
    pub edges_created: usize,
    pub edges_deleted: usize,
    pub nodes_deleted: usize,
}

struct PlannedAdd {
    owner: EntityKey,
    name: String,
    target: EntityKey,
    position: Option<i64>,
    edge_type: String,
    direction: Direction,
}

struct PlannedRemove {
    owner: EntityKey,
    name: String,
    record: LinkRecord,
}

impl<B> Session<B>
where
    B: GraphBackend,
{
    /// Reconcile all tracked changes with the store as one logical
    /// transaction. On failure the remaining operations are aborted and
    /// every dirty record stays intact; a later commit resumes from where
    /// things stand.
    pub fn commit(&mut self) -> Result<CommitStats, ObjectGraphError> {
        let mut stats = CommitStats::default();
        let snapshot: Vec<(EntityKey, DirtyRecord)> = self
            .tracker
            .snapshot()
            .into_iter()
            .filter(|(key, _)| {
                // Records for entities that left the session are stale
                // bookkeeping; drop them.
                if self.entities.contains_key(key) {
                    true
                } else {
                    self.tracker.clear(*key);
                    false
                }
            })
            .collect();

        // Creations first: every transient participant gets its handle
        // before any update or edge references it.
        let mut created: AHashSet<EntityKey> = AHashSet::new();
        for (key, _) in &snapshot {
            let Some(ent) = self.entities.get(key) else {
                continue;
            };
            if ent.status == EntityStatus::Deleted || ent.node.is_some() {
                continue;
            }
            let spec = NodeSpec {
                label: ent.label.clone(),
                properties: ent.properties.clone(),
            };
            let id = self.backend.create_node(spec)?;
            if let Some(ent) = self.entities.get_mut(key) {
                ent.node = Some(id);
            }
            self.identity.register(id, *key)?;
            created.insert(*key);
            stats.nodes_created += 1;
        }

        // Updates: only the changed properties, and only for entities that
        // were not just written wholesale by create_node.
        for (key, record) in &snapshot {
            if created.contains(key) || record.properties.is_empty() {
                continue;
            }
            let Some(ent) = self.entities.get(key) else {
                continue;
            };
            if ent.status == EntityStatus::Deleted {
                continue;
            }
            let Some(id) = ent.node else {
                continue;
            };
            let mut names: Vec<&String> = record.properties.iter().collect();
            names.sort_unstable();
            let mut changed = PropertyMap::new();
            for name in names {
                if let Some(value) = ent.properties.get(name) {
                    changed.insert(name.clone(), value.clone());
                }
            }
            if changed.is_empty() {
                continue;
            }
            self.backend.update_node(id, changed)?;
            stats.nodes_updated += 1;
        }

        // Edge diffs, owning sides only. All creations run before all
        // deletions so a remove-and-re-add of the same pair never
        // transiently drops the link for concurrent readers.
        let (adds, removes) = self.plan_edges(&snapshot)?;
        for add in adds {
            let owner_node = self.node_of(add.owner)?;
            let target_node = self.node_of(add.target)?;
            let (from, to) = match add.direction {
                Direction::Outgoing => (owner_node, target_node),
                Direction::Incoming => (target_node, owner_node),
            };
            let mut properties = PropertyMap::new();
            if let Some(position) = add.position {
                properties.insert(POSITION_PROP.to_string(), PropertyValue::Integer(position));
            }
            let edge = self.backend.create_edge(EdgeSpec {
                edge_type: add.edge_type,
                from,
                to,
                properties,
            })?;
            if let Some(ent) = self.entities.get_mut(&add.owner) {
                if let Some(assoc) = ent.associations.get_mut(&add.name) {
                    assoc.baseline.push(LinkRecord {
                        target: add.target,
                        edge,
                        position: add.position,
                    });
                }
            }
            stats.edges_created += 1;
        }
        for rm in removes {
            self.backend.delete_edge(rm.record.edge)?;
            if let Some(ent) = self.entities.get_mut(&rm.owner) {
                if let Some(assoc) = ent.associations.get_mut(&rm.name) {
                    assoc.baseline.retain(|r| r.edge != rm.record.edge);
                }
            }
            stats.edges_deleted += 1;
        }

        // Staged node deletions. The store rejects these while foreign
        // edges still reference the node.
        for (key, _) in &snapshot {
            let Some(ent) = self.entities.get(key) else {
                continue;
            };
            if ent.status != EntityStatus::Deleted {
                continue;
            }
            if let Some(id) = ent.node {
                self.backend.delete_node(id)?;
                self.identity.evict(id);
                stats.nodes_deleted += 1;
            }
            self.entities.remove(key);
            self.tracker.clear(*key);
        }

        // Everything applied: clear the participants.
        for (key, _) in &snapshot {
            if let Some(ent) = self.entities.get_mut(key) {
                ent.status = EntityStatus::Clean;
            }
            self.tracker.clear(*key);
        }
        debug!(
            created = stats.nodes_created,
            updated = stats.nodes_updated,
            edges_created = stats.edges_created,
            edges_deleted = stats.edges_deleted,
            deleted = stats.nodes_deleted,
            "commit complete"
        );
        Ok(stats)
    }

    fn plan_edges(
        &self,
        snapshot: &[(EntityKey, DirtyRecord)],
    ) -> Result<(Vec<PlannedAdd>, Vec<PlannedRemove>), ObjectGraphError> {
        let mut adds = Vec::new();
        let mut removes = Vec::new();
        for (key, record) in snapshot {
            let Some(ent) = self.entities.get(key) else {
                continue;
            };
            let class = self.schema.class(&ent.label)?;
            let mut names: Vec<&String> = record.associations.iter().collect();
            names.sort_unstable();
            for name in names {
                let Some(rel) = class.relation(name) else {
                    continue;
                };
                if !rel.owning {
                    continue;
                }
                let Some(assoc) = ent.associations.get(name) else {
                    continue;
                };
                let desired = desired_membership(assoc);
                let mut unused = assoc.baseline.clone();
                for (target, position) in desired {
                    if let Some(i) = unused
                        .iter()
                        .position(|r| r.target == target && r.position == position)
                    {
                        unused.remove(i);
                    } else {
                        adds.push(PlannedAdd {
                            owner: *key,
                            name: name.clone(),
                            target,
                            position,
                            edge_type: rel.edge_type.clone(),
                            direction: rel.direction,
                        });
                    }
                }
                for record in unused {
                    removes.push(PlannedRemove {
                        owner: *key,
                        name: name.clone(),
                        record,
                    });
                }
            }
        }
        Ok((adds, removes))
    }

    fn node_of(&self, key: EntityKey) -> Result<NodeId, ObjectGraphError> {
        self.entity(key)?
            .node
            .ok_or_else(|| ObjectGraphError::detached(format!("{key} has no store handle")))
    }
}

fn desired_membership(assoc: &Association) -> Vec<(EntityKey, Option<i64>)> {
    match &assoc.content {
        AssocContent::Single(value) => value.iter().map(|k| (*k, None)).collect(),
        AssocContent::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, k)| (*k, Some(i as i64)))
            .collect(),
        AssocContent::Set(items) => {
            let mut keys: Vec<EntityKey> = items.iter().copied().collect();
            keys.sort_unstable();
            keys.into_iter().map(|k| (k, None)).collect()
        }
    }
}
