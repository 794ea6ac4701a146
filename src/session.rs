//! The session is the unit of work: it owns the identity map, the change
//! tracker, and the canonical entity state, over any [`GraphBackend`].
//! Association mutations validate first, then update both endpoints in
//! memory; nothing reaches the store before [`Session::commit`].

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashSet;
use tracing::debug;

use crate::{
    backend::{FetchDirection, GraphBackend, NodeId},
    collections::{AssocContent, Association, LinkRecord},
    entity::{EntityData, EntityKey, EntityStatus},
    errors::ObjectGraphError,
    identity::IdentityMap,
    schema::{Cardinality, Direction, RelationSchema, SchemaRegistry},
    tracker::ChangeTracker,
    value::{PropertyMap, PropertyValue},
};

/// Edge property carrying an ordered list member's ordinal. The store has no
/// native edge ordering, so positions are persisted explicitly.
pub(crate) const POSITION_PROP: &str = "__position";

pub struct Session<B> {
    pub(crate) backend: B,
    pub(crate) schema: Arc<SchemaRegistry>,
    pub(crate) entities: ahash::AHashMap<EntityKey, EntityData>,
    pub(crate) identity: IdentityMap,
    pub(crate) tracker: ChangeTracker,
    next_key: u64,
}

impl<B> Session<B>
where
    B: GraphBackend,
{
    /// Open an empty session bound to the given store and schema. Sessions
    /// are single-writer units of work; share the store, not the session.
    pub fn open(backend: B, schema: Arc<SchemaRegistry>) -> Self {
        Self {
            backend,
            schema,
            entities: ahash::AHashMap::new(),
            identity: IdentityMap::new(),
            tracker: ChangeTracker::new(),
            next_key: 0,
        }
    }

    /// Discard the session's caches. Committed store state is unaffected;
    /// uncommitted changes are lost.
    pub fn close(self) {}

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Create a new transient entity of the given class. It is dirty from
    /// birth and will be persisted by the next commit.
    pub fn create(&mut self, label: &str) -> Result<EntityKey, ObjectGraphError> {
        let schema = self.schema.clone();
        let class = schema.class(label)?;
        let mut associations = BTreeMap::new();
        for name in class.relation_names() {
            if let Some(rel) = class.relation(name) {
                associations.insert(name.to_string(), Association::fresh(rel.cardinality));
            }
        }
        let key = self.alloc_key();
        self.entities.insert(
            key,
            EntityData {
                label: label.to_string(),
                node: None,
                properties: PropertyMap::new(),
                associations,
                status: EntityStatus::Transient,
            },
        );
        self.tracker.ensure(key);
        Ok(key)
    }

    /// Resolve a node handle to its entity, hydrating it from the store on
    /// first sight. While the entity stays registered, every resolve of the
    /// same handle returns the same key.
    pub fn resolve(&mut self, id: NodeId) -> Result<EntityKey, ObjectGraphError> {
        if let Some(key) = self.identity.lookup(id) {
            return Ok(key);
        }
        let record = self.backend.fetch_node(id)?;
        let schema = self.schema.clone();
        let class = schema.class(&record.label)?;
        let mut associations = BTreeMap::new();
        for name in class.relation_names() {
            if let Some(rel) = class.relation(name) {
                associations.insert(name.to_string(), Association::unloaded(rel.cardinality));
            }
        }
        let mut properties = PropertyMap::new();
        for (name, value) in record.properties {
            match class.property_kind(&name) {
                Some(kind) if value.kind_matches(kind) => {
                    properties.insert(name, value);
                }
                _ => {}
            }
        }
        let key = self.alloc_key();
        self.entities.insert(
            key,
            EntityData {
                label: record.label,
                node: Some(id),
                properties,
                associations,
                status: EntityStatus::Clean,
            },
        );
        self.identity.register(id, key)?;
        debug!(node = id, %key, "hydrated entity");
        Ok(key)
    }

    /// Remove an entity from the session without touching the store.
    /// Uncommitted changes to it are dropped; keys to it held elsewhere
    /// surface `DetachedEntity` on later use.
    pub fn evict(&mut self, key: EntityKey) -> Result<(), ObjectGraphError> {
        let ent = self.entity(key)?;
        if let Some(id) = ent.node {
            self.identity.evict(id);
        }
        self.entities.remove(&key);
        self.tracker.clear(key);
        Ok(())
    }

    /// Stage an entity for deletion from the graph. Managed entities turn
    /// `Deleted` immediately (further mutation fails) and are removed from
    /// the store at commit; the store rejects the deletion while other
    /// edges still reference the node. Transient entities vanish without
    /// trace.
    pub fn delete(&mut self, key: EntityKey) -> Result<(), ObjectGraphError> {
        let ent = self.entity(key)?;
        if ent.status == EntityStatus::Deleted {
            return Err(ObjectGraphError::detached(format!("{key} has been deleted")));
        }
        if ent.node.is_none() {
            self.entities.remove(&key);
            self.tracker.clear(key);
            return Ok(());
        }
        let ent = self.entity_mut(key)?;
        ent.status = EntityStatus::Deleted;
        self.tracker.ensure(key);
        Ok(())
    }

    pub fn handle(&self, key: EntityKey) -> Result<Option<NodeId>, ObjectGraphError> {
        Ok(self.entity(key)?.node)
    }

    pub fn status(&self, key: EntityKey) -> Result<EntityStatus, ObjectGraphError> {
        Ok(self.entity(key)?.status)
    }

    pub fn label(&self, key: EntityKey) -> Result<&str, ObjectGraphError> {
        Ok(&self.entity(key)?.label)
    }

    pub fn is_dirty(&self, key: EntityKey) -> bool {
        self.tracker.is_dirty(key)
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn property(
        &self,
        key: EntityKey,
        name: &str,
    ) -> Result<Option<PropertyValue>, ObjectGraphError> {
        let ent = self.entity(key)?;
        let class = self.schema.class(&ent.label)?;
        if class.property_kind(name).is_none() {
            return Err(ObjectGraphError::invalid_input(format!(
                "class '{}' declares no property '{name}'",
                ent.label
            )));
        }
        Ok(ent.properties.get(name).cloned())
    }

    pub fn set_property<V: Into<PropertyValue>>(
        &mut self,
        key: EntityKey,
        name: &str,
        value: V,
    ) -> Result<(), ObjectGraphError> {
        let value = value.into();
        let label = self.live(key)?.label.clone();
        let schema = self.schema.clone();
        let class = schema.class(&label)?;
        let kind = class.property_kind(name).ok_or_else(|| {
            ObjectGraphError::invalid_input(format!(
                "class '{label}' declares no property '{name}'"
            ))
        })?;
        if !value.kind_matches(kind) {
            return Err(ObjectGraphError::type_mismatch(format!(
                "property '{label}.{name}' expects {kind}, got {}",
                value.kind_name()
            )));
        }
        let ent = self.entity_mut(key)?;
        ent.properties.insert(name.to_string(), value);
        self.tracker.mark_property(key, name);
        self.touch(key);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Single references
    // ------------------------------------------------------------------

    pub fn single(
        &mut self,
        key: EntityKey,
        name: &str,
    ) -> Result<Option<EntityKey>, ObjectGraphError> {
        let rel = self.relation_for(key, name)?;
        if !rel.cardinality.is_single() {
            return Err(ObjectGraphError::invalid_input(format!(
                "'{name}' is not a single reference"
            )));
        }
        self.ensure_loaded(key, name)?;
        Ok(self.assoc_ref(key, name)?.content.single())
    }

    /// Replace the held reference. The previous target's inverse side drops
    /// this entity; if the new target already holds a conflicting
    /// single-reference commitment on the inverse side, that link is
    /// released first so no dangling half-link survives.
    pub fn set_single(
        &mut self,
        key: EntityKey,
        name: &str,
        target: Option<EntityKey>,
    ) -> Result<(), ObjectGraphError> {
        self.live(key)?;
        let rel = self.relation_for(key, name)?;
        if !rel.cardinality.is_single() {
            return Err(ObjectGraphError::invalid_input(format!(
                "'{name}' is not a single reference"
            )));
        }
        if let Some(t) = target {
            self.validate_target(&rel, t)?;
        }
        self.ensure_loaded(key, name)?;
        let old = self.assoc_ref(key, name)?.content.single();
        if old == target {
            return Ok(());
        }

        // Load every collection the apply phase will touch before mutating
        // anything, so a store failure cannot leave a half-applied link.
        let mut steal: Option<EntityKey> = None;
        if let Some(inv_name) = rel.inverse.clone() {
            if let Some(o) = old {
                self.ensure_loaded(o, &inv_name)?;
            }
            if let Some(t) = target {
                self.ensure_loaded(t, &inv_name)?;
                let inv = self.relation_of(&rel.target, &inv_name)?;
                if inv.cardinality.is_single() {
                    if let Some(holder) = self.assoc_ref(t, &inv_name)?.content.single() {
                        if holder != key {
                            self.ensure_loaded(holder, &rel.name)?;
                            steal = Some(holder);
                        }
                    }
                }
            }
        }

        if let Some(o) = old {
            self.apply_remove(key, name, o)?;
            if let Some(inv_name) = &rel.inverse {
                self.apply_remove(o, inv_name, key)?;
            }
        }
        if let Some(t) = target {
            if let Some(inv_name) = &rel.inverse {
                if let Some(holder) = steal {
                    self.apply_remove(holder, &rel.name, t)?;
                    self.apply_remove(t, inv_name, holder)?;
                }
                self.apply_insert(t, inv_name, key, None)?;
            }
            self.apply_insert(key, name, t, None)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ordered lists
    // ------------------------------------------------------------------

    /// Members of a list or set association. List order is preserved; set
    /// members come back sorted by key.
    pub fn members(
        &mut self,
        key: EntityKey,
        name: &str,
    ) -> Result<Vec<EntityKey>, ObjectGraphError> {
        let rel = self.relation_for(key, name)?;
        if rel.cardinality.is_single() {
            return Err(ObjectGraphError::invalid_input(format!(
                "'{name}' is a single reference; use single()"
            )));
        }
        self.ensure_loaded(key, name)?;
        Ok(self.assoc_ref(key, name)?.members())
    }

    pub fn append(
        &mut self,
        key: EntityKey,
        name: &str,
        target: EntityKey,
    ) -> Result<(), ObjectGraphError> {
        self.push_list(key, name, target, None)
    }

    pub fn insert_at(
        &mut self,
        key: EntityKey,
        name: &str,
        index: usize,
        target: EntityKey,
    ) -> Result<(), ObjectGraphError> {
        self.push_list(key, name, target, Some(index))
    }

    fn push_list(
        &mut self,
        key: EntityKey,
        name: &str,
        target: EntityKey,
        index: Option<usize>,
    ) -> Result<(), ObjectGraphError> {
        self.live(key)?;
        let rel = self.relation_for(key, name)?;
        let Cardinality::List { allow_duplicates } = rel.cardinality else {
            return Err(ObjectGraphError::invalid_input(format!(
                "'{name}' is not an ordered list"
            )));
        };
        self.validate_target(&rel, target)?;
        self.ensure_loaded(key, name)?;
        let assoc = self.assoc_ref(key, name)?;
        if !allow_duplicates && assoc.contains(target) {
            return Err(ObjectGraphError::invalid_input(format!(
                "'{name}' forbids duplicate members"
            )));
        }
        if let Some(index) = index {
            let len = assoc.members().len();
            if index > len {
                return Err(ObjectGraphError::invalid_input(format!(
                    "index {index} out of bounds for '{name}' of length {len}"
                )));
            }
        }
        self.link_into_many(key, &rel, target, index)
    }

    /// Remove one occurrence of `target` from an ordered list.
    pub fn remove_from(
        &mut self,
        key: EntityKey,
        name: &str,
        target: EntityKey,
    ) -> Result<(), ObjectGraphError> {
        self.live(key)?;
        let rel = self.relation_for(key, name)?;
        if !rel.cardinality.is_list() {
            return Err(ObjectGraphError::invalid_input(format!(
                "'{name}' is not an ordered list"
            )));
        }
        self.ensure_loaded(key, name)?;
        if !self.assoc_ref(key, name)?.contains(target) {
            return Err(ObjectGraphError::invalid_input(format!(
                "entity is not a member of '{name}'"
            )));
        }
        if let Some(inv_name) = rel.inverse.clone() {
            self.ensure_loaded(target, &inv_name)?;
        }
        self.apply_remove(key, name, target)?;
        // With duplicates, the pair stays linked until the last occurrence
        // is gone.
        let still_member = self.assoc_ref(key, name)?.contains(target);
        if !still_member {
            if let Some(inv_name) = &rel.inverse {
                self.apply_remove(target, inv_name, key)?;
            }
        }
        Ok(())
    }

    /// Reorder a list in place; `new_order` must be a permutation of the
    /// current membership.
    pub fn reorder(
        &mut self,
        key: EntityKey,
        name: &str,
        new_order: &[EntityKey],
    ) -> Result<(), ObjectGraphError> {
        self.live(key)?;
        let rel = self.relation_for(key, name)?;
        if !rel.cardinality.is_list() {
            return Err(ObjectGraphError::invalid_input(format!(
                "'{name}' is not an ordered list"
            )));
        }
        self.ensure_loaded(key, name)?;
        {
            let assoc = self.assoc_ref(key, name)?;
            if assoc.members() == new_order {
                return Ok(());
            }
        }
        let assoc = self.assoc_mut(key, name)?;
        assoc.content.reorder(new_order)?;
        self.tracker.mark_association(key, name);
        self.touch(key);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Unordered sets
    // ------------------------------------------------------------------

    /// Add to an unordered set. Adding a present member is a no-op and does
    /// not dirty the entity.
    pub fn add(
        &mut self,
        key: EntityKey,
        name: &str,
        target: EntityKey,
    ) -> Result<(), ObjectGraphError> {
        self.live(key)?;
        let rel = self.relation_for(key, name)?;
        if !rel.cardinality.is_set() {
            return Err(ObjectGraphError::invalid_input(format!(
                "'{name}' is not an unordered set"
            )));
        }
        self.validate_target(&rel, target)?;
        self.ensure_loaded(key, name)?;
        if self.assoc_ref(key, name)?.contains(target) {
            return Ok(());
        }
        self.link_into_many(key, &rel, target, None)
    }

    /// Discard from an unordered set. Discarding an absent member is a
    /// no-op and does not dirty the entity.
    pub fn discard(
        &mut self,
        key: EntityKey,
        name: &str,
        target: EntityKey,
    ) -> Result<(), ObjectGraphError> {
        self.live(key)?;
        let rel = self.relation_for(key, name)?;
        if !rel.cardinality.is_set() {
            return Err(ObjectGraphError::invalid_input(format!(
                "'{name}' is not an unordered set"
            )));
        }
        self.ensure_loaded(key, name)?;
        if !self.assoc_ref(key, name)?.contains(target) {
            return Ok(());
        }
        if let Some(inv_name) = rel.inverse.clone() {
            self.ensure_loaded(target, &inv_name)?;
        }
        self.apply_remove(key, name, target)?;
        if let Some(inv_name) = &rel.inverse {
            self.apply_remove(target, inv_name, key)?;
        }
        Ok(())
    }

    /// Drop a cached association and reload it from the store on next
    /// access. Staged membership changes for it are discarded.
    pub fn refresh(&mut self, key: EntityKey, name: &str) -> Result<(), ObjectGraphError> {
        let rel = self.relation_for(key, name)?;
        let ent = self.entity(key)?;
        if ent.node.is_none() {
            return Err(ObjectGraphError::invalid_input(
                "transient entities have nothing to refresh",
            ));
        }
        let assoc = self.assoc_mut(key, name)?;
        *assoc = Association::unloaded(rel.cardinality);
        self.tracker.unmark_association(key, name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn alloc_key(&mut self) -> EntityKey {
        self.next_key += 1;
        EntityKey(self.next_key)
    }

    pub(crate) fn entity(&self, key: EntityKey) -> Result<&EntityData, ObjectGraphError> {
        self.entities
            .get(&key)
            .ok_or_else(|| ObjectGraphError::detached(format!("{key} is not attached to this session")))
    }

    fn entity_mut(&mut self, key: EntityKey) -> Result<&mut EntityData, ObjectGraphError> {
        self.entities
            .get_mut(&key)
            .ok_or_else(|| ObjectGraphError::detached(format!("{key} is not attached to this session")))
    }

    fn live(&self, key: EntityKey) -> Result<&EntityData, ObjectGraphError> {
        let ent = self.entity(key)?;
        if ent.status == EntityStatus::Deleted {
            return Err(ObjectGraphError::detached(format!("{key} has been deleted")));
        }
        Ok(ent)
    }

    fn touch(&mut self, key: EntityKey) {
        if let Some(ent) = self.entities.get_mut(&key) {
            if ent.status == EntityStatus::Clean {
                ent.status = EntityStatus::Dirty;
            }
        }
    }

    fn relation_of(
        &self,
        label: &str,
        name: &str,
    ) -> Result<RelationSchema, ObjectGraphError> {
        let class = self.schema.class(label)?;
        class.relation(name).cloned().ok_or_else(|| {
            ObjectGraphError::invalid_input(format!(
                "class '{label}' declares no relationship '{name}'"
            ))
        })
    }

    fn relation_for(
        &self,
        key: EntityKey,
        name: &str,
    ) -> Result<RelationSchema, ObjectGraphError> {
        let label = self.entity(key)?.label.clone();
        self.relation_of(&label, name)
    }

    fn validate_target(
        &self,
        rel: &RelationSchema,
        target: EntityKey,
    ) -> Result<(), ObjectGraphError> {
        let ent = self.live(target)?;
        if ent.label != rel.target {
            return Err(ObjectGraphError::type_mismatch(format!(
                "relationship '{}' expects target class '{}', got '{}'",
                rel.name, rel.target, ent.label
            )));
        }
        Ok(())
    }

    fn assoc_ref(&self, key: EntityKey, name: &str) -> Result<&Association, ObjectGraphError> {
        let ent = self.entity(key)?;
        ent.associations.get(name).ok_or_else(|| {
            ObjectGraphError::invalid_input(format!(
                "class '{}' declares no relationship '{name}'",
                ent.label
            ))
        })
    }

    fn assoc_mut(
        &mut self,
        key: EntityKey,
        name: &str,
    ) -> Result<&mut Association, ObjectGraphError> {
        let ent = self
            .entities
            .get_mut(&key)
            .ok_or_else(|| ObjectGraphError::detached(format!("{key} is not attached to this session")))?;
        let label = ent.label.clone();
        ent.associations.get_mut(name).ok_or_else(|| {
            ObjectGraphError::invalid_input(format!(
                "class '{label}' declares no relationship '{name}'"
            ))
        })
    }

    /// Fetch a collection's members from the store on first access, then
    /// cache them until mutated or refreshed. The only suspension point in
    /// the mapping layer.
    fn ensure_loaded(&mut self, key: EntityKey, name: &str) -> Result<(), ObjectGraphError> {
        let rel = self.relation_for(key, name)?;
        let (node, loaded) = {
            let assoc = self.assoc_ref(key, name)?;
            (self.entity(key)?.node, assoc.loaded)
        };
        if loaded {
            return Ok(());
        }
        let Some(node) = node else {
            self.assoc_mut(key, name)?.loaded = true;
            return Ok(());
        };
        let direction = match rel.direction {
            Direction::Outgoing => FetchDirection::Outgoing,
            Direction::Incoming => FetchDirection::Incoming,
        };
        let pairs = self.backend.fetch_edges(node, &rel.edge_type, direction)?;
        let mut records = Vec::with_capacity(pairs.len());
        for (edge_id, other) in pairs {
            let target = self.resolve(other)?;
            let position = if rel.cardinality.is_list() {
                let edge = self.backend.fetch_edge(edge_id)?;
                edge.properties
                    .get(POSITION_PROP)
                    .and_then(PropertyValue::as_integer)
            } else {
                None
            };
            records.push(LinkRecord {
                target,
                edge: edge_id,
                position,
            });
        }
        if rel.cardinality.is_list() {
            records.sort_by_key(|r| (r.position.unwrap_or(i64::MAX), r.edge));
        }
        let content = match rel.cardinality {
            Cardinality::Single => {
                let distinct: AHashSet<EntityKey> = records.iter().map(|r| r.target).collect();
                if distinct.len() > 1 {
                    return Err(ObjectGraphError::invalid_input(format!(
                        "store holds conflicting edges for single reference '{name}'"
                    )));
                }
                AssocContent::Single(records.first().map(|r| r.target))
            }
            Cardinality::List { .. } => {
                AssocContent::List(records.iter().map(|r| r.target).collect())
            }
            Cardinality::Set => AssocContent::Set(records.iter().map(|r| r.target).collect()),
        };
        debug!(%key, name, members = records.len(), "hydrated association");
        let assoc = self.assoc_mut(key, name)?;
        assoc.content = content;
        assoc.baseline = records;
        assoc.loaded = true;
        Ok(())
    }

    /// Link `target` into a to-many collection, releasing a conflicting
    /// single-reference commitment on the inverse side first. All loads
    /// happen before the first mutation.
    fn link_into_many(
        &mut self,
        key: EntityKey,
        rel: &RelationSchema,
        target: EntityKey,
        index: Option<usize>,
    ) -> Result<(), ObjectGraphError> {
        let mut steal: Option<EntityKey> = None;
        if let Some(inv_name) = rel.inverse.clone() {
            self.ensure_loaded(target, &inv_name)?;
            let inv = self.relation_of(&rel.target, &inv_name)?;
            if inv.cardinality.is_single() {
                if let Some(holder) = self.assoc_ref(target, &inv_name)?.content.single() {
                    if holder != key {
                        self.ensure_loaded(holder, &rel.name)?;
                        steal = Some(holder);
                    }
                }
            }
            if let Some(holder) = steal {
                self.apply_remove(holder, &rel.name, target)?;
                self.apply_remove(target, &inv_name, holder)?;
            }
            self.apply_insert(target, &inv_name, key, None)?;
        }
        self.apply_insert(key, &rel.name, target, index)?;
        Ok(())
    }

    fn apply_insert(
        &mut self,
        key: EntityKey,
        name: &str,
        target: EntityKey,
        index: Option<usize>,
    ) -> Result<(), ObjectGraphError> {
        let assoc = self.assoc_mut(key, name)?;
        assoc.content.insert(target, index);
        self.tracker.mark_association(key, name);
        self.touch(key);
        Ok(())
    }

    fn apply_remove(
        &mut self,
        key: EntityKey,
        name: &str,
        target: EntityKey,
    ) -> Result<(), ObjectGraphError> {
        let assoc = self.assoc_mut(key, name)?;
        if assoc.content.remove(target) {
            self.tracker.mark_association(key, name);
            self.touch(key);
        }
        Ok(())
    }

    pub(crate) fn scan_label(&self, label: &str) -> Result<Vec<NodeId>, ObjectGraphError> {
        self.backend.nodes_with_label(label)
    }
}
