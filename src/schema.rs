//! Static per-class mapping metadata. All validation happens once, in
//! [`SchemaRegistry::build`]; runtime lookups are plain table reads and never
//! re-validate.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::{errors::ObjectGraphError, value::PropertyKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Shape of one side of an association. The to-many shape is an explicit
/// choice between `List` (insertion order is significant and persisted) and
/// `Set` (unordered, unique per entity); there is no default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    Single,
    List { allow_duplicates: bool },
    Set,
}

impl Cardinality {
    pub fn is_single(&self) -> bool {
        matches!(self, Cardinality::Single)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Cardinality::List { .. })
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Cardinality::Set)
    }
}

#[derive(Clone, Debug)]
pub struct PropertySpec {
    pub name: String,
    pub kind: PropertyKind,
}

#[derive(Clone, Debug)]
pub struct RelationSpec {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub direction: Direction,
    pub inverse: Option<String>,
}

/// Declaration input for one application class, built with the chaining
/// constructors and handed to [`SchemaRegistry::build`].
#[derive(Clone, Debug, Default)]
pub struct ClassSpec {
    pub label: String,
    pub properties: Vec<PropertySpec>,
    pub relations: Vec<RelationSpec>,
}

impl ClassSpec {
    pub fn new<T: Into<String>>(label: T) -> Self {
        Self {
            label: label.into(),
            properties: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn property<T: Into<String>>(mut self, name: T, kind: PropertyKind) -> Self {
        self.properties.push(PropertySpec {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn relation<T: Into<String>, U: Into<String>>(
        mut self,
        name: T,
        target: U,
        cardinality: Cardinality,
        direction: Direction,
        inverse: Option<&str>,
    ) -> Self {
        self.relations.push(RelationSpec {
            name: name.into(),
            target: target.into(),
            cardinality,
            direction,
            inverse: inverse.map(str::to_string),
        });
        self
    }
}

/// Resolved relation metadata. `edge_type` is the name the relationship is
/// persisted under: the `Outgoing` side's name for a bidirectional pair, the
/// relation's own name otherwise. `owning` marks the side whose diffs the
/// sync engine realizes as store edges.
#[derive(Clone, Debug)]
pub struct RelationSchema {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub direction: Direction,
    pub inverse: Option<String>,
    pub edge_type: String,
    pub owning: bool,
}

#[derive(Debug)]
pub struct ClassSchema {
    label: String,
    properties: AHashMap<String, PropertyKind>,
    relations: AHashMap<String, RelationSchema>,
}

impl ClassSchema {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn property_kind(&self, name: &str) -> Option<PropertyKind> {
        self.properties.get(name).copied()
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.get(name)
    }

    pub fn property_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn relation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.relations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug)]
pub struct SchemaRegistry {
    classes: AHashMap<String, ClassSchema>,
}

impl SchemaRegistry {
    /// Validates the declarations and builds the registry. Fails with
    /// `Schema` on duplicate labels, attribute name collisions, unknown
    /// target labels, dangling or asymmetric inverse declarations,
    /// non-mirrored directions, and incompatible cardinality pairings.
    pub fn build(specs: Vec<ClassSpec>) -> Result<Self, ObjectGraphError> {
        let mut declared: AHashMap<String, ClassSpec> = AHashMap::new();
        for spec in specs {
            if spec.label.trim().is_empty() {
                return Err(ObjectGraphError::schema("class label must be set"));
            }
            if declared.contains_key(&spec.label) {
                return Err(ObjectGraphError::schema(format!(
                    "duplicate class label '{}'",
                    spec.label
                )));
            }
            validate_attribute_names(&spec)?;
            declared.insert(spec.label.clone(), spec);
        }

        for spec in declared.values() {
            for relation in &spec.relations {
                validate_relation(spec, relation, &declared)?;
            }
        }

        let mut classes = AHashMap::new();
        for (label, spec) in &declared {
            let mut properties = AHashMap::new();
            for prop in &spec.properties {
                properties.insert(prop.name.clone(), prop.kind);
            }
            let mut relations = AHashMap::new();
            for relation in &spec.relations {
                relations.insert(relation.name.clone(), resolve_relation(relation));
            }
            classes.insert(
                label.clone(),
                ClassSchema {
                    label: label.clone(),
                    properties,
                    relations,
                },
            );
        }
        Ok(Self { classes })
    }

    pub fn class(&self, label: &str) -> Result<&ClassSchema, ObjectGraphError> {
        self.classes
            .get(label)
            .ok_or_else(|| ObjectGraphError::schema(format!("unknown class label '{label}'")))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.classes.contains_key(label)
    }

    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

fn validate_attribute_names(spec: &ClassSpec) -> Result<(), ObjectGraphError> {
    let mut seen = AHashSet::new();
    for prop in &spec.properties {
        if prop.name.trim().is_empty() {
            return Err(ObjectGraphError::schema(format!(
                "class '{}' declares an unnamed property",
                spec.label
            )));
        }
        if !seen.insert(prop.name.as_str()) {
            return Err(ObjectGraphError::schema(format!(
                "class '{}' declares attribute '{}' more than once",
                spec.label, prop.name
            )));
        }
    }
    for relation in &spec.relations {
        if relation.name.trim().is_empty() {
            return Err(ObjectGraphError::schema(format!(
                "class '{}' declares an unnamed relationship",
                spec.label
            )));
        }
        if !seen.insert(relation.name.as_str()) {
            return Err(ObjectGraphError::schema(format!(
                "class '{}' declares attribute '{}' more than once",
                spec.label, relation.name
            )));
        }
    }
    Ok(())
}

fn validate_relation(
    spec: &ClassSpec,
    relation: &RelationSpec,
    declared: &AHashMap<String, ClassSpec>,
) -> Result<(), ObjectGraphError> {
    let target = declared.get(&relation.target).ok_or_else(|| {
        ObjectGraphError::schema(format!(
            "relationship '{}.{}' targets unknown class '{}'",
            spec.label, relation.name, relation.target
        ))
    })?;

    let Some(inverse_name) = &relation.inverse else {
        return Ok(());
    };

    if relation.target == spec.label && inverse_name == &relation.name {
        return Err(ObjectGraphError::schema(format!(
            "relationship '{}.{}' cannot be its own inverse",
            spec.label, relation.name
        )));
    }

    let inverse = target
        .relations
        .iter()
        .find(|r| &r.name == inverse_name)
        .ok_or_else(|| {
            ObjectGraphError::schema(format!(
                "relationship '{}.{}' names inverse '{}.{}', which does not exist",
                spec.label, relation.name, relation.target, inverse_name
            ))
        })?;

    if inverse.target != spec.label {
        return Err(ObjectGraphError::schema(format!(
            "inverse '{}.{}' targets '{}', expected '{}'",
            relation.target, inverse_name, inverse.target, spec.label
        )));
    }
    if inverse.inverse.as_deref() != Some(relation.name.as_str()) {
        return Err(ObjectGraphError::schema(format!(
            "inverse '{}.{}' does not point back to '{}.{}'",
            relation.target, inverse_name, spec.label, relation.name
        )));
    }
    if inverse.direction == relation.direction {
        return Err(ObjectGraphError::schema(format!(
            "relationship '{}.{}' and its inverse must declare mirrored directions",
            spec.label, relation.name
        )));
    }
    // Positions live on the owning side's edges; a non-owning list could
    // never persist its order.
    if relation.cardinality.is_list() && relation.direction == Direction::Incoming {
        return Err(ObjectGraphError::schema(format!(
            "ordered list '{}.{}' must be the outgoing side of its pair",
            spec.label, relation.name
        )));
    }
    if !compatible_cardinalities(relation.cardinality, inverse.cardinality) {
        return Err(ObjectGraphError::schema(format!(
            "relationship '{}.{}' ({:?}) is incompatible with inverse '{}.{}' ({:?})",
            spec.label,
            relation.name,
            relation.cardinality,
            relation.target,
            inverse_name,
            inverse.cardinality
        )));
    }
    Ok(())
}

/// A `List` side must face a `Single` inverse: ordered many-to-many is not
/// expressible. `Set` pairs with `Single` or `Set`.
fn compatible_cardinalities(a: Cardinality, b: Cardinality) -> bool {
    match (a, b) {
        (Cardinality::Single, _) | (_, Cardinality::Single) => true,
        (Cardinality::Set, Cardinality::Set) => true,
        _ => false,
    }
}

fn resolve_relation(relation: &RelationSpec) -> RelationSchema {
    let owning = relation.inverse.is_none() || relation.direction == Direction::Outgoing;
    let edge_type = match (&relation.inverse, relation.direction) {
        (Some(inverse), Direction::Incoming) => inverse.clone(),
        _ => relation.name.clone(),
    };
    RelationSchema {
        name: relation.name.clone(),
        target: relation.target.clone(),
        cardinality: relation.cardinality,
        direction: relation.direction,
        inverse: relation.inverse.clone(),
        edge_type,
        owning,
    }
}
