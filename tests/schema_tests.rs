use objectgraph::{
    Cardinality, ClassSpec, Direction, ObjectGraphError, PropertyKind, SchemaRegistry,
};

fn series_spec() -> ClassSpec {
    ClassSpec::new("Series")
        .property("title", PropertyKind::Text)
        .relation(
            "episodes",
            "Episode",
            Cardinality::List {
                allow_duplicates: false,
            },
            Direction::Outgoing,
            Some("series"),
        )
}

fn episode_spec() -> ClassSpec {
    ClassSpec::new("Episode")
        .property("number", PropertyKind::Number)
        .property("title", PropertyKind::Text)
        .relation(
            "series",
            "Series",
            Cardinality::Single,
            Direction::Incoming,
            Some("episodes"),
        )
}

#[test]
fn test_build_valid_schema() {
    let registry = SchemaRegistry::build(vec![series_spec(), episode_spec()]).expect("schema");
    assert!(registry.contains("Series"));
    assert!(registry.contains("Episode"));
    assert_eq!(registry.labels(), vec!["Episode", "Series"]);
}

#[test]
fn test_duplicate_label_rejected() {
    let err = SchemaRegistry::build(vec![
        ClassSpec::new("Series"),
        ClassSpec::new("Series"),
    ])
    .expect_err("duplicate");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}

#[test]
fn test_attribute_name_collision_rejected() {
    let spec = ClassSpec::new("Series")
        .property("episodes", PropertyKind::Number)
        .relation(
            "episodes",
            "Series",
            Cardinality::Set,
            Direction::Outgoing,
            None,
        );
    let err = SchemaRegistry::build(vec![spec]).expect_err("collision");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}

#[test]
fn test_unknown_target_rejected() {
    let spec = ClassSpec::new("Series").relation(
        "episodes",
        "Episode",
        Cardinality::Set,
        Direction::Outgoing,
        None,
    );
    let err = SchemaRegistry::build(vec![spec]).expect_err("unknown target");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}

#[test]
fn test_dangling_inverse_rejected() {
    let series = ClassSpec::new("Series").relation(
        "episodes",
        "Episode",
        Cardinality::List {
            allow_duplicates: false,
        },
        Direction::Outgoing,
        Some("missing"),
    );
    let err =
        SchemaRegistry::build(vec![series, ClassSpec::new("Episode")]).expect_err("dangling");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}

#[test]
fn test_inverse_must_point_back() {
    let series = series_spec();
    // Episode.series points at Series but names a different inverse.
    let episode = ClassSpec::new("Episode").relation(
        "series",
        "Series",
        Cardinality::Single,
        Direction::Incoming,
        Some("seasons"),
    );
    let err = SchemaRegistry::build(vec![series, episode]).expect_err("asymmetric");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}

#[test]
fn test_unmirrored_direction_rejected() {
    let series = series_spec();
    let episode = ClassSpec::new("Episode").relation(
        "series",
        "Series",
        Cardinality::Single,
        Direction::Outgoing,
        Some("episodes"),
    );
    let err = SchemaRegistry::build(vec![series, episode]).expect_err("direction");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}

#[test]
fn test_list_facing_list_rejected() {
    let a = ClassSpec::new("A").relation(
        "bs",
        "B",
        Cardinality::List {
            allow_duplicates: false,
        },
        Direction::Outgoing,
        Some("as"),
    );
    let b = ClassSpec::new("B").relation(
        "as",
        "A",
        Cardinality::List {
            allow_duplicates: false,
        },
        Direction::Incoming,
        Some("bs"),
    );
    let err = SchemaRegistry::build(vec![a, b]).expect_err("list pairing");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}

#[test]
fn test_incoming_list_rejected() {
    // Order is persisted on the owning side; a list must be outgoing.
    let a = ClassSpec::new("A").relation(
        "b",
        "B",
        Cardinality::Single,
        Direction::Outgoing,
        Some("as"),
    );
    let b = ClassSpec::new("B").relation(
        "as",
        "A",
        Cardinality::List {
            allow_duplicates: false,
        },
        Direction::Incoming,
        Some("b"),
    );
    let err = SchemaRegistry::build(vec![a, b]).expect_err("incoming list");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}

#[test]
fn test_self_inverse_rejected() {
    let person = ClassSpec::new("Person").relation(
        "spouse",
        "Person",
        Cardinality::Single,
        Direction::Outgoing,
        Some("spouse"),
    );
    let err = SchemaRegistry::build(vec![person]).expect_err("self inverse");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}

#[test]
fn test_edge_type_resolves_to_outgoing_name() {
    let registry = SchemaRegistry::build(vec![series_spec(), episode_spec()]).expect("schema");
    let series = registry.class("Series").expect("class");
    let episodes = series.relation("episodes").expect("relation");
    assert_eq!(episodes.edge_type, "episodes");
    assert!(episodes.owning);

    let episode = registry.class("Episode").expect("class");
    let inverse = episode.relation("series").expect("relation");
    assert_eq!(inverse.edge_type, "episodes");
    assert!(!inverse.owning);
}

#[test]
fn test_unidirectional_relation_owns_itself() {
    let registry = SchemaRegistry::build(vec![
        ClassSpec::new("Note").relation(
            "mentions",
            "Note",
            Cardinality::Set,
            Direction::Outgoing,
            None,
        ),
    ])
    .expect("schema");
    let note = registry.class("Note").expect("class");
    let mentions = note.relation("mentions").expect("relation");
    assert_eq!(mentions.edge_type, "mentions");
    assert!(mentions.owning);
}

#[test]
fn test_unknown_class_lookup_fails() {
    let registry = SchemaRegistry::build(vec![ClassSpec::new("Series")]).expect("schema");
    let err = registry.class("Movie").expect_err("unknown");
    assert!(matches!(err, ObjectGraphError::Schema(_)));
}
