use std::sync::Arc;

use objectgraph::{
    Cardinality, ClassSpec, Direction, MemoryGraph, ObjectGraphError, PropertyKind,
    SchemaRegistry, Session,
};

fn media_registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::build(vec![
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
            ),
        ClassSpec::new("Episode")
            .property("title", PropertyKind::Text)
            .relation(
                "series",
                "Series",
                Cardinality::Single,
                Direction::Incoming,
                Some("episodes"),
            )
            .relation(
                "guests",
                "Person",
                Cardinality::Set,
                Direction::Outgoing,
                Some("appearances"),
            ),
        ClassSpec::new("Person")
            .property("name", PropertyKind::Text)
            .relation(
                "appearances",
                "Episode",
                Cardinality::Set,
                Direction::Incoming,
                Some("guests"),
            )
            .relation(
                "profile",
                "Profile",
                Cardinality::Single,
                Direction::Outgoing,
                Some("owner"),
            ),
        ClassSpec::new("Profile")
            .property("bio", PropertyKind::Text)
            .relation(
                "owner",
                "Person",
                Cardinality::Single,
                Direction::Incoming,
                Some("profile"),
            ),
    ])
    .expect("schema");
    Arc::new(registry)
}

#[test]
fn test_link_mirrors_inverse_side_without_commit() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let series = session.create("Series").expect("create");
    let episode = session.create("Episode").expect("create");

    session.append(series, "episodes", episode).expect("link");

    assert_eq!(
        session.single(episode, "series").expect("inverse"),
        Some(series)
    );
}

#[test]
fn test_single_set_mirrors_list_side() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let series = session.create("Series").expect("create");
    let episode = session.create("Episode").expect("create");

    session
        .set_single(episode, "series", Some(series))
        .expect("link");

    assert_eq!(
        session.members(series, "episodes").expect("mirror"),
        vec![episode]
    );
}

#[test]
fn test_unlinking_single_clears_list_side() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let series = session.create("Series").expect("create");
    let episode = session.create("Episode").expect("create");
    session.append(series, "episodes", episode).expect("link");

    session.set_single(episode, "series", None).expect("unlink");

    assert!(session.members(series, "episodes").expect("mirror").is_empty());
    assert_eq!(session.single(episode, "series").expect("single"), None);
}

#[test]
fn test_single_reference_steal_leaves_no_half_link() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let first = session.create("Person").expect("create");
    let second = session.create("Person").expect("create");
    let profile = session.create("Profile").expect("create");

    session
        .set_single(first, "profile", Some(profile))
        .expect("link");
    session
        .set_single(second, "profile", Some(profile))
        .expect("steal");

    assert_eq!(session.single(first, "profile").expect("old side"), None);
    assert_eq!(
        session.single(second, "profile").expect("new side"),
        Some(profile)
    );
    assert_eq!(
        session.single(profile, "owner").expect("inverse"),
        Some(second)
    );
}

#[test]
fn test_appending_elsewhere_moves_the_episode() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let original = session.create("Series").expect("create");
    let other = session.create("Series").expect("create");
    let episode = session.create("Episode").expect("create");

    session.append(original, "episodes", episode).expect("link");
    session.append(other, "episodes", episode).expect("move");

    assert!(session.members(original, "episodes").expect("old").is_empty());
    assert_eq!(session.members(other, "episodes").expect("new"), vec![episode]);
    assert_eq!(
        session.single(episode, "series").expect("inverse"),
        Some(other)
    );
}

#[test]
fn test_set_add_is_idempotent() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let episode = session.create("Episode").expect("create");
    let guest = session.create("Person").expect("create");
    session.add(episode, "guests", guest).expect("add");
    session.commit().expect("commit");
    assert!(!session.is_dirty(episode));

    session.add(episode, "guests", guest).expect("re-add");

    assert!(!session.is_dirty(episode));
    assert!(!session.is_dirty(guest));
    assert_eq!(session.members(episode, "guests").expect("members").len(), 1);
}

#[test]
fn test_set_discard_absent_is_noop() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let episode = session.create("Episode").expect("create");
    let guest = session.create("Person").expect("create");
    session.commit().expect("commit");

    session.discard(episode, "guests", guest).expect("discard");

    assert!(!session.is_dirty(episode));
    assert!(!session.is_dirty(guest));
}

#[test]
fn test_set_members_mirror_both_sides() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let episode = session.create("Episode").expect("create");
    let guest = session.create("Person").expect("create");

    session.add(episode, "guests", guest).expect("add");
    assert_eq!(
        session.members(guest, "appearances").expect("inverse"),
        vec![episode]
    );

    session.discard(episode, "guests", guest).expect("discard");
    assert!(session.members(guest, "appearances").expect("inverse").is_empty());
}

#[test]
fn test_linking_wrong_class_fails_fast() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let series = session.create("Series").expect("create");
    let person = session.create("Person").expect("create");

    let err = session
        .append(series, "episodes", person)
        .expect_err("mismatch");
    assert!(matches!(err, ObjectGraphError::TypeMismatch(_)));
    // Fail fast: nothing was linked on either side.
    assert!(session.members(series, "episodes").expect("members").is_empty());
}

#[test]
fn test_list_insert_remove_and_reorder() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let series = session.create("Series").expect("create");
    let a = session.create("Episode").expect("create");
    let b = session.create("Episode").expect("create");
    let c = session.create("Episode").expect("create");

    session.append(series, "episodes", a).expect("append");
    session.append(series, "episodes", b).expect("append");
    session.insert_at(series, "episodes", 1, c).expect("insert");
    assert_eq!(
        session.members(series, "episodes").expect("members"),
        vec![a, c, b]
    );

    session.remove_from(series, "episodes", b).expect("remove");
    assert_eq!(
        session.members(series, "episodes").expect("members"),
        vec![a, c]
    );

    session.reorder(series, "episodes", &[c, a]).expect("reorder");
    assert_eq!(
        session.members(series, "episodes").expect("members"),
        vec![c, a]
    );
}

#[test]
fn test_reorder_requires_permutation() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let series = session.create("Series").expect("create");
    let a = session.create("Episode").expect("create");
    let b = session.create("Episode").expect("create");
    session.append(series, "episodes", a).expect("append");

    let err = session
        .reorder(series, "episodes", &[a, b])
        .expect_err("not a permutation");
    assert!(matches!(err, ObjectGraphError::InvalidInput(_)));
}

#[test]
fn test_insert_at_rejects_out_of_bounds_index() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let series = session.create("Series").expect("create");
    let a = session.create("Episode").expect("create");

    let err = session
        .insert_at(series, "episodes", 3, a)
        .expect_err("bounds");
    assert!(matches!(err, ObjectGraphError::InvalidInput(_)));
}

#[test]
fn test_list_duplicates_rejected_when_not_declared() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let series = session.create("Series").expect("create");
    let a = session.create("Episode").expect("create");
    session.append(series, "episodes", a).expect("append");

    let err = session.append(series, "episodes", a).expect_err("duplicate");
    assert!(matches!(err, ObjectGraphError::InvalidInput(_)));
}

#[test]
fn test_list_duplicates_allowed_when_declared() {
    let registry = SchemaRegistry::build(vec![
        ClassSpec::new("Playlist").relation(
            "tracks",
            "Track",
            Cardinality::List {
                allow_duplicates: true,
            },
            Direction::Outgoing,
            None,
        ),
        ClassSpec::new("Track").property("title", PropertyKind::Text),
    ])
    .expect("schema");
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, Arc::new(registry));
    let playlist = session.create("Playlist").expect("create");
    let track = session.create("Track").expect("create");

    session.append(playlist, "tracks", track).expect("append");
    session.append(playlist, "tracks", track).expect("again");
    assert_eq!(
        session.members(playlist, "tracks").expect("members"),
        vec![track, track]
    );

    session.remove_from(playlist, "tracks", track).expect("remove");
    assert_eq!(
        session.members(playlist, "tracks").expect("members"),
        vec![track]
    );
}

#[test]
fn test_set_single_same_value_does_not_dirty() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let person = session.create("Person").expect("create");
    let profile = session.create("Profile").expect("create");
    session
        .set_single(person, "profile", Some(profile))
        .expect("link");
    session.commit().expect("commit");

    session
        .set_single(person, "profile", Some(profile))
        .expect("same value");
    assert!(!session.is_dirty(person));
    assert!(!session.is_dirty(profile));
}

#[test]
fn test_undeclared_relationship_rejected() {
    let graph = MemoryGraph::new();
    let mut session = Session::open(&graph, media_registry());
    let series = session.create("Series").expect("create");
    let episode = session.create("Episode").expect("create");

    let err = session
        .append(series, "chapters", episode)
        .expect_err("undeclared");
    assert!(matches!(err, ObjectGraphError::InvalidInput(_)));
}
