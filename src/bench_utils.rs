//! Seeded dataset generation shared by the Criterion benchmarks.

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    errors::ObjectGraphError,
    schema::{Cardinality, ClassSpec, Direction, SchemaRegistry},
    value::PropertyKind,
};

/// Person/Movie schema used by the commit benchmarks.
pub fn media_schema() -> Result<SchemaRegistry, ObjectGraphError> {
    SchemaRegistry::build(vec![
        ClassSpec::new("Person")
            .property("name", PropertyKind::Text)
            .relation(
                "directed",
                "Movie",
                Cardinality::Set,
                Direction::Incoming,
                Some("director"),
            ),
        ClassSpec::new("Movie")
            .property("title", PropertyKind::Text)
            .property("year", PropertyKind::Number)
            .property("rating", PropertyKind::Number)
            .relation(
                "director",
                "Person",
                Cardinality::Single,
                Direction::Outgoing,
                Some("directed"),
            ),
    ])
}

#[derive(Clone, Debug)]
pub struct MovieRow {
    pub title: String,
    pub year: i64,
    pub rating: f64,
}

pub fn generate_movies(count: usize, seed: u64) -> Vec<MovieRow> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| MovieRow {
            title: format!("movie-{i}"),
            year: rng.gen_range(1950..2026),
            rating: rng.gen_range(0.0..10.0),
        })
        .collect()
}
