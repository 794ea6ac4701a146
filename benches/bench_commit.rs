use std::{sync::Arc, time::Duration};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use objectgraph::{
    MemoryGraph, Session,
    bench_utils::{MovieRow, generate_movies, media_schema},
};

const MOVIE_SEED: u64 = 0xD471;
const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);

fn bench_scales() -> &'static [usize] {
    #[cfg(feature = "bench-ci")]
    {
        &[100, 500]
    }
    #[cfg(not(feature = "bench-ci"))]
    {
        &[1_000, 5_000, 10_000]
    }
}

fn stage_movies(session: &mut Session<&MemoryGraph>, rows: &[MovieRow]) {
    for row in rows {
        let movie = session.create("Movie").expect("create");
        session
            .set_property(movie, "title", row.title.as_str())
            .expect("title");
        session.set_property(movie, "year", row.year).expect("year");
        session
            .set_property(movie, "rating", row.rating)
            .expect("rating");
    }
}

fn bench_commit_fresh_entities(c: &mut Criterion) {
    let schema = Arc::new(media_schema().expect("schema"));
    let mut group = c.benchmark_group("commit_fresh_entities");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &count in bench_scales() {
        let rows = generate_movies(count, MOVIE_SEED + count as u64);
        group.bench_with_input(BenchmarkId::from_parameter(count), &rows, |b, rows| {
            b.iter(|| {
                let graph = MemoryGraph::new();
                let mut session = Session::open(&graph, schema.clone());
                stage_movies(&mut session, rows);
                session.commit().expect("commit");
            });
        });
    }
    group.finish();
}

fn bench_commit_linked_entities(c: &mut Criterion) {
    let schema = Arc::new(media_schema().expect("schema"));
    let mut group = c.benchmark_group("commit_linked_entities");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &count in bench_scales() {
        let rows = generate_movies(count, MOVIE_SEED + count as u64);
        group.bench_with_input(BenchmarkId::from_parameter(count), &rows, |b, rows| {
            b.iter(|| {
                let graph = MemoryGraph::new();
                let mut session = Session::open(&graph, schema.clone());
                let director = session.create("Person").expect("create");
                session
                    .set_property(director, "name", "prolific")
                    .expect("name");
                for row in rows {
                    let movie = session.create("Movie").expect("create");
                    session
                        .set_property(movie, "title", row.title.as_str())
                        .expect("title");
                    session
                        .set_single(movie, "director", Some(director))
                        .expect("link");
                }
                session.commit().expect("commit");
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_commit_fresh_entities,
    bench_commit_linked_entities
);
criterion_main!(benches);
