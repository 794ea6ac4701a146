//! Object-graph mapping primitives: sessions map plain entities onto nodes
//! and relationships of a property graph, in memory by default or against
//! any store implementing the backend contract.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod backend;
pub mod bench_utils;
pub mod collections;
pub mod entity;
pub mod errors;
pub mod graph;
pub mod identity;
pub mod query;
pub mod schema;
pub mod session;
pub mod sync;
pub mod tracker;
pub mod value;

pub use crate::backend::{
    EdgeId, EdgeRecord, EdgeSpec, FetchDirection, GraphBackend, NodeId, NodeRecord, NodeSpec,
};
pub use crate::entity::{DirtyRecord, EntityKey, EntityStatus};
pub use crate::errors::ObjectGraphError;
pub use crate::graph::{CascadePolicy, MemoryGraph};
pub use crate::query::FindQuery;
pub use crate::schema::{Cardinality, ClassSpec, Direction, SchemaRegistry};
pub use crate::session::Session;
pub use crate::sync::CommitStats;
pub use crate::value::{PropertyKind, PropertyMap, PropertyValue};
