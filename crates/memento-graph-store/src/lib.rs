//! Graph store abstraction and adapters for the Memento knowledge-graph
//! sync engine (spec §6 "Graph Store contract").

pub mod memory;
#[cfg(feature = "neo4j")]
pub mod neo4j;
pub mod trait_def;
pub mod types;

pub use memory::InMemoryGraphStore;
#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jStore;
pub use trait_def::GraphStore;
pub use types::{
    IndexStatus, IndexTarget, NodeSearchPredicate, PathPredicate, QueryParams, RelUpsertRow,
    RelationshipFilter,
};
