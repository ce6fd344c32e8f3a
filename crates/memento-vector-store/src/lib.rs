//! Vector store abstraction and adapters for the Memento knowledge-graph
//! sync engine (spec §6 "Vector Store contract").

pub mod memory;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod trait_def;
pub mod types;

pub use memory::InMemoryVectorStore;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
pub use trait_def::VectorStore;
pub use types::{FieldMatch, PointFilter, ScoredPoint, VectorPoint};
