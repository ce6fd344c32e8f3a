//! Embedding provider trait, deterministic mock provider, and the embedding
//! dispatcher (spec §4.4, §6).

pub mod dispatcher;
pub mod mock;
pub mod provider;

pub use dispatcher::{
    EmbeddingDispatcher, EmbeddingOutcome, EmbeddingTarget, CODE_COLLECTION,
    DEFAULT_DIMENSION, DOCUMENTATION_COLLECTION,
};
pub use mock::MockEmbeddingProvider;
pub use provider::{BatchInput, BatchResult, BatchResultItem, EmbeddingProvider, EmbeddingResult};
