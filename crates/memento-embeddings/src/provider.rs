//! Embedding Provider contract (spec §6).

use async_trait::async_trait;
use memento_core::Result;

/// A single `embed()` call's result.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,
    pub tokens: Option<u32>,
    pub cost: Option<f64>,
}

/// One input to [`EmbeddingProvider::embed_batch`].
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub content: String,
    pub entity_id: String,
}

/// One output of [`EmbeddingProvider::embed_batch`], keyed back to the
/// input's `entity_id`.
#[derive(Debug, Clone)]
pub struct BatchResultItem {
    pub entity_id: String,
    pub embedding: Vec<f32>,
}

/// Aggregate result of a batch call.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub results: Vec<BatchResultItem>,
    pub total_tokens: u32,
    pub total_cost: f64,
}

/// `embed(text) -> {embedding, tokens?, cost?}` and
/// `embedBatch([{content, entityId}]) -> {results[], totalTokens, totalCost}`
/// (spec §6). Determinism per content is explicitly not required.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimension of vectors this provider returns.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<EmbeddingResult>;

    async fn embed_batch(&self, inputs: Vec<BatchInput>) -> Result<BatchResult>;
}
