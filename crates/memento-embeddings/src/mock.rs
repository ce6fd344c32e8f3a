//! Deterministic mock embedding provider, used by this workspace's tests and
//! as a development fallback (grounded on
//! `dashflow::core::embeddings::MockEmbeddings`).

use crate::provider::{BatchInput, BatchResult, BatchResultItem, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use memento_core::Result;

/// Produces a deterministic vector from the hash of its input text, so the
/// same content always embeds to the same point without calling out to a
/// real model.
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl MockEmbeddingProvider {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn deterministic_vector(&self, text: &str) -> Vec<f32> {
        let mut seed: u64 = 1469598103934665603; // FNV offset basis
        for byte in text.bytes() {
            seed ^= u64::from(byte);
            seed = seed.wrapping_mul(1099511628211); // FNV prime
        }
        (0..self.dimension)
            .map(|i| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(i as u64);
                ((seed >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingResult> {
        Ok(EmbeddingResult {
            embedding: self.deterministic_vector(text),
            tokens: Some((text.split_whitespace().count()) as u32),
            cost: Some(0.0),
        })
    }

    async fn embed_batch(&self, inputs: Vec<BatchInput>) -> Result<BatchResult> {
        let mut total_tokens = 0u32;
        let results = inputs
            .into_iter()
            .map(|input| {
                total_tokens += input.content.split_whitespace().count() as u32;
                BatchResultItem {
                    embedding: self.deterministic_vector(&input.content),
                    entity_id: input.entity_id,
                }
            })
            .collect();
        Ok(BatchResult {
            results,
            total_tokens,
            total_cost: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_embeds_to_same_vector() {
        let provider = MockEmbeddingProvider::new(8);
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("hello world").await.unwrap();
        assert_eq!(a.embedding, b.embedding);
    }

    #[tokio::test]
    async fn different_text_embeds_differently() {
        let provider = MockEmbeddingProvider::new(8);
        let a = provider.embed("hello").await.unwrap();
        let b = provider.embed("goodbye").await.unwrap();
        assert_ne!(a.embedding, b.embedding);
    }

    #[tokio::test]
    async fn vectors_match_configured_dimension() {
        let provider = MockEmbeddingProvider::new(1536);
        let result = provider.embed("x").await.unwrap();
        assert_eq!(result.embedding.len(), 1536);
    }

    #[tokio::test]
    async fn batch_preserves_entity_ids() {
        let provider = MockEmbeddingProvider::new(4);
        let batch = provider
            .embed_batch(vec![
                BatchInput {
                    content: "a".into(),
                    entity_id: "e1".into(),
                },
                BatchInput {
                    content: "b".into(),
                    entity_id: "e2".into(),
                },
            ])
            .await
            .unwrap();
        assert_eq!(batch.results.len(), 2);
        assert_eq!(batch.results[0].entity_id, "e1");
        assert_eq!(batch.results[1].entity_id, "e2");
    }
}
