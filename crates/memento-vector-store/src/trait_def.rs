//! Generic interface for the named-collection vector store (spec §6
//! "Vector Store contract").

use crate::types::{PointFilter, ScoredPoint, VectorPoint};
use async_trait::async_trait;
use memento_core::Result;

/// Abstract vector store. Every method is scoped to a single named
/// collection; the only two collections this workspace uses are
/// `documentation_embeddings` and `code_embeddings` (spec §4.4 "Collection
/// routing").
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ensure a collection exists with the given vector dimension. Idempotent.
    async fn ensure_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    /// Upsert a batch of points into `collection`.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()>;

    /// Nearest-neighbor search, optionally restricted by `filter`.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<PointFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    /// Delete every point matching `filter` (spec §4.4 "Deletion ... by
    /// payload filter `entityId = X`"). Idempotent: deleting a non-existent
    /// point is not an error.
    async fn delete_by_filter(&self, collection: &str, filter: PointFilter) -> Result<usize>;
}
