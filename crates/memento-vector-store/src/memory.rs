//! DashMap-backed [`VectorStore`] used by this workspace's tests.

use crate::trait_def::VectorStore;
use crate::types::{PointFilter, ScoredPoint, VectorPoint};
use async_trait::async_trait;
use dashmap::DashMap;
use memento_core::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn matches(filter: &PointFilter, payload: &HashMap<String, serde_json::Value>) -> bool {
    filter
        .must
        .iter()
        .all(|cond| payload.get(&cond.key) == Some(&cond.value))
}

#[derive(Debug, Default)]
struct Collection {
    points: HashMap<u64, VectorPoint>,
}

/// In-memory vector store. Search does an exhaustive cosine-similarity scan;
/// fine for the scale of this workspace's own tests.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: DashMap<String, RwLock<Collection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, collection: &str, _dimension: usize) -> Result<()> {
        self.collections
            .entry(collection.to_string())
            .or_insert_with(|| RwLock::new(Collection::default()));
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        let entry = self
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| RwLock::new(Collection::default()));
        let mut guard = entry.write();
        for p in points {
            guard.points.insert(p.id, p);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<PointFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let Some(coll) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let guard = coll.read();
        let mut scored: Vec<ScoredPoint> = guard
            .points
            .values()
            .filter(|p| filter.as_ref().map_or(true, |f| matches(f, &p.payload)))
            .map(|p| ScoredPoint {
                id: p.id,
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete_by_filter(&self, collection: &str, filter: PointFilter) -> Result<usize> {
        let Some(coll) = self.collections.get(collection) else {
            return Ok(0);
        };
        let mut guard = coll.write();
        let to_remove: Vec<u64> = guard
            .points
            .values()
            .filter(|p| matches(&filter, &p.payload))
            .map(|p| p.id)
            .collect();
        for id in &to_remove {
            guard.points.remove(id);
        }
        Ok(to_remove.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: u64, entity_id: &str, vector: Vec<f32>) -> VectorPoint {
        let mut payload = HashMap::new();
        payload.insert("entityId".to_string(), json!(entity_id));
        VectorPoint { id, vector, payload }
    }

    #[tokio::test]
    async fn search_ranks_by_cosine_similarity() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "code_embeddings",
                vec![
                    point(1, "a", vec![1.0, 0.0]),
                    point(2, "b", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        let results = store
            .search("code_embeddings", &[1.0, 0.0], 2, None)
            .await
            .unwrap();
        assert_eq!(results[0].id, 1);
    }

    #[tokio::test]
    async fn delete_by_filter_removes_matching_entity_only() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "code_embeddings",
                vec![point(1, "a", vec![1.0, 0.0]), point(2, "b", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        let removed = store
            .delete_by_filter("code_embeddings", PointFilter::eq("entityId", "a"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        let remaining = store
            .search("code_embeddings", &[0.0, 1.0], 10, None)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 2);
    }

    #[tokio::test]
    async fn search_on_unknown_collection_returns_empty() {
        let store = InMemoryVectorStore::new();
        let results = store.search("does_not_exist", &[1.0], 5, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent_for_missing_points() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("code_embeddings", 2).await.unwrap();
        let removed = store
            .delete_by_filter("code_embeddings", PointFilter::eq("entityId", "missing"))
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}
