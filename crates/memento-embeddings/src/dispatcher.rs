//! The Embedding Dispatcher (spec §4.4): collection routing, batched vector
//! upserts with per-entity fallback, deletion by payload filter, and the
//! random generation-failure fallback vector.

use crate::provider::{BatchInput, EmbeddingProvider};
use chrono::{DateTime, Utc};
use memento_core::flatten::format_timestamp;
use memento_core::ids::entity_point_id;
use memento_core::{Entity, EntityType};
use memento_vector_store::{PointFilter, VectorPoint, VectorStore};
use rand::distributions::{Distribution, Uniform};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Default embedding dimension (spec §6: "Vector dimension is a provider
/// constant (1536 for the default provider)").
pub const DEFAULT_DIMENSION: usize = 1536;

pub const DOCUMENTATION_COLLECTION: &str = "documentation_embeddings";
pub const CODE_COLLECTION: &str = "code_embeddings";

/// One entity queued for embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingTarget {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub content: String,
    pub path: Option<String>,
    pub language: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Tags the point with a checkpoint id (spec §4.3 "if `embedVersions=true`,
    /// also emit embeddings tagged with `checkpointId`").
    pub checkpoint_id: Option<String>,
}

impl EmbeddingTarget {
    #[must_use]
    pub fn from_entity(entity: &Entity, content: String) -> Self {
        Self {
            entity_id: entity.id.clone(),
            entity_type: entity.entity_type.clone(),
            content,
            path: entity.path.clone(),
            language: entity.language.clone(),
            last_modified: entity.last_modified,
            checkpoint_id: None,
        }
    }

    /// `documentation_embeddings` for documentation entities, `code_embeddings`
    /// otherwise (spec §4.4 "Collection routing").
    #[must_use]
    pub fn collection(&self) -> &'static str {
        if self.entity_type == EntityType::Documentation {
            DOCUMENTATION_COLLECTION
        } else {
            CODE_COLLECTION
        }
    }

    /// The payload spec §4.4 requires on every vector point: the original
    /// string `entityId` plus `type`/`path`/`language`/`lastModified`, and
    /// the optional `checkpointId` tag.
    fn payload(&self) -> HashMap<String, serde_json::Value> {
        let mut payload = HashMap::new();
        payload.insert("entityId".to_string(), serde_json::json!(self.entity_id));
        payload.insert("type".to_string(), serde_json::json!(self.entity_type.as_str()));
        if let Some(path) = &self.path {
            payload.insert("path".to_string(), serde_json::json!(path));
        }
        if let Some(language) = &self.language {
            payload.insert("language".to_string(), serde_json::json!(language));
        }
        if let Some(ts) = self.last_modified {
            payload.insert("lastModified".to_string(), serde_json::json!(format_timestamp(ts)));
        }
        if let Some(cid) = &self.checkpoint_id {
            payload.insert("checkpointId".to_string(), serde_json::json!(cid));
        }
        payload
    }
}

/// Outcome of [`EmbeddingDispatcher::upsert_entities`] for one entity, so
/// callers (and tests) can distinguish a real embedding from the random
/// generation-failure fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Embedded,
    Fallback,
}

fn random_unit_variance_vector(dimension: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let dist = Uniform::new(-1.0f32, 1.0f32);
    (0..dimension).map(|_| dist.sample(&mut rng)).collect()
}

/// Batches entity embedding and vector-store upserts, with the fallbacks
/// spec §4.4 and §7 require: per-entity retry on batch failure, and a random
/// vector when the provider itself fails.
pub struct EmbeddingDispatcher<P: EmbeddingProvider, V: VectorStore> {
    provider: Arc<P>,
    store: Arc<V>,
}

impl<P: EmbeddingProvider, V: VectorStore> EmbeddingDispatcher<P, V> {
    pub fn new(provider: Arc<P>, store: Arc<V>) -> Self {
        Self { provider, store }
    }

    /// The underlying embedding provider, for callers (e.g. semantic search)
    /// that need to embed a single query string rather than upsert entities.
    #[must_use]
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// The underlying vector store, for callers that need to search directly.
    #[must_use]
    pub fn store(&self) -> &Arc<V> {
        &self.store
    }

    async fn ensure_collections(&self) -> memento_core::Result<()> {
        let dim = self.provider.dimension();
        self.store.ensure_collection(DOCUMENTATION_COLLECTION, dim).await?;
        self.store.ensure_collection(CODE_COLLECTION, dim).await?;
        Ok(())
    }

    /// Embed and upsert a batch of targets, grouped by collection (spec §4.4
    /// "Batched upsert ... On provider failure, fall back to per-entity
    /// upsert so partial progress is preserved").
    pub async fn upsert_entities(
        &self,
        targets: Vec<EmbeddingTarget>,
    ) -> memento_core::Result<HashMap<String, EmbeddingOutcome>> {
        self.ensure_collections().await?;
        let mut outcomes = HashMap::new();

        let mut by_collection: HashMap<&'static str, Vec<EmbeddingTarget>> = HashMap::new();
        for t in targets {
            by_collection.entry(t.collection()).or_default().push(t);
        }

        for (collection, group) in by_collection {
            let inputs: Vec<BatchInput> = group
                .iter()
                .map(|t| BatchInput {
                    content: t.content.clone(),
                    entity_id: t.entity_id.clone(),
                })
                .collect();

            let by_entity_id: HashMap<&str, &EmbeddingTarget> =
                group.iter().map(|t| (t.entity_id.as_str(), t)).collect();

            match self.provider.embed_batch(inputs).await {
                Ok(batch) => {
                    let points: Vec<VectorPoint> = batch
                        .results
                        .into_iter()
                        .map(|r| {
                            outcomes.insert(r.entity_id.clone(), EmbeddingOutcome::Embedded);
                            let payload = by_entity_id
                                .get(r.entity_id.as_str())
                                .map_or_else(HashMap::new, |t| t.payload());
                            VectorPoint {
                                id: entity_point_id(&r.entity_id),
                                vector: r.embedding,
                                payload,
                            }
                        })
                        .collect();
                    self.store.upsert(collection, points).await?;
                }
                Err(e) => {
                    warn!(error = %e, collection, "batch embedding failed, falling back to per-entity upsert");
                    for target in group {
                        self.upsert_one(collection, &target, &mut outcomes).await?;
                    }
                }
            }
        }

        Ok(outcomes)
    }

    async fn upsert_one(
        &self,
        collection: &str,
        target: &EmbeddingTarget,
        outcomes: &mut HashMap<String, EmbeddingOutcome>,
    ) -> memento_core::Result<()> {
        let (vector, outcome) = match self.provider.embed(&target.content).await {
            Ok(result) => (result.embedding, EmbeddingOutcome::Embedded),
            Err(e) => {
                warn!(error = %e, entity_id = %target.entity_id, "embedding provider failed, using random fallback vector");
                (random_unit_variance_vector(self.provider.dimension()), EmbeddingOutcome::Fallback)
            }
        };
        let mut payload = target.payload();
        if outcome == EmbeddingOutcome::Fallback {
            payload.insert("fallback".to_string(), serde_json::json!(true));
        }
        self.store
            .upsert(
                collection,
                vec![VectorPoint {
                    id: entity_point_id(&target.entity_id),
                    vector,
                    payload,
                }],
            )
            .await?;
        outcomes.insert(target.entity_id.clone(), outcome);
        Ok(())
    }

    /// Delete every point for `entity_id` from both collections (spec §4.4
    /// "Deletion ... idempotent, ignores not found").
    pub async fn delete_embedding(&self, entity_id: &str) -> memento_core::Result<()> {
        let filter = PointFilter::eq("entityId", entity_id);
        self.store.delete_by_filter(DOCUMENTATION_COLLECTION, filter.clone()).await?;
        self.store.delete_by_filter(CODE_COLLECTION, filter).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEmbeddingProvider;
    use memento_vector_store::InMemoryVectorStore;

    fn dispatcher() -> (EmbeddingDispatcher<MockEmbeddingProvider, InMemoryVectorStore>, Arc<InMemoryVectorStore>) {
        let store = Arc::new(InMemoryVectorStore::new());
        (
            EmbeddingDispatcher::new(Arc::new(MockEmbeddingProvider::new(8)), store.clone()),
            store,
        )
    }

    fn target(entity_id: &str, entity_type: EntityType, content: &str) -> EmbeddingTarget {
        EmbeddingTarget {
            entity_id: entity_id.to_string(),
            entity_type,
            content: content.to_string(),
            path: None,
            language: None,
            last_modified: None,
            checkpoint_id: None,
        }
    }

    #[tokio::test]
    async fn routes_documentation_entities_to_documentation_collection() {
        let target = target("doc:1", EntityType::Documentation, "readme");
        assert_eq!(target.collection(), DOCUMENTATION_COLLECTION);
    }

    #[tokio::test]
    async fn routes_non_documentation_entities_to_code_collection() {
        let target = target("sym:1", EntityType::Symbol, "fn foo() {}");
        assert_eq!(target.collection(), CODE_COLLECTION);
    }

    #[tokio::test]
    async fn upsert_then_delete_removes_all_points_for_entity() {
        let (d, store) = dispatcher();
        let targets = vec![target("sym:1", EntityType::Symbol, "fn foo() {}")];
        let outcomes = d.upsert_entities(targets).await.unwrap();
        assert_eq!(outcomes.get("sym:1"), Some(&EmbeddingOutcome::Embedded));

        d.delete_embedding("sym:1").await.unwrap();
        let hits = store.search(CODE_COLLECTION, &[0.0; 8], 10, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn deleting_unknown_entity_is_not_an_error() {
        let (d, _store) = dispatcher();
        d.delete_embedding("does-not-exist").await.unwrap();
    }

    #[tokio::test]
    async fn upserted_point_payload_carries_checkpoint_tag() {
        let (d, store) = dispatcher();
        let mut t = target("sym:2", EntityType::Symbol, "fn bar() {}");
        t.path = Some("src/bar.ts".into());
        t.checkpoint_id = Some("chk_1".into());
        d.upsert_entities(vec![t]).await.unwrap();

        let hits = store
            .search(CODE_COLLECTION, &MockEmbeddingProvider::new(8).embed("fn bar() {}").await.unwrap().embedding, 10, None)
            .await
            .unwrap();
        let hit = hits.iter().find(|h| h.payload.get("entityId").and_then(|v| v.as_str()) == Some("sym:2")).unwrap();
        assert_eq!(hit.payload.get("checkpointId").and_then(|v| v.as_str()), Some("chk_1"));
        assert_eq!(hit.payload.get("path").and_then(|v| v.as_str()), Some("src/bar.ts"));
    }
}
