//! `Engine` (spec §0 "facade crate"): the single handle an embedding
//! application holds to run Memento — the cached Knowledge Graph Service,
//! the optional Temporal History layer, and the Synchronization Coordinator,
//! all wired to one backing store/embedding stack and one event bus.

use memento_core::{EngineConfig, EventBus};
use memento_embeddings::EmbeddingProvider;
use memento_graph_store::GraphStore;
use memento_kgs::KnowledgeGraphService;
use memento_sync::{Coordinator, RepositorySource};
use memento_temporal::TemporalLayer;
use memento_vector_store::VectorStore;
use std::sync::Arc;

/// Everything a deployment needs behind one `Arc`-friendly handle. Generic
/// over the backing adapters so the same wiring serves both
/// `InMemoryGraphStore`/`InMemoryVectorStore` (tests, `memento-cli --local`)
/// and the Neo4j/Qdrant adapters behind their feature flags.
pub struct Engine<G, V, P, S>
where
    G: GraphStore + 'static,
    V: VectorStore + 'static,
    P: EmbeddingProvider + 'static,
    S: RepositorySource + 'static,
{
    kgs: Arc<KnowledgeGraphService<G, V, P>>,
    temporal: Option<Arc<TemporalLayer<G, V, P>>>,
    coordinator: Coordinator<G, V, P, S>,
    events: EventBus,
}

impl<G, V, P, S> Engine<G, V, P, S>
where
    G: GraphStore + 'static,
    V: VectorStore + 'static,
    P: EmbeddingProvider + 'static,
    S: RepositorySource + 'static,
{
    /// Wire the stack together from its backing adapters. The temporal
    /// layer is only constructed when `config.history.enabled` (spec §9
    /// "History flag everywhere" — no point building it otherwise).
    pub fn new(
        graph: Arc<G>,
        vector_store: Arc<V>,
        provider: Arc<P>,
        source: Arc<S>,
        config: EngineConfig,
    ) -> Self {
        let events = EventBus::new();
        let kgs = Arc::new(KnowledgeGraphService::new(
            Arc::clone(&graph),
            Arc::clone(&provider),
            Arc::clone(&vector_store),
            events.clone(),
        ));
        let temporal = config.history.enabled.then(|| {
            Arc::new(TemporalLayer::new(
                Arc::clone(&kgs),
                Arc::clone(&provider),
                Arc::clone(&vector_store),
                config.history.clone(),
            ))
        });
        let coordinator = Coordinator::new(
            Arc::clone(&kgs),
            temporal.clone(),
            source,
            events.clone(),
            config.sync,
        );
        Self { kgs, temporal, coordinator, events }
    }

    #[must_use]
    pub fn kgs(&self) -> &Arc<KnowledgeGraphService<G, V, P>> {
        &self.kgs
    }

    /// `None` when history is disabled; callers needing time travel or
    /// checkpoints should handle that case rather than unwrap.
    #[must_use]
    pub fn temporal(&self) -> Option<&Arc<TemporalLayer<G, V, P>>> {
        self.temporal.as_ref()
    }

    #[must_use]
    pub fn coordinator(&self) -> &Coordinator<G, V, P, S> {
        &self.coordinator
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// `ensureGraphIndexes` (spec §4.2), run once before the first sync.
    pub async fn ensure_indexes(&self) {
        self.kgs.ensure_graph_indexes().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use memento_core::Result;
    use memento_embeddings::MockEmbeddingProvider;
    use memento_graph_store::InMemoryGraphStore;
    use memento_sync::{IncrementalParseResult, ParseResult};
    use memento_vector_store::InMemoryVectorStore;

    struct EmptySource;

    #[async_trait]
    impl RepositorySource for EmptySource {
        async fn parse_file(&self, _path: &str) -> Result<ParseResult> {
            Ok(ParseResult::default())
        }

        async fn parse_file_incremental(&self, path: &str) -> Result<IncrementalParseResult> {
            let base = self.parse_file(path).await?;
            Ok(IncrementalParseResult {
                added_entities: Vec::new(),
                removed_entities: Vec::new(),
                updated_entities: Vec::new(),
                base,
                is_incremental: false,
            })
        }

        async fn list_files(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn build() -> Engine<InMemoryGraphStore, InMemoryVectorStore, MockEmbeddingProvider, EmptySource> {
        Engine::new(
            Arc::new(InMemoryGraphStore::default()),
            Arc::new(InMemoryVectorStore::default()),
            Arc::new(MockEmbeddingProvider::new(8)),
            Arc::new(EmptySource),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn history_layer_is_built_when_enabled_by_default() {
        let engine = build();
        assert!(engine.temporal().is_some());
    }

    #[tokio::test]
    async fn history_layer_is_absent_when_disabled() {
        let mut config = EngineConfig::default();
        config.history.enabled = false;
        let engine = Engine::new(
            Arc::new(InMemoryGraphStore::default()),
            Arc::new(InMemoryVectorStore::default()),
            Arc::new(MockEmbeddingProvider::new(8)),
            Arc::new(EmptySource),
            config,
        );
        assert!(engine.temporal().is_none());
    }

    #[tokio::test]
    async fn full_sync_through_the_engine_completes() {
        let engine = build();
        engine.ensure_indexes().await;
        let op_id = engine
            .coordinator()
            .start_full_sync(memento_sync::FullSyncRequest { paths: Some(Vec::new()), options: Default::default() })
            .await;
        assert!(!op_id.is_empty());
    }
}
