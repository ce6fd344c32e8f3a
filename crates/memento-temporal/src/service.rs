//! `TemporalLayer` (spec §4.3): wires version/edge/checkpoint/traversal/
//! prune/metrics operations to a shared [`KnowledgeGraphService`], honoring
//! the `HISTORY_ENABLED` flag everywhere (spec §9 "History flag everywhere").

use crate::checkpoint::{
    self, CheckpointData, CheckpointReason, CreateCheckpointOptions, ImportCheckpointOptions,
};
use crate::metrics::{get_history_metrics, HistoryMetrics};
use crate::prune::{prune_history, PruneOptions, PruneSummary};
use crate::traversal::{time_travel_traversal, TimeTravelRequest, TimeTravelResult};
use crate::version::{append_version, AppendVersionOptions};
use chrono::{DateTime, Utc};
use memento_core::{HistoryConfig, RelationshipType, Result};
use memento_embeddings::{EmbeddingDispatcher, EmbeddingProvider};
use memento_graph_store::GraphStore;
use memento_kgs::KnowledgeGraphService;
use memento_vector_store::VectorStore;
use std::sync::{Arc, Mutex};

/// The temporal history layer sitting alongside a [`KnowledgeGraphService`].
/// Owns a second [`EmbeddingDispatcher`] so `embedVersions` checkpoint
/// embeddings don't have to go through the service's private one.
pub struct TemporalLayer<G: GraphStore, V: VectorStore, P: EmbeddingProvider> {
    kgs: Arc<KnowledgeGraphService<G, V, P>>,
    embed_dispatcher: EmbeddingDispatcher<P, V>,
    config: HistoryConfig,
    last_prune: Mutex<Option<PruneSummary>>,
}

impl<G: GraphStore, V: VectorStore, P: EmbeddingProvider> TemporalLayer<G, V, P> {
    pub fn new(
        kgs: Arc<KnowledgeGraphService<G, V, P>>,
        provider: Arc<P>,
        vector_store: Arc<V>,
        config: HistoryConfig,
    ) -> Self {
        Self {
            kgs,
            embed_dispatcher: EmbeddingDispatcher::new(provider, vector_store),
            config,
            last_prune: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// `appendVersion(entityId, hash, changeSetId?)`. A no-op synthetic id
    /// when `HISTORY_ENABLED=false`.
    pub async fn append_version(
        &self,
        entity_id: &str,
        hash: &str,
        opts: AppendVersionOptions,
    ) -> Result<String> {
        append_version(&self.kgs, self.kgs.graph(), self.config.enabled, entity_id, hash, opts).await
    }

    /// `openEdge(from,to,type,ts?,changeSetId?)`. No-op (returns the
    /// deterministic id without touching the graph) when history is disabled.
    pub async fn open_edge(
        &self,
        from: &str,
        to: &str,
        rel_type: &RelationshipType,
        ts: Option<DateTime<Utc>>,
        change_set_id: Option<String>,
    ) -> Result<String> {
        if !self.config.enabled {
            return Ok(memento_core::Relationship::deterministic_id(from, to, rel_type));
        }
        crate::edge::open_edge(self.kgs.graph().as_ref(), from, to, rel_type, ts, change_set_id).await
    }

    /// `closeEdge(from,to,type,ts?)`. No-op when history is disabled.
    pub async fn close_edge(
        &self,
        from: &str,
        to: &str,
        rel_type: &RelationshipType,
        ts: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        if !self.config.enabled {
            return Ok(true);
        }
        crate::edge::close_edge(self.kgs.graph().as_ref(), from, to, rel_type, ts).await
    }

    /// `createCheckpoint(seeds, reason, hops, window?)`, using this layer's
    /// own embedding dispatcher for `embedVersions`.
    pub async fn create_checkpoint(
        &self,
        seeds: &[String],
        reason: CheckpointReason,
        hops: u8,
        opts: CreateCheckpointOptions,
    ) -> Result<String> {
        checkpoint::create_checkpoint(&self.kgs, &self.embed_dispatcher, seeds, reason, hops, opts).await
    }

    /// Convenience wrapper honoring `HISTORY_INCIDENT_ENABLED`/`HISTORY_INCIDENT_HOPS`
    /// (spec §6). Returns `None` when incident checkpoints are disabled.
    pub async fn create_incident_checkpoint(&self, seeds: &[String]) -> Result<Option<String>> {
        if !self.config.incident_enabled {
            return Ok(None);
        }
        let opts = CreateCheckpointOptions { embed_versions: self.config.embed_versions, ..Default::default() };
        let id = checkpoint::create_checkpoint(
            &self.kgs,
            &self.embed_dispatcher,
            seeds,
            CheckpointReason::Incident,
            self.config.incident_hops,
            opts,
        )
        .await?;
        Ok(Some(id))
    }

    pub async fn get_checkpoint_members(&self, checkpoint_id: &str) -> Result<Vec<String>> {
        checkpoint::get_checkpoint_members(self.kgs.graph().as_ref(), checkpoint_id).await
    }

    pub async fn export_checkpoint(&self, checkpoint_id: &str) -> Result<Option<CheckpointData>> {
        checkpoint::export_checkpoint(&self.kgs, checkpoint_id).await
    }

    pub async fn import_checkpoint(
        &self,
        data: CheckpointData,
        opts: ImportCheckpointOptions,
    ) -> Result<String> {
        checkpoint::import_checkpoint(&self.kgs, data, opts).await
    }

    /// `timeTravelTraversal(...)` (spec §4.3).
    pub async fn time_travel(&self, request: &TimeTravelRequest) -> Result<TimeTravelResult> {
        time_travel_traversal(self.kgs.graph().as_ref(), request).await
    }

    /// `pruneHistory(retentionDays, {dryRun?})`. Records the result as
    /// `lastPrune` for subsequent `getHistoryMetrics()` calls, even on a dry
    /// run, matching "records `lastPrune` summary" (spec §4.3).
    pub async fn prune_history(&self, retention_days: i64, opts: PruneOptions) -> Result<PruneSummary> {
        let summary = prune_history(&self.kgs, retention_days, opts).await?;
        *self.last_prune.lock().expect("last_prune mutex poisoned") = Some(summary.clone());
        Ok(summary)
    }

    /// `getHistoryMetrics()` (spec §4.3).
    pub async fn get_history_metrics(&self) -> Result<HistoryMetrics> {
        let last_prune = self.last_prune.lock().expect("last_prune mutex poisoned").clone();
        get_history_metrics(&self.kgs, last_prune).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memento_core::{Entity, EntityType, EventBus};
    use memento_embeddings::MockEmbeddingProvider;
    use memento_graph_store::InMemoryGraphStore;
    use memento_kgs::CreateEntityOptions;
    use memento_vector_store::InMemoryVectorStore;

    fn layer() -> TemporalLayer<InMemoryGraphStore, InMemoryVectorStore, MockEmbeddingProvider> {
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let store = Arc::new(InMemoryVectorStore::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        let kgs = Arc::new(KnowledgeGraphService::new(graph, provider.clone(), store.clone(), EventBus::new()));
        TemporalLayer::new(kgs, provider, store, HistoryConfig::default())
    }

    #[tokio::test]
    async fn disabled_history_short_circuits_append_version() {
        let mut config = HistoryConfig::default();
        config.enabled = false;
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let store = Arc::new(InMemoryVectorStore::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        let kgs = Arc::new(KnowledgeGraphService::new(graph, provider.clone(), store.clone(), EventBus::new()));
        let layer = TemporalLayer::new(kgs, provider, store, config);

        let id = layer.append_version("sym:foo", "hash1", AppendVersionOptions::default()).await.unwrap();
        assert!(layer.kgs.get_entity(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn incident_checkpoint_disabled_returns_none() {
        let mut config = HistoryConfig::default();
        config.incident_enabled = false;
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let store = Arc::new(InMemoryVectorStore::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        let kgs = Arc::new(KnowledgeGraphService::new(graph, provider.clone(), store.clone(), EventBus::new()));
        let layer = TemporalLayer::new(kgs, provider, store, config);

        let result = layer.create_incident_checkpoint(&["sym:foo".to_string()]).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn prune_then_metrics_reports_last_prune() {
        let layer = layer();
        layer
            .kgs
            .create_entity(Entity::new("sym:foo", EntityType::Symbol), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();

        layer.prune_history(30, PruneOptions::default()).await.unwrap();
        let metrics = layer.get_history_metrics().await.unwrap();
        assert!(metrics.last_prune.is_some());
        assert_eq!(metrics.node_counts.get("symbol"), Some(&1));
    }
}
