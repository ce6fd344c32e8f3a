//! History pruning (spec §4.3 "Prune", property P6).

use chrono::{DateTime, Duration, Utc};
use memento_core::{EntityType, Result};
use memento_embeddings::EmbeddingProvider;
use memento_graph_store::{GraphStore, RelationshipFilter};
use memento_kgs::KnowledgeGraphService;
use memento_vector_store::VectorStore;
use std::collections::HashSet;

/// Options for [`prune_history`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneOptions {
    /// Compute and report what would be deleted without deleting anything.
    pub dry_run: bool,
}

/// `pruneHistory(retentionDays)`'s return value, and what
/// `getHistoryMetrics` reports as `lastPrune` (spec §4.3 "Metrics").
#[derive(Debug, Clone)]
pub struct PruneSummary {
    pub cutoff: DateTime<Utc>,
    pub dry_run: bool,
    pub checkpoints_deleted: usize,
    pub edges_deleted: usize,
    pub versions_deleted: usize,
}

const LIST_LIMIT: usize = 100_000;

/// `pruneHistory(retentionDays, {dryRun?})` (spec §4.3): deletes checkpoints
/// older than `cutoff`, edges whose `validTo` predates `cutoff`, and versions
/// older than `cutoff` that no surviving checkpoint (`timestamp >= cutoff`)
/// still references (P6).
pub async fn prune_history<G: GraphStore, V: VectorStore, P: EmbeddingProvider>(
    kgs: &KnowledgeGraphService<G, V, P>,
    retention_days: i64,
    opts: PruneOptions,
) -> Result<PruneSummary> {
    let cutoff = Utc::now() - Duration::days(retention_days);
    let graph = kgs.graph();

    let checkpoints = kgs.find_entities_by_type(&EntityType::Checkpoint, LIST_LIMIT, 0).await?;
    let mut surviving_members: HashSet<String> = HashSet::new();
    let mut checkpoints_deleted = 0;
    for checkpoint in &checkpoints {
        let created = checkpoint.created.unwrap_or_else(Utc::now);
        if created < cutoff {
            checkpoints_deleted += 1;
            if !opts.dry_run {
                graph.detach_delete_node(&checkpoint.id).await?;
            }
        } else {
            let rows = graph
                .get_relationships(RelationshipFilter {
                    from: Some(checkpoint.id.clone()),
                    rel_type: Some(memento_core::RelationshipType::CheckpointIncludes.as_str().to_string()),
                    ..Default::default()
                })
                .await?;
            for row in rows {
                if let Some(member) = row.get("toEntityId").and_then(|v| v.as_str()) {
                    surviving_members.insert(member.to_string());
                }
            }
        }
    }

    let all_relationships = graph.get_relationships(RelationshipFilter::default()).await?;
    let mut edges_deleted = 0;
    for row in all_relationships {
        let Some(valid_to) = row
            .get("validTo")
            .and_then(|v| v.as_str())
            .and_then(memento_core::flatten::parse_timestamp)
        else {
            continue;
        };
        if valid_to < cutoff {
            edges_deleted += 1;
            if !opts.dry_run {
                if let Some(id) = row.get("id").and_then(|v| v.as_str()) {
                    graph.delete_relationship(id).await?;
                }
            }
        }
    }

    let versions = kgs.find_entities_by_type(&EntityType::Version, LIST_LIMIT, 0).await?;
    let mut versions_deleted = 0;
    for version in &versions {
        let created = version.created.unwrap_or_else(Utc::now);
        if created >= cutoff {
            continue;
        }
        if surviving_members.contains(&version.id) {
            continue;
        }
        versions_deleted += 1;
        if !opts.dry_run {
            graph.detach_delete_node(&version.id).await?;
        }
    }

    Ok(PruneSummary {
        cutoff,
        dry_run: opts.dry_run,
        checkpoints_deleted,
        edges_deleted,
        versions_deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{create_checkpoint, CheckpointReason, CreateCheckpointOptions};
    use crate::version::{append_version, AppendVersionOptions};
    use chrono::TimeZone;
    use memento_core::{Entity, EventBus, Relationship, RelationshipType};
    use memento_embeddings::{EmbeddingDispatcher, MockEmbeddingProvider};
    use memento_graph_store::InMemoryGraphStore;
    use memento_kgs::{CreateEntityOptions, CreateRelationshipOptions};
    use memento_vector_store::InMemoryVectorStore;
    use std::sync::Arc;

    fn kgs() -> KnowledgeGraphService<InMemoryGraphStore, InMemoryVectorStore, MockEmbeddingProvider> {
        KnowledgeGraphService::new(
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(MockEmbeddingProvider::new(8)),
            Arc::new(InMemoryVectorStore::new()),
            EventBus::new(),
        )
    }

    fn old_ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn prunes_old_checkpoints_and_keeps_recent_ones() {
        let svc = kgs();
        svc.create_entity(Entity::new("sym:foo", memento_core::EntityType::Symbol), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();
        let dispatch = EmbeddingDispatcher::new(Arc::new(MockEmbeddingProvider::new(8)), Arc::new(InMemoryVectorStore::new()));

        let old_id = create_checkpoint(
            &svc,
            &dispatch,
            &["sym:foo".to_string()],
            CheckpointReason::Manual,
            1,
            CreateCheckpointOptions::default(),
        )
        .await
        .unwrap();
        // Backdate it directly so it falls outside retention.
        svc.graph()
            .merge_node_by_id(&["checkpoint"], &old_id, std::iter::once(("created".to_string(), serde_json::json!(old_ts().to_rfc3339()))).collect())
            .await
            .unwrap();

        let recent_id = create_checkpoint(
            &svc,
            &dispatch,
            &["sym:foo".to_string()],
            CheckpointReason::Manual,
            1,
            CreateCheckpointOptions::default(),
        )
        .await
        .unwrap();

        let summary = prune_history(&svc, 30, PruneOptions::default()).await.unwrap();
        assert_eq!(summary.checkpoints_deleted, 1);
        assert!(svc.get_entity(&old_id).await.unwrap().is_none());
        assert!(svc.get_entity(&recent_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn never_deletes_version_referenced_by_surviving_checkpoint() {
        let svc = kgs();
        svc.create_entity(Entity::new("sym:foo", memento_core::EntityType::Symbol), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();

        let version_id = append_version(
            &svc,
            svc.graph(),
            true,
            "sym:foo",
            "hash1",
            AppendVersionOptions { timestamp: Some(old_ts()), ..Default::default() },
        )
        .await
        .unwrap();

        let dispatch = EmbeddingDispatcher::new(Arc::new(MockEmbeddingProvider::new(8)), Arc::new(InMemoryVectorStore::new()));
        let checkpoint_id = create_checkpoint(
            &svc,
            &dispatch,
            &[version_id.clone()],
            CheckpointReason::Manual,
            1,
            CreateCheckpointOptions::default(),
        )
        .await
        .unwrap();
        assert!(svc.get_entity(&checkpoint_id).await.unwrap().is_some());

        let summary = prune_history(&svc, 30, PruneOptions::default()).await.unwrap();
        assert_eq!(summary.versions_deleted, 0);
        assert!(svc.get_entity(&version_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deletes_unreferenced_old_version() {
        let svc = kgs();
        svc.create_entity(Entity::new("sym:foo", memento_core::EntityType::Symbol), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();
        let version_id = append_version(
            &svc,
            svc.graph(),
            true,
            "sym:foo",
            "hash1",
            AppendVersionOptions { timestamp: Some(old_ts()), ..Default::default() },
        )
        .await
        .unwrap();

        let summary = prune_history(&svc, 30, PruneOptions::default()).await.unwrap();
        assert_eq!(summary.versions_deleted, 1);
        assert!(svc.get_entity(&version_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dry_run_reports_without_deleting() {
        let svc = kgs();
        svc.create_entity(Entity::new("sym:foo", memento_core::EntityType::Symbol), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();
        let version_id = append_version(
            &svc,
            svc.graph(),
            true,
            "sym:foo",
            "hash1",
            AppendVersionOptions { timestamp: Some(old_ts()), ..Default::default() },
        )
        .await
        .unwrap();

        let summary = prune_history(&svc, 30, PruneOptions { dry_run: true }).await.unwrap();
        assert_eq!(summary.versions_deleted, 1);
        assert!(svc.get_entity(&version_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deletes_edges_closed_before_cutoff() {
        let svc = kgs();
        let a = Entity::new("a", memento_core::EntityType::Symbol);
        let b = Entity::new("b", memento_core::EntityType::Symbol);
        svc.create_entity(a, CreateEntityOptions { skip_embedding: true }).await.unwrap();
        svc.create_entity(b, CreateEntityOptions { skip_embedding: true }).await.unwrap();
        let rel = Relationship::new("a", "b", RelationshipType::Calls, old_ts(), None);
        svc.create_relationship(rel.clone(), CreateRelationshipOptions::default()).await.unwrap();
        crate::edge::close_edge(svc.graph(), &rel.from_entity_id, &rel.to_entity_id, &rel.rel_type, Some(old_ts()))
            .await
            .unwrap();

        let summary = prune_history(&svc, 30, PruneOptions::default()).await.unwrap();
        assert_eq!(summary.edges_deleted, 1);
    }
}
