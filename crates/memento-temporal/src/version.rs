//! Version append (spec §4.3 "Version append").

use chrono::{DateTime, Utc};
use memento_core::flatten::parse_timestamp;
use memento_core::ids::version_id;
use memento_core::{Entity, EntityType, Relationship, RelationshipType};
use memento_embeddings::EmbeddingProvider;
use memento_graph_store::{GraphStore, RelationshipFilter};
use memento_kgs::{CreateEntityOptions, CreateRelationshipOptions, KnowledgeGraphService};
use memento_vector_store::VectorStore;
use serde_json::Value;

/// Options for [`crate::TemporalLayer::append_version`].
#[derive(Debug, Clone, Default)]
pub struct AppendVersionOptions {
    pub change_set_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Append a version node for `entity_id` and chain it to the previous
/// version, if any (spec §4.3, invariant I7: the chain is linear and
/// monotonic by timestamp). Returns the new version's id.
///
/// When history is disabled, returns a synthetic id without writing
/// anything (spec §9 "History flag everywhere").
pub async fn append_version<G: GraphStore, V: VectorStore, P: EmbeddingProvider>(
    kgs: &KnowledgeGraphService<G, V, P>,
    graph: &G,
    history_enabled: bool,
    entity_id: &str,
    hash: &str,
    opts: AppendVersionOptions,
) -> memento_core::Result<String> {
    let ts = opts.timestamp.unwrap_or_else(Utc::now);
    if !history_enabled {
        return Ok(version_id(entity_id, hash));
    }

    let new_id = version_id(entity_id, hash);
    let mut version_entity = Entity::new(new_id.clone(), EntityType::Version);
    version_entity.created = Some(ts);
    version_entity.last_modified = Some(ts);
    version_entity.metadata.insert("entityId".to_string(), Value::String(entity_id.to_string()));
    version_entity.metadata.insert("hash".to_string(), Value::String(hash.to_string()));
    if let Some(cs) = &opts.change_set_id {
        version_entity.metadata.insert("changeSetId".to_string(), Value::String(cs.clone()));
    }

    kgs.create_entity(version_entity, CreateEntityOptions { skip_embedding: true }).await?;

    let of_rel = Relationship::new(new_id.clone(), entity_id.to_string(), RelationshipType::Of, ts, None);
    kgs.create_relationship(of_rel, CreateRelationshipOptions { validate: false }).await?;

    if let Some(prev_id) = find_previous_version(graph, entity_id, &new_id, ts).await? {
        let chain_rel = Relationship::new(new_id.clone(), prev_id, RelationshipType::PreviousVersion, ts, None);
        kgs.create_relationship(chain_rel, CreateRelationshipOptions { validate: false }).await?;
    }

    Ok(new_id)
}

/// Find the most recent existing version of `entity_id` with `timestamp <=
/// ts` and a different id than `new_id` (spec §4.3 "If a previous version
/// ... exists with `timestamp ≤ ts` and a different id").
async fn find_previous_version<G: GraphStore>(
    graph: &G,
    entity_id: &str,
    new_id: &str,
    ts: DateTime<Utc>,
) -> memento_core::Result<Option<String>> {
    let rows = graph
        .get_relationships(RelationshipFilter {
            to: Some(entity_id.to_string()),
            rel_type: Some(RelationshipType::Of.as_str().to_string()),
            ..Default::default()
        })
        .await?;

    let mut best: Option<(String, DateTime<Utc>)> = None;
    for row in rows {
        let Some(version_node_id) = row.get("fromEntityId").and_then(Value::as_str) else {
            continue;
        };
        if version_node_id == new_id {
            continue;
        }
        let Some(node) = graph.get_node(version_node_id).await? else {
            continue;
        };
        let Some(version_ts) = node.get("lastModified").and_then(Value::as_str).and_then(parse_timestamp) else {
            continue;
        };
        if version_ts > ts {
            continue;
        }
        if best.as_ref().map_or(true, |(_, best_ts)| version_ts > *best_ts) {
            best = Some((version_node_id.to_string(), version_ts));
        }
    }
    Ok(best.map(|(id, _)| id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use memento_core::EventBus;
    use memento_embeddings::MockEmbeddingProvider;
    use memento_graph_store::InMemoryGraphStore;
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

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn disabled_history_returns_synthetic_id_without_writing() {
        let svc = kgs();
        let id = append_version(&svc, svc.graph(), false, "sym:foo", "abc123", AppendVersionOptions::default())
            .await
            .unwrap();
        assert_eq!(id, "ver_sym:foo_abc123");
        assert!(svc.graph().get_node(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_version_has_no_previous_chain() {
        let svc = kgs();
        let id = append_version(
            &svc,
            svc.graph(),
            true,
            "sym:foo",
            "hash1",
            AppendVersionOptions { timestamp: Some(ts(0)), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(id, "ver_sym:foo_hash1");
    }

    #[tokio::test]
    async fn second_version_chains_to_first_via_previous_version() {
        let svc = kgs();
        svc.create_entity(Entity::new("sym:foo", EntityType::Symbol), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();

        let v1 = append_version(
            &svc,
            svc.graph(),
            true,
            "sym:foo",
            "hash1",
            AppendVersionOptions { timestamp: Some(ts(0)), ..Default::default() },
        )
        .await
        .unwrap();
        let v2 = append_version(
            &svc,
            svc.graph(),
            true,
            "sym:foo",
            "hash2",
            AppendVersionOptions { timestamp: Some(ts(1)), ..Default::default() },
        )
        .await
        .unwrap();

        let rels = svc
            .graph()
            .get_relationships(RelationshipFilter {
                from: Some(v2.clone()),
                rel_type: Some(RelationshipType::PreviousVersion.as_str().to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].get("toEntityId").and_then(Value::as_str), Some(v1.as_str()));
    }
}
