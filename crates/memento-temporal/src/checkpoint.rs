//! Checkpoints (spec §4.3 "Checkpoint"): an immutable snapshot of the
//! subgraph reachable from a seed set within a bounded number of hops.

use chrono::{DateTime, Utc};
use memento_core::flatten::parse_timestamp;
use memento_core::ids::checkpoint_id;
use memento_core::{Entity, EntityType, Relationship, RelationshipType, Result};
use memento_embeddings::{EmbeddingDispatcher, EmbeddingProvider, EmbeddingTarget};
use memento_graph_store::{GraphStore, RelationshipFilter};
use memento_kgs::{CreateEntityOptions, CreateRelationshipOptions, KnowledgeGraphService};
use memento_vector_store::VectorStore;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// `reason` on a checkpoint node (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointReason {
    Daily,
    Incident,
    Manual,
}

impl CheckpointReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Incident => "incident",
            Self::Manual => "manual",
        }
    }
}

/// Options for [`create_checkpoint`].
#[derive(Debug, Clone, Default)]
pub struct CreateCheckpointOptions {
    /// Restrict traversal to edges created within this window.
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Tag member embeddings with the new checkpoint id (spec §4.3
    /// "if `embedVersions=true`, also emit embeddings tagged with `checkpointId`").
    pub embed_versions: bool,
}

/// Everything [`export_checkpoint`] hands back, and [`import_checkpoint`]
/// consumes, for moving a checkpoint between graphs.
#[derive(Debug, Clone)]
pub struct CheckpointData {
    pub checkpoint: Entity,
    pub members: Vec<String>,
    pub relationships: Vec<Relationship>,
}

/// Options for [`import_checkpoint`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportCheckpointOptions {
    pub use_original_id: bool,
}

/// `createCheckpoint(seeds, reason, hops, window?)` (spec §4.3). `hops` is
/// clamped to `[1,5]` (B1). Members are resolved by an undirected BFS from
/// `seeds` — spec's `MATCH (s)-[*1..hops]-(n)` has no arrows — and linked via
/// `CHECKPOINT_INCLUDES`. Returns the new checkpoint id.
pub async fn create_checkpoint<G: GraphStore, V: VectorStore, P: EmbeddingProvider>(
    kgs: &KnowledgeGraphService<G, V, P>,
    embed_dispatcher: &EmbeddingDispatcher<P, V>,
    seeds: &[String],
    reason: CheckpointReason,
    hops: u8,
    opts: CreateCheckpointOptions,
) -> Result<String> {
    let hops = hops.clamp(1, 5);
    let now = Utc::now();
    let id = checkpoint_id(now.timestamp_millis() as u64);

    let members = undirected_reachable(kgs.graph(), seeds, hops, opts.window).await?;

    let mut checkpoint_entity = Entity::new(id.clone(), EntityType::Checkpoint);
    checkpoint_entity.created = Some(now);
    checkpoint_entity.last_modified = Some(now);
    checkpoint_entity.metadata.insert("checkpointId".to_string(), Value::String(id.clone()));
    checkpoint_entity.metadata.insert("reason".to_string(), Value::String(reason.as_str().to_string()));
    checkpoint_entity.metadata.insert("hops".to_string(), Value::from(hops));
    checkpoint_entity
        .metadata
        .insert("seedEntities".to_string(), serde_json::json!(seeds));
    kgs.create_entity(checkpoint_entity, CreateEntityOptions { skip_embedding: true }).await?;

    let mut rels = Vec::with_capacity(members.len());
    for member in &members {
        rels.push(Relationship::new(id.clone(), member.clone(), RelationshipType::CheckpointIncludes, now, None));
    }
    kgs.create_relationships_bulk(rels, CreateRelationshipOptions { validate: false }).await?;

    if opts.embed_versions {
        embed_members(kgs, embed_dispatcher, &members, &id).await;
    }

    Ok(id)
}

async fn embed_members<G: GraphStore, V: VectorStore, P: EmbeddingProvider>(
    kgs: &KnowledgeGraphService<G, V, P>,
    embed_dispatcher: &EmbeddingDispatcher<P, V>,
    members: &[String],
    checkpoint_id: &str,
) {
    let mut targets = Vec::new();
    for member_id in members {
        match kgs.get_entity(member_id).await {
            Ok(Some(entity)) => {
                let content = embedding_content(&entity);
                let mut target = EmbeddingTarget::from_entity(&entity, content);
                target.checkpoint_id = Some(checkpoint_id.to_string());
                targets.push(target);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, entity_id = %member_id, "failed to load entity for checkpoint embedding"),
        }
    }
    if !targets.is_empty() {
        if let Err(e) = embed_dispatcher.upsert_entities(targets).await {
            warn!(error = %e, checkpoint_id, "failed to embed checkpoint members");
        }
    }
}

/// Mirrors `memento-kgs`'s embedding-content heuristic: name/signature/docstring,
/// falling back to path.
fn embedding_content(entity: &Entity) -> String {
    let mut parts = Vec::new();
    if let Some(name) = &entity.name {
        parts.push(name.clone());
    }
    if let Some(sig) = &entity.signature {
        parts.push(sig.clone());
    }
    if let Some(doc) = &entity.docstring {
        parts.push(doc.clone());
    }
    if parts.is_empty() {
        if let Some(path) = &entity.path {
            parts.push(path.clone());
        }
    }
    parts.join("\n")
}

/// `getCheckpointMembers(id)` (spec §4.3 scenario 4).
pub async fn get_checkpoint_members<G: GraphStore>(graph: &G, checkpoint_id: &str) -> Result<Vec<String>> {
    let rows = graph
        .get_relationships(RelationshipFilter {
            from: Some(checkpoint_id.to_string()),
            rel_type: Some(RelationshipType::CheckpointIncludes.as_str().to_string()),
            ..Default::default()
        })
        .await?;
    Ok(rows.iter().filter_map(|r| r.get("toEntityId").and_then(Value::as_str).map(str::to_string)).collect())
}

/// `exportCheckpoint(id)` (spec §4.3): the checkpoint node, its member ids,
/// and any relationships where both endpoints are members.
pub async fn export_checkpoint<G: GraphStore, V: VectorStore, P: EmbeddingProvider>(
    kgs: &KnowledgeGraphService<G, V, P>,
    checkpoint_id: &str,
) -> Result<Option<CheckpointData>> {
    let Some(checkpoint) = kgs.get_entity(checkpoint_id).await? else {
        return Ok(None);
    };
    let members = get_checkpoint_members(kgs.graph(), checkpoint_id).await?;
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();

    let mut relationships = Vec::new();
    for member in &members {
        let outgoing = kgs
            .get_relationships(RelationshipFilter { from: Some(member.clone()), ..Default::default() })
            .await?;
        for rel in outgoing {
            if rel.rel_type.is_code_edge() && member_set.contains(rel.to_entity_id.as_str()) {
                relationships.push(rel);
            }
        }
    }

    Ok(Some(CheckpointData { checkpoint, members, relationships }))
}

/// `importCheckpoint(data, {useOriginalId?})` (spec §4.3): merges the
/// checkpoint node and links only members that already exist in this graph.
pub async fn import_checkpoint<G: GraphStore, V: VectorStore, P: EmbeddingProvider>(
    kgs: &KnowledgeGraphService<G, V, P>,
    data: CheckpointData,
    opts: ImportCheckpointOptions,
) -> Result<String> {
    let now = Utc::now();
    let id = if opts.use_original_id {
        data.checkpoint.id.clone()
    } else {
        checkpoint_id(now.timestamp_millis() as u64)
    };

    let mut checkpoint_entity = data.checkpoint.clone();
    checkpoint_entity.id = id.clone();
    kgs.create_entity(checkpoint_entity, CreateEntityOptions { skip_embedding: true }).await?;

    let mut rels = Vec::new();
    for member in &data.members {
        if kgs.graph().node_exists(member).await? {
            rels.push(Relationship::new(id.clone(), member.clone(), RelationshipType::CheckpointIncludes, now, None));
        }
    }
    kgs.create_relationships_bulk(rels, CreateRelationshipOptions { validate: false }).await?;

    Ok(id)
}

/// Undirected BFS from `seeds`, up to `hops` levels, optionally restricted to
/// edges created within `window`. Seeds themselves are included in the
/// result, matching scenario 4's `getCheckpointMembers` expectation.
async fn undirected_reachable<G: GraphStore>(
    graph: &G,
    seeds: &[String],
    hops: u8,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<Vec<String>> {
    let mut visited: HashSet<String> = seeds.iter().cloned().collect();
    let mut frontier: Vec<String> = seeds.to_vec();

    for _ in 0..hops {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for node in &frontier {
            for neighbor in neighbors_of(graph, node, window).await? {
                if visited.insert(neighbor.clone()) {
                    next.push(neighbor);
                }
            }
        }
        frontier = next;
    }

    Ok(visited.into_iter().collect())
}

async fn neighbors_of<G: GraphStore>(
    graph: &G,
    node: &str,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<Vec<String>> {
    let mut neighbors = Vec::new();
    let outgoing = graph
        .get_relationships(RelationshipFilter { from: Some(node.to_string()), ..Default::default() })
        .await?;
    for row in outgoing {
        if in_window(&row, window) {
            if let Some(to) = row.get("toEntityId").and_then(Value::as_str) {
                neighbors.push(to.to_string());
            }
        }
    }
    let incoming = graph
        .get_relationships(RelationshipFilter { to: Some(node.to_string()), ..Default::default() })
        .await?;
    for row in incoming {
        if in_window(&row, window) {
            if let Some(from) = row.get("fromEntityId").and_then(Value::as_str) {
                neighbors.push(from.to_string());
            }
        }
    }
    Ok(neighbors)
}

fn in_window(row: &std::collections::HashMap<String, Value>, window: Option<(DateTime<Utc>, DateTime<Utc>)>) -> bool {
    let Some((since, until)) = window else {
        return true;
    };
    row.get("created")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .is_some_and(|created| created >= since && created <= until)
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn dispatcher(
        provider: &Arc<MockEmbeddingProvider>,
    ) -> EmbeddingDispatcher<MockEmbeddingProvider, InMemoryVectorStore> {
        EmbeddingDispatcher::new(provider.clone(), Arc::new(InMemoryVectorStore::new()))
    }

    async fn seed_chain(svc: &KnowledgeGraphService<InMemoryGraphStore, InMemoryVectorStore, MockEmbeddingProvider>) {
        for id in ["sym:foo", "sym:bar", "sym:baz", "sym:far"] {
            svc.create_entity(Entity::new(id, EntityType::Symbol), CreateEntityOptions { skip_embedding: true })
                .await
                .unwrap();
        }
        svc.create_relationship(
            Relationship::new("sym:foo", "sym:bar", RelationshipType::Calls, Utc::now(), None),
            CreateRelationshipOptions::default(),
        )
        .await
        .unwrap();
        svc.create_relationship(
            Relationship::new("sym:bar", "sym:baz", RelationshipType::Calls, Utc::now(), None),
            CreateRelationshipOptions::default(),
        )
        .await
        .unwrap();
        svc.create_relationship(
            Relationship::new("sym:baz", "sym:far", RelationshipType::Calls, Utc::now(), None),
            CreateRelationshipOptions::default(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn checkpoint_includes_seed_and_one_hop_neighbor() {
        let svc = kgs();
        seed_chain(&svc).await;
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let dispatch = dispatcher(&provider);

        let id = create_checkpoint(
            &svc,
            &dispatch,
            &["sym:foo".to_string()],
            CheckpointReason::Manual,
            1,
            CreateCheckpointOptions::default(),
        )
        .await
        .unwrap();

        let members = get_checkpoint_members(svc.graph(), &id).await.unwrap();
        assert!(members.contains(&"sym:foo".to_string()));
        assert!(members.contains(&"sym:bar".to_string()));
        assert!(!members.contains(&"sym:baz".to_string()));
    }

    #[tokio::test]
    async fn checkpoint_hops_two_reaches_second_degree_neighbor() {
        let svc = kgs();
        seed_chain(&svc).await;
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let dispatch = dispatcher(&provider);

        let id = create_checkpoint(
            &svc,
            &dispatch,
            &["sym:foo".to_string()],
            CheckpointReason::Manual,
            2,
            CreateCheckpointOptions::default(),
        )
        .await
        .unwrap();

        let members = get_checkpoint_members(svc.graph(), &id).await.unwrap();
        assert!(members.contains(&"sym:baz".to_string()));
        assert!(!members.contains(&"sym:far".to_string()));
    }

    #[tokio::test]
    async fn hops_clamped_to_five() {
        let svc = kgs();
        seed_chain(&svc).await;
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let dispatch = dispatcher(&provider);

        let id = create_checkpoint(
            &svc,
            &dispatch,
            &["sym:foo".to_string()],
            CheckpointReason::Manual,
            200,
            CreateCheckpointOptions::default(),
        )
        .await
        .unwrap();
        let members = get_checkpoint_members(svc.graph(), &id).await.unwrap();
        assert!(members.contains(&"sym:far".to_string()));
    }

    #[tokio::test]
    async fn export_then_import_links_same_members_on_fresh_graph() {
        let svc = kgs();
        seed_chain(&svc).await;
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let dispatch = dispatcher(&provider);
        let id = create_checkpoint(
            &svc,
            &dispatch,
            &["sym:foo".to_string()],
            CheckpointReason::Manual,
            2,
            CreateCheckpointOptions::default(),
        )
        .await
        .unwrap();

        let data = export_checkpoint(&svc, &id).await.unwrap().unwrap();

        let fresh = kgs();
        for member in &data.members {
            fresh
                .create_entity(Entity::new(member.clone(), EntityType::Symbol), CreateEntityOptions { skip_embedding: true })
                .await
                .unwrap();
        }
        let imported_id = import_checkpoint(&fresh, data.clone(), ImportCheckpointOptions { use_original_id: true })
            .await
            .unwrap();
        assert_eq!(imported_id, id);

        let reimported_members = get_checkpoint_members(fresh.graph(), &imported_id).await.unwrap();
        let mut expected = data.members.clone();
        let mut actual = reimported_members.clone();
        expected.sort();
        actual.sort();
        assert_eq!(expected, actual);
    }

    #[tokio::test]
    async fn import_skips_members_that_do_not_exist_in_target_graph() {
        let svc = kgs();
        seed_chain(&svc).await;
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let dispatch = dispatcher(&provider);
        let id = create_checkpoint(
            &svc,
            &dispatch,
            &["sym:foo".to_string()],
            CheckpointReason::Manual,
            1,
            CreateCheckpointOptions::default(),
        )
        .await
        .unwrap();
        let data = export_checkpoint(&svc, &id).await.unwrap().unwrap();

        let fresh = kgs();
        let imported_id = import_checkpoint(&fresh, data, ImportCheckpointOptions { use_original_id: false })
            .await
            .unwrap();
        let members = get_checkpoint_members(fresh.graph(), &imported_id).await.unwrap();
        assert!(members.is_empty());
    }
}
