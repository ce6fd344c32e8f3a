//! `getHistoryMetrics()` (spec §4.3 "Metrics").

use crate::checkpoint::get_checkpoint_members;
use crate::prune::PruneSummary;
use memento_core::{EntityType, Result};
use memento_embeddings::EmbeddingProvider;
use memento_graph_store::{GraphStore, RelationshipFilter};
use memento_kgs::KnowledgeGraphService;
use memento_vector_store::VectorStore;
use serde_json::Value;
use std::collections::HashMap;

const LIST_LIMIT: usize = 100_000;

/// Types whose population is worth breaking out individually; everything
/// else (analyzer-minted `EntityType::Other`) is out of scope for now.
const NODE_TYPES: &[EntityType] = &[
    EntityType::File,
    EntityType::Symbol,
    EntityType::Module,
    EntityType::Test,
    EntityType::Documentation,
    EntityType::Version,
    EntityType::Checkpoint,
    EntityType::SecurityIssue,
    EntityType::Vulnerability,
];

/// Snapshot returned by `getHistoryMetrics()`.
#[derive(Debug, Clone)]
pub struct HistoryMetrics {
    pub node_counts: HashMap<String, usize>,
    pub total_nodes: usize,
    pub edge_counts_by_type: HashMap<String, usize>,
    pub total_edges: usize,
    pub open_edges: usize,
    pub closed_edges: usize,
    pub version_count: usize,
    pub checkpoint_count: usize,
    pub checkpoint_member_counts: HashMap<String, usize>,
    pub last_prune: Option<PruneSummary>,
}

/// `getHistoryMetrics()` (spec §4.3): counts of nodes, edges, versions,
/// checkpoints, open/closed edges, per-checkpoint member stats, and the last
/// prune run's summary.
pub async fn get_history_metrics<G: GraphStore, V: VectorStore, P: EmbeddingProvider>(
    kgs: &KnowledgeGraphService<G, V, P>,
    last_prune: Option<PruneSummary>,
) -> Result<HistoryMetrics> {
    let mut node_counts = HashMap::new();
    let mut total_nodes = 0;
    for entity_type in NODE_TYPES {
        let entities = kgs.find_entities_by_type(entity_type, LIST_LIMIT, 0).await?;
        total_nodes += entities.len();
        node_counts.insert(entity_type.as_str().to_string(), entities.len());
    }

    let rows = kgs.graph().get_relationships(RelationshipFilter::default()).await?;
    let mut edge_counts_by_type: HashMap<String, usize> = HashMap::new();
    let mut open_edges = 0;
    let mut closed_edges = 0;
    for row in &rows {
        if let Some(t) = row.get("type").and_then(Value::as_str) {
            *edge_counts_by_type.entry(t.to_string()).or_insert(0) += 1;
        }
        let is_open = row.get("active").and_then(Value::as_bool).unwrap_or_else(|| row.get("validTo").is_none());
        if is_open {
            open_edges += 1;
        } else {
            closed_edges += 1;
        }
    }

    let checkpoints = kgs.find_entities_by_type(&EntityType::Checkpoint, LIST_LIMIT, 0).await?;
    let mut checkpoint_member_counts = HashMap::with_capacity(checkpoints.len());
    for checkpoint in &checkpoints {
        let members = get_checkpoint_members(kgs.graph(), &checkpoint.id).await?;
        checkpoint_member_counts.insert(checkpoint.id.clone(), members.len());
    }

    Ok(HistoryMetrics {
        version_count: *node_counts.get(EntityType::Version.as_str()).unwrap_or(&0),
        checkpoint_count: checkpoints.len(),
        node_counts,
        total_nodes,
        total_edges: rows.len(),
        edge_counts_by_type,
        open_edges,
        closed_edges,
        checkpoint_member_counts,
        last_prune,
    })
}
