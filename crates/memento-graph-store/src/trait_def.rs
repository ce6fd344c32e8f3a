//! Generic interface for the labeled property graph backing the engine
//! (spec §6 "Graph Store contract").
//!
//! Implementations must be safe for concurrent calls from multiple worker
//! threads (spec §5 "Store adapters must be safe for concurrent calls from
//! worker threads") and must not hold internal locks across network I/O.

use crate::types::{
    IndexStatus, IndexTarget, NodeSearchPredicate, QueryParams, RelUpsertRow, RelationshipFilter,
};
use async_trait::async_trait;
use memento_core::Result;
use serde_json::Value;
use std::collections::HashMap;

/// Abstract property-graph store. Method shapes mirror the Cypher patterns
/// spec §4.2 specifies (`MERGE ... ON CREATE SET`, `UNWIND`, variable-length
/// paths, `DETACH DELETE`) without forcing callers to hand-build query text
/// for the common cases; [`GraphStore::query`] remains as an escape hatch for
/// ad-hoc structural/semantic search predicates.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute an arbitrary parameterized query and return rows as keyed
    /// maps. Used for `search`, `findPaths`, `traverseGraph` predicates that
    /// don't fit the structured methods below.
    async fn query(&self, cypher: &str, params: QueryParams) -> Result<Vec<HashMap<String, Value>>>;

    /// `MERGE (n:<labels> {id}) SET n += $props` — the non-codebase-entity
    /// upsert pattern (spec §4.2).
    async fn merge_node_by_id(
        &self,
        labels: &[&str],
        id: &str,
        props: HashMap<String, Value>,
    ) -> Result<()>;

    /// `MERGE (n:<label> {type, path}) ON CREATE SET n.id = $id SET n += $props`
    /// — the codebase-entity upsert pattern (spec §4.2, invariant I2). Returns
    /// the *persisted* id, which is `id_if_new` on first insert and the
    /// previously stored id on every subsequent call with the same
    /// `(label, path)`.
    async fn merge_node_by_path(
        &self,
        label: &str,
        path: &str,
        id_if_new: &str,
        props: HashMap<String, Value>,
    ) -> Result<String>;

    /// One `UNWIND` per (label, keying-strategy) group for a batch of
    /// id-keyed nodes (spec §4.2 `createEntitiesBulk`).
    async fn bulk_merge_nodes_by_id(
        &self,
        label: &str,
        rows: Vec<(String, HashMap<String, Value>)>,
    ) -> Result<()>;

    /// One `UNWIND` for a batch of path-keyed nodes, followed by a single
    /// fetch of persisted ids so callers can rewrite in-memory ids before
    /// embedding (spec §4.2). Returns a map from `id_if_new` to persisted id.
    async fn bulk_merge_nodes_by_path(
        &self,
        label: &str,
        rows: Vec<(String, String, HashMap<String, Value>)>,
    ) -> Result<HashMap<String, String>>;

    /// Fetch a single node's flattened properties by id.
    async fn get_node(&self, id: &str) -> Result<Option<HashMap<String, Value>>>;

    /// Whether a node with this id exists.
    async fn node_exists(&self, id: &str) -> Result<bool>;

    /// Bulk existence check, used by `createRelationshipsBulk`'s optional
    /// endpoint validation pass (spec §4.2).
    async fn nodes_exist(&self, ids: &[String]) -> Result<HashMap<String, bool>>;

    /// `MERGE (a {id:$from})-[r:<TYPE> {id:$id}]->(b {id:$to}) ON CREATE SET
    /// ... SET r.lastModified=$ts`. `rel_type` is literal text the caller has
    /// already allow-list-validated (spec §6).
    async fn merge_relationship(
        &self,
        rel_type: &str,
        row: RelUpsertRow,
    ) -> Result<()>;

    /// One `UNWIND` per relationship-type group (spec §4.2 `createRelationshipsBulk`).
    async fn bulk_merge_relationships(&self, rel_type: &str, rows: Vec<RelUpsertRow>) -> Result<()>;

    /// Merge `occurrences`/`evidence`/`locations`/`lastSeenAt` onto an
    /// existing edge by id (spec §4.2 `upsertEdgeEvidenceBulk`).
    async fn upsert_edge_evidence(
        &self,
        rel_id: &str,
        occurrences_delta: u64,
        evidence: Vec<String>,
        locations: Vec<(String, u32, u32)>,
        last_seen_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool>;

    /// Set arbitrary properties on an existing relationship by id (used by
    /// `openEdge`/`closeEdge` in `memento-temporal`). Returns `false` if no
    /// matching edge exists.
    async fn set_relationship_props(
        &self,
        rel_id: &str,
        props: HashMap<String, Value>,
    ) -> Result<bool>;

    /// `getRelationships(query)` (spec §4.2).
    async fn get_relationships(
        &self,
        filter: RelationshipFilter,
    ) -> Result<Vec<HashMap<String, Value>>>;

    /// Set `active=false` (and optionally `validTo`) on code edges whose
    /// `lastSeenAt` is older than `cutoff`, optionally restricted to edges
    /// whose target is `to_ref_file` (spec §4.2 `markInactiveEdgesNotSeenSince`).
    async fn mark_inactive_edges_not_seen_since(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
        valid_to: Option<chrono::DateTime<chrono::Utc>>,
        to_ref_file: Option<&str>,
    ) -> Result<usize>;

    /// `DETACH DELETE` a node and all incident relationships. Returns
    /// whether a node existed.
    async fn detach_delete_node(&self, id: &str) -> Result<bool>;

    /// Delete a single relationship by id, leaving its endpoints untouched
    /// (used by `memento-temporal`'s `pruneHistory`). Returns whether a
    /// matching edge existed.
    async fn delete_relationship(&self, rel_id: &str) -> Result<bool>;

    /// Variable-length path search, `[:T*1..maxDepth]`. `rel_types` is an
    /// allow-list-validated literal set; empty means "any type". `end` binds
    /// the path's terminal node when given. Returns paths as ordered node-id
    /// vectors.
    async fn find_paths(
        &self,
        start: &str,
        end: Option<&str>,
        rel_types: &[&str],
        max_depth: u8,
    ) -> Result<Vec<Vec<String>>>;

    /// Distinct reachable node ids within `max_depth` hops, capped at `limit`
    /// (spec §4.2 `traverseGraph`).
    async fn traverse(
        &self,
        start: &str,
        rel_types: &[&str],
        max_depth: u8,
        limit: usize,
    ) -> Result<Vec<String>>;

    /// Structural search: the compiled-predicate side of `search` (spec
    /// §4.2 "Structural": type/kind, path, language, lastModified range,
    /// checkpoint intersection, OR'd text terms). Returns flattened node
    /// properties, including `id`.
    async fn search_nodes(&self, predicate: NodeSearchPredicate) -> Result<Vec<HashMap<String, Value>>>;

    /// Best-effort index creation; failures are swallowed by the caller, not
    /// this method (spec §4.2 `ensureGraphIndexes`). Returns whether the
    /// index now exists (or already did).
    async fn ensure_index(&self, target: IndexTarget) -> Result<bool>;

    /// `getIndexHealth` (spec §4.2).
    async fn index_health(&self, expected: &[IndexTarget]) -> Result<Vec<IndexStatus>>;

    /// Whether this store can introspect indexes at all (`CALL db.indexes()`
    /// support, spec §6).
    fn supports_index_introspection(&self) -> bool;
}
