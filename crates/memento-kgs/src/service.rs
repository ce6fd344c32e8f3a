//! The Knowledge Graph Service (spec §4.2): entity/relationship CRUD, bulk
//! upserts, queries, caching, edge evidence, and index management over a
//! generic [`GraphStore`] + [`VectorStore`] + [`EmbeddingProvider`] stack.

use crate::cache::TtlLruCache;
use crate::codec::{entity_to_props, label_for, props_to_entity, props_to_relationship, relationship_metadata};
use crate::search::{compile_exact_match_fallback, compile_structural, SearchMode, SearchRequest};
use chrono::{DateTime, Utc};
use memento_core::{Entity, Error, Event, EventBus, Relationship, RelationshipType, Result};
use memento_embeddings::{EmbeddingDispatcher, EmbeddingProvider, EmbeddingTarget};
use memento_graph_store::{GraphStore, IndexStatus, IndexTarget, RelUpsertRow, RelationshipFilter};
use memento_vector_store::VectorStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const ENTITY_CACHE_CAPACITY: usize = 1000;
const ENTITY_CACHE_TTL: Duration = Duration::from_secs(600);
const SEARCH_CACHE_CAPACITY: usize = 500;
const SEARCH_CACHE_TTL: Duration = Duration::from_secs(300);

/// Options for [`KnowledgeGraphService::create_entity`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateEntityOptions {
    pub skip_embedding: bool,
}

/// Options for [`KnowledgeGraphService::create_relationship`].
#[derive(Debug, Clone, Copy)]
pub struct CreateRelationshipOptions {
    pub validate: bool,
}

impl Default for CreateRelationshipOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

/// Text embedded for an entity (name/signature/docstring concatenation, or
/// the path when nothing else is available). Kept simple: the embedding
/// provider doesn't care about formatting, only content.
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

/// `createEntitiesBulk`/`createRelationshipsBulk` outcome.
#[derive(Debug, Clone, Default)]
pub struct BulkUpsertOutcome {
    pub entities_created: usize,
    /// In-memory ids that were rewritten to a persisted id during a
    /// path-keyed bulk upsert (spec §4.2).
    pub id_rewrites: HashMap<String, String>,
}

pub struct KnowledgeGraphService<G: GraphStore, V: VectorStore, P: EmbeddingProvider> {
    graph: Arc<G>,
    dispatcher: EmbeddingDispatcher<P, V>,
    events: EventBus,
    entity_cache: TtlLruCache<String, Entity>,
    search_cache: TtlLruCache<String, Vec<Entity>>,
}

impl<G: GraphStore, V: VectorStore, P: EmbeddingProvider> KnowledgeGraphService<G, V, P> {
    pub fn new(graph: Arc<G>, provider: Arc<P>, vector_store: Arc<V>, events: EventBus) -> Self {
        Self {
            graph,
            dispatcher: EmbeddingDispatcher::new(provider, vector_store),
            events,
            entity_cache: TtlLruCache::new(ENTITY_CACHE_CAPACITY, ENTITY_CACHE_TTL),
            search_cache: TtlLruCache::new(SEARCH_CACHE_CAPACITY, SEARCH_CACHE_TTL),
        }
    }

    /// The underlying graph store, for callers (e.g. `memento-temporal`) that
    /// need direct access alongside the cached/embedding-aware operations
    /// this service provides.
    #[must_use]
    pub fn graph(&self) -> &Arc<G> {
        &self.graph
    }

    fn invalidate_on_entity_write(&self, id: &str) {
        self.entity_cache.invalidate(&id.to_string());
        self.search_cache.clear();
    }

    // -- Entity upsert --------------------------------------------------

    /// `createEntity(e, {skipEmbedding?})` (spec §4.2).
    pub async fn create_entity(&self, entity: Entity, opts: CreateEntityOptions) -> Result<String> {
        let label = label_for(&entity.entity_type);
        let props = entity_to_props(&entity);

        let persisted_id = if let Some((_, path)) = entity.upsert_key() {
            self.graph.merge_node_by_path(&label, path, &entity.id, props).await?
        } else {
            self.graph.merge_node_by_id(&[label.as_str()], &entity.id, props).await?;
            entity.id.clone()
        };

        self.invalidate_on_entity_write(&persisted_id);
        self.events.emit(Event::EntityCreated { id: persisted_id.clone() });

        if !opts.skip_embedding {
            let mut persisted_entity = entity.clone();
            persisted_entity.id = persisted_id.clone();
            let content = embedding_content(&persisted_entity);
            let target = EmbeddingTarget::from_entity(&persisted_entity, content);
            if let Err(e) = self.dispatcher.upsert_entities(vec![target]).await {
                warn!(error = %e, entity_id = %persisted_id, "embedding upsert failed for entity");
            }
        }

        Ok(persisted_id)
    }

    /// `createEntitiesBulk(entities)` (spec §4.2): one `UNWIND` per
    /// (label, keying-strategy) group, path-keyed ids rewritten before
    /// embedding.
    pub async fn create_entities_bulk(
        &self,
        entities: Vec<Entity>,
        opts: CreateEntityOptions,
    ) -> Result<BulkUpsertOutcome> {
        let mut by_path_label: HashMap<String, Vec<(String, String, HashMap<String, serde_json::Value>)>> =
            HashMap::new();
        let mut by_id_label: HashMap<String, Vec<(String, HashMap<String, serde_json::Value>)>> = HashMap::new();
        let mut originals: Vec<Entity> = Vec::with_capacity(entities.len());

        for entity in entities {
            let label = label_for(&entity.entity_type);
            let props = entity_to_props(&entity);
            if let Some((_, path)) = entity.upsert_key() {
                by_path_label
                    .entry(label)
                    .or_default()
                    .push((path.to_string(), entity.id.clone(), props));
            } else {
                by_id_label.entry(label).or_default().push((entity.id.clone(), props));
            }
            originals.push(entity);
        }

        let mut id_rewrites = HashMap::new();
        for (label, rows) in by_path_label {
            let persisted = self.graph.bulk_merge_nodes_by_path(&label, rows).await?;
            id_rewrites.extend(persisted);
        }
        for (label, rows) in by_id_label {
            self.graph.bulk_merge_nodes_by_id(&label, rows).await?;
        }

        let mut embed_targets = Vec::new();
        for mut entity in originals {
            let persisted_id = id_rewrites.get(&entity.id).cloned().unwrap_or_else(|| entity.id.clone());
            entity.id = persisted_id.clone();
            self.invalidate_on_entity_write(&persisted_id);
            self.events.emit(Event::EntityCreated { id: persisted_id });
            if !opts.skip_embedding {
                let content = embedding_content(&entity);
                embed_targets.push(EmbeddingTarget::from_entity(&entity, content));
            }
        }

        let entities_created = embed_targets.len().max(id_rewrites.len());
        if !opts.skip_embedding && !embed_targets.is_empty() {
            if let Err(e) = self.dispatcher.upsert_entities(embed_targets).await {
                warn!(error = %e, "bulk embedding upsert failed");
            }
        }

        Ok(BulkUpsertOutcome {
            entities_created,
            id_rewrites,
        })
    }

    // -- Relationship upsert ---------------------------------------------

    /// `createRelationship(rel, {validate?=true})` (spec §4.2).
    pub async fn create_relationship(
        &self,
        rel: Relationship,
        opts: CreateRelationshipOptions,
    ) -> Result<()> {
        if opts.validate {
            let ids = [rel.from_entity_id.clone(), rel.to_entity_id.clone()];
            let existence = self.graph.nodes_exist(&ids).await?;
            for id in &ids {
                if !existence.get(id).copied().unwrap_or(false) {
                    return Err(Error::MissingEndpoint(id.clone()));
                }
            }
        }

        let row = RelUpsertRow {
            id: rel.id.clone(),
            from_entity_id: rel.from_entity_id.clone(),
            to_entity_id: rel.to_entity_id.clone(),
            created: rel.created,
            last_modified: rel.last_modified,
            version: rel.version,
            metadata: relationship_metadata(&rel),
            valid_from: rel.valid_from,
        };
        self.graph.merge_relationship(rel.rel_type.as_str(), row).await?;
        self.events.emit(Event::RelationshipCreated { id: rel.id });
        Ok(())
    }

    /// `createRelationshipsBulk(rels, {validate?=true})` (spec §4.2): groups
    /// by type, optionally bulk-validates endpoint existence before issuing
    /// one `UNWIND` per type. Fails the whole call if any endpoint is
    /// missing (see `DESIGN.md` open-question decision).
    pub async fn create_relationships_bulk(
        &self,
        rels: Vec<Relationship>,
        opts: CreateRelationshipOptions,
    ) -> Result<()> {
        if opts.validate {
            let mut ids: Vec<String> = Vec::new();
            for rel in &rels {
                ids.push(rel.from_entity_id.clone());
                ids.push(rel.to_entity_id.clone());
            }
            ids.sort();
            ids.dedup();
            let existence = self.graph.nodes_exist(&ids).await?;
            for id in &ids {
                if !existence.get(id).copied().unwrap_or(false) {
                    return Err(Error::MissingEndpoint(id.clone()));
                }
            }
        }

        let mut by_type: HashMap<String, Vec<RelUpsertRow>> = HashMap::new();
        for rel in rels {
            let row = RelUpsertRow {
                id: rel.id.clone(),
                from_entity_id: rel.from_entity_id.clone(),
                to_entity_id: rel.to_entity_id.clone(),
                created: rel.created,
                last_modified: rel.last_modified,
                version: rel.version,
                metadata: relationship_metadata(&rel),
                valid_from: rel.valid_from,
            };
            by_type.entry(rel.rel_type.as_str().to_string()).or_default().push(row);
        }

        for (rel_type, rows) in by_type {
            for row in &rows {
                self.events.emit(Event::RelationshipCreated { id: row.id.clone() });
            }
            self.graph.bulk_merge_relationships(&rel_type, rows).await?;
        }
        Ok(())
    }

    // -- Queries -----------------------------------------------------------

    /// `getEntity(id)` with the entity cache (spec §4.2).
    pub async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        if let Some(cached) = self.entity_cache.get(&id.to_string()) {
            return Ok(Some(cached));
        }
        let Some(props) = self.graph.get_node(id).await? else {
            return Ok(None);
        };
        let entity = props_to_entity(&props);
        if let Some(e) = &entity {
            self.entity_cache.put(id.to_string(), e.clone());
        }
        Ok(entity)
    }

    /// `findEntitiesByType` (spec §4.2): all entities whose `type` matches,
    /// regardless of `kind`.
    pub async fn find_entities_by_type(
        &self,
        entity_type: &memento_core::EntityType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Entity>> {
        let predicate = memento_graph_store::NodeSearchPredicate {
            type_kind: vec![(entity_type.as_str().to_string(), None)],
            limit: Some(limit),
            offset: Some(offset),
            ..Default::default()
        };
        let rows = self.graph.search_nodes(predicate).await?;
        Ok(rows.iter().filter_map(props_to_entity).collect())
    }

    /// `findSymbolsByName` (spec §4.2).
    pub async fn find_symbols_by_name(&self, name: &str) -> Result<Vec<Entity>> {
        let predicate = memento_graph_store::NodeSearchPredicate {
            type_kind: vec![("symbol".to_string(), None)],
            text_terms: vec![name.to_lowercase()],
            ..Default::default()
        };
        let rows = self.graph.search_nodes(predicate).await?;
        Ok(rows
            .iter()
            .filter_map(props_to_entity)
            .filter(|e| e.name.as_deref() == Some(name))
            .collect())
    }

    /// `findSymbolByKindAndName` (spec §4.2).
    pub async fn find_symbol_by_kind_and_name(
        &self,
        kind: &memento_core::SymbolKind,
        name: &str,
    ) -> Result<Vec<Entity>> {
        let predicate = memento_graph_store::NodeSearchPredicate {
            type_kind: vec![("symbol".to_string(), Some(kind.as_str().to_string()))],
            text_terms: vec![name.to_lowercase()],
            ..Default::default()
        };
        let rows = self.graph.search_nodes(predicate).await?;
        Ok(rows
            .iter()
            .filter_map(props_to_entity)
            .filter(|e| e.name.as_deref() == Some(name))
            .collect())
    }

    /// `findSymbolInFile(path, name)` — the composite symbol path
    /// `"<filePath>:<name>"` (spec §4.2).
    pub async fn find_symbol_in_file(&self, file_path: &str, name: &str) -> Result<Option<Entity>> {
        let id = format!("sym:{}", Entity::symbol_path(file_path, name));
        if let Some(entity) = self.get_entity(&id).await? {
            return Ok(Some(entity));
        }
        // Fall back to a path+name search in case the id scheme differs.
        let predicate = memento_graph_store::NodeSearchPredicate {
            type_kind: vec![("symbol".to_string(), None)],
            path: Some(memento_graph_store::PathPredicate::Contains(file_path.to_string())),
            text_terms: vec![name.to_lowercase()],
            limit: Some(1),
            ..Default::default()
        };
        let rows = self.graph.search_nodes(predicate).await?;
        Ok(rows
            .iter()
            .filter_map(props_to_entity)
            .find(|e| e.name.as_deref() == Some(name)))
    }

    /// `findNearbySymbols(file, name)`: symbols matching `name`, ranked by
    /// directory-prefix distance to `file` (spec §4.2).
    pub async fn find_nearby_symbols(&self, file: &str, name: &str) -> Result<Vec<Entity>> {
        let mut matches = self.find_symbols_by_name(name).await?;
        let file_dir = directory_of(file);
        matches.sort_by_key(|e| {
            let other_dir = e.path.as_deref().map(directory_of).unwrap_or_default();
            directory_distance(&file_dir, &other_dir)
        });
        Ok(matches)
    }

    /// `getRelationships(query)` (spec §4.2).
    pub async fn get_relationships(&self, filter: RelationshipFilter) -> Result<Vec<Relationship>> {
        let rows = self.graph.get_relationships(filter).await?;
        Ok(rows.iter().filter_map(props_to_relationship).collect())
    }

    /// `search(request)` (spec §4.2): semantic mode embeds the query and
    /// searches the vector store, falling back to structural on zero hits or
    /// errors (including unsupported-function errors, per B3); structural
    /// mode compiles directly to a [`memento_graph_store::NodeSearchPredicate`].
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<Entity>> {
        request.validate()?;

        let cache_key = search_cache_key(&request);
        if let Some(cached) = self.search_cache.get(&cache_key) {
            return Ok(cached);
        }

        let results = match request.mode {
            SearchMode::Semantic => match self.search_semantic(&request).await {
                Ok(hits) if !hits.is_empty() => hits,
                Ok(_) => self.search_structural(&request).await?,
                Err(e) => {
                    warn!(error = %e, "semantic search failed, falling back to structural");
                    self.search_structural(&request).await?
                }
            },
            SearchMode::Structural => self.search_structural(&request).await?,
        };

        self.search_cache.put(cache_key, results.clone());
        Ok(results)
    }

    async fn search_semantic(&self, request: &SearchRequest) -> Result<Vec<Entity>> {
        let embedding = self.dispatcher.provider().embed(&request.query).await?;
        let filter = request
            .checkpoint_id
            .as_ref()
            .map(|cid| memento_vector_store::PointFilter::eq("checkpointId", cid.clone()));

        let mut hits = self
            .dispatcher
            .store()
            .search(
                memento_embeddings::CODE_COLLECTION,
                &embedding.embedding,
                request.limit,
                filter.clone(),
            )
            .await?;
        hits.extend(
            self.dispatcher
                .store()
                .search(
                    memento_embeddings::DOCUMENTATION_COLLECTION,
                    &embedding.embedding,
                    request.limit,
                    filter,
                )
                .await?,
        );
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(request.limit);

        let mut entities = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(entity_id) = hit.payload.get("entityId").and_then(|v| v.as_str()) else {
                continue;
            };
            if let Some(entity) = self.get_entity(entity_id).await? {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    async fn search_structural(&self, request: &SearchRequest) -> Result<Vec<Entity>> {
        let predicate = compile_structural(request);
        match self.graph.search_nodes(predicate).await {
            Ok(rows) => Ok(rows.iter().filter_map(props_to_entity).collect()),
            Err(_) => {
                // B3: unsupported-function errors fall back to exact-match only.
                let fallback = compile_exact_match_fallback(request);
                let rows = self.graph.search_nodes(fallback).await?;
                Ok(rows.iter().filter_map(props_to_entity).collect())
            }
        }
    }

    /// `findPaths({start,end?,types?,maxDepth=5})` (spec §4.2). `maxDepth` is
    /// clamped to `[1,5]` (B1).
    pub async fn find_paths(
        &self,
        start: &str,
        end: Option<&str>,
        rel_types: &[RelationshipType],
        max_depth: u8,
    ) -> Result<Vec<Vec<String>>> {
        let depth = max_depth.clamp(1, 5);
        let types: Vec<&str> = rel_types.iter().map(RelationshipType::as_str).collect();
        self.graph.find_paths(start, end, &types, depth).await
    }

    /// `traverseGraph({start,types?,maxDepth=3,limit=50})` (spec §4.2).
    pub async fn traverse_graph(
        &self,
        start: &str,
        rel_types: &[RelationshipType],
        max_depth: u8,
        limit: usize,
    ) -> Result<Vec<String>> {
        let depth = max_depth.clamp(1, 5);
        let types: Vec<&str> = rel_types.iter().map(RelationshipType::as_str).collect();
        self.graph.traverse(start, &types, depth, limit).await
    }

    // -- Edge evidence & maintenance ---------------------------------------

    /// `upsertEdgeEvidenceBulk(rels)` (spec §4.2). Returns the count of
    /// edges actually updated (existing edges only).
    pub async fn upsert_edge_evidence_bulk(
        &self,
        rels: &[Relationship],
        last_seen_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut updated = 0;
        for rel in rels {
            let locations = rel
                .locations
                .iter()
                .map(|l| (l.path.clone(), l.line, l.column))
                .collect();
            let did_update = self
                .graph
                .upsert_edge_evidence(&rel.id, rel.occurrences, rel.evidence.clone(), locations, last_seen_at)
                .await?;
            if did_update {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// `markInactiveEdgesNotSeenSince(cutoff, {toRefFile?})` (spec §4.2).
    pub async fn mark_inactive_edges_not_seen_since(
        &self,
        cutoff: DateTime<Utc>,
        to_ref_file: Option<&str>,
    ) -> Result<usize> {
        self.graph
            .mark_inactive_edges_not_seen_since(cutoff, Some(cutoff), to_ref_file)
            .await
    }

    // -- Index management ---------------------------------------------------

    const EXPECTED_INDEXES: &'static [(&'static str, &'static str)] = &[
        ("file", "path"),
        ("symbol", "path"),
        ("version", "entityId"),
        ("checkpoint", "checkpointId"),
    ];

    /// `ensureGraphIndexes()` (spec §4.2): best-effort, swallows failures.
    pub async fn ensure_graph_indexes(&self) {
        for (label, property) in Self::EXPECTED_INDEXES {
            let target = IndexTarget::Node {
                label: (*label).to_string(),
                property: (*property).to_string(),
            };
            if let Err(e) = self.graph.ensure_index(target).await {
                warn!(error = %e, label, property, "failed to ensure node index");
            }
        }
        for property in ["validFrom", "validTo"] {
            let target = IndexTarget::Relationship {
                rel_type: "*".to_string(),
                property: property.to_string(),
            };
            if let Err(e) = self.graph.ensure_index(target).await {
                warn!(error = %e, property, "failed to ensure relationship property index");
            }
        }
    }

    /// `getIndexHealth()` (spec §4.2).
    pub async fn get_index_health(&self) -> Result<Vec<IndexStatus>> {
        let expected: Vec<IndexTarget> = Self::EXPECTED_INDEXES
            .iter()
            .map(|(label, property)| IndexTarget::Node {
                label: (*label).to_string(),
                property: (*property).to_string(),
            })
            .collect();
        self.graph.index_health(&expected).await
    }

    // -- Deletion ------------------------------------------------------------

    /// `deleteEntity(id)` (spec §3 "Lifecycle", §9 "Dual-store consistency"):
    /// detaches and deletes the node, then best-effort deletes its vector
    /// points. A crash between the two leaves stale vectors but not orphaned
    /// nodes; periodic reconciliation by `entityId` payload filter is the
    /// recovery path. Returns whether a node existed.
    pub async fn delete_entity(&self, id: &str) -> Result<bool> {
        let existed = self.graph.detach_delete_node(id).await?;
        if existed {
            self.invalidate_on_entity_write(id);
            self.events.emit(Event::EntityDeleted { id: id.to_string() });
            if let Err(e) = self.dispatcher.delete_embedding(id).await {
                warn!(error = %e, entity_id = %id, "vector deletion failed after node delete");
            }
        }
        Ok(existed)
    }

    /// `getEntitiesByFile(path)` (spec §8 scenario 3): codebase entities whose
    /// `path` equals exactly this file.
    pub async fn find_entities_by_path(&self, path: &str) -> Result<Vec<Entity>> {
        let predicate = memento_graph_store::NodeSearchPredicate {
            path: Some(memento_graph_store::PathPredicate::Contains(path.to_string())),
            limit: Some(10_000),
            ..Default::default()
        };
        let rows = self.graph.search_nodes(predicate).await?;
        Ok(rows
            .iter()
            .filter_map(props_to_entity)
            .filter(|e| e.path.as_deref() == Some(path))
            .collect())
    }
}

fn directory_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}

/// Count of non-shared leading path segments between two directories — a
/// simple, symmetric notion of "distance" for `findNearbySymbols` ranking.
fn directory_distance(a: &str, b: &str) -> usize {
    let a_parts: Vec<&str> = a.split('/').filter(|s| !s.is_empty()).collect();
    let b_parts: Vec<&str> = b.split('/').filter(|s| !s.is_empty()).collect();
    let common = a_parts.iter().zip(b_parts.iter()).take_while(|(x, y)| x == y).count();
    (a_parts.len() - common) + (b_parts.len() - common)
}

fn search_cache_key(request: &SearchRequest) -> String {
    format!(
        "{:?}|{}|{:?}|{:?}|{:?}|{:?}|{:?}|{}|{}",
        request.mode,
        request.query,
        request.logical_types,
        request.path,
        request.language,
        request.checkpoint_id,
        request.last_modified_since,
        request.limit,
        request.offset,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use memento_core::entity::SymbolKind;
    use memento_core::EntityType;
    use memento_embeddings::MockEmbeddingProvider;
    use memento_graph_store::InMemoryGraphStore;
    use memento_vector_store::InMemoryVectorStore;

    fn service() -> KnowledgeGraphService<InMemoryGraphStore, InMemoryVectorStore, MockEmbeddingProvider> {
        KnowledgeGraphService::new(
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(MockEmbeddingProvider::new(8)),
            Arc::new(InMemoryVectorStore::new()),
            EventBus::new(),
        )
    }

    fn symbol(path: &str, name: &str) -> Entity {
        let mut e = Entity::new(format!("sym:{name}"), EntityType::Symbol);
        e.path = Some(path.to_string());
        e.name = Some(name.to_string());
        e.kind = Some(SymbolKind::Function);
        e
    }

    #[tokio::test]
    async fn create_entity_then_get_entity_round_trips() {
        let svc = service();
        let mut e = Entity::new("file:1", EntityType::File);
        e.path = Some("src/a.ts".to_string());
        let id = svc.create_entity(e, CreateEntityOptions { skip_embedding: true }).await.unwrap();

        let fetched = svc.get_entity(&id).await.unwrap().unwrap();
        assert_eq!(fetched.path.as_deref(), Some("src/a.ts"));
    }

    #[tokio::test]
    async fn create_entity_preserves_id_on_repeat_path_keyed_upsert() {
        let svc = service();
        let mut e1 = Entity::new("file:1", EntityType::File);
        e1.path = Some("src/a.ts".to_string());
        let id1 = svc
            .create_entity(e1, CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();

        let mut e2 = Entity::new("file:2", EntityType::File);
        e2.path = Some("src/a.ts".to_string());
        let id2 = svc
            .create_entity(e2, CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();

        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn create_relationship_fails_on_missing_endpoint() {
        let svc = service();
        let rel = Relationship::new(
            "missing-a",
            "missing-b",
            RelationshipType::Calls,
            Utc::now(),
            None,
        );
        let err = svc
            .create_relationship(rel, CreateRelationshipOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), memento_core::ErrorKind::Database);
    }

    #[tokio::test]
    async fn create_relationship_succeeds_when_endpoints_exist() {
        let svc = service();
        let a = Entity::new("a", EntityType::Symbol);
        let b = Entity::new("b", EntityType::Symbol);
        svc.create_entity(a, CreateEntityOptions { skip_embedding: true }).await.unwrap();
        svc.create_entity(b, CreateEntityOptions { skip_embedding: true }).await.unwrap();

        let rel = Relationship::new("a", "b", RelationshipType::Calls, Utc::now(), None);
        svc.create_relationship(rel, CreateRelationshipOptions::default()).await.unwrap();

        let rels = svc
            .get_relationships(RelationshipFilter {
                from: Some("a".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].to_entity_id, "b");
    }

    #[tokio::test]
    async fn find_entities_by_type_matches_regardless_of_kind() {
        let svc = service();
        svc.create_entity(symbol("src/a.ts", "foo"), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();
        let mut class_entity = symbol("src/b.ts", "Widget");
        class_entity.kind = Some(SymbolKind::Class);
        svc.create_entity(class_entity, CreateEntityOptions { skip_embedding: true }).await.unwrap();

        let found = svc.find_entities_by_type(&EntityType::Symbol, 10, 0).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn find_nearby_symbols_ranks_by_directory_distance() {
        let svc = service();
        svc.create_entity(symbol("src/a/near.ts", "helper"), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();
        svc.create_entity(symbol("src/a/x.ts", "helper"), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();
        svc.create_entity(symbol("other/far.ts", "helper"), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();

        let ranked = svc.find_nearby_symbols("src/a/caller.ts", "helper").await.unwrap();
        assert_eq!(ranked.len(), 3);
        assert!(ranked[0].path.as_deref().unwrap().starts_with("src/a/"));
    }

    #[tokio::test]
    async fn search_validates_zero_limit() {
        let svc = service();
        let mut req = SearchRequest::new("foo", SearchMode::Structural);
        req.limit = 0;
        assert!(svc.search(req).await.is_err());
    }

    #[tokio::test]
    async fn structural_search_finds_by_text_term() {
        let svc = service();
        svc.create_entity(symbol("src/a.ts", "foo"), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();

        let mut req = SearchRequest::new("foo", SearchMode::Structural);
        req.logical_types = vec!["function".to_string()];
        let results = svc.search(req).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name.as_deref(), Some("foo"));
    }

    #[tokio::test]
    async fn bulk_create_entities_rewrites_ids_on_path_collision() {
        let svc = service();
        let mut e1 = Entity::new("tmp:1", EntityType::File);
        e1.path = Some("src/a.ts".to_string());
        svc.create_entity(e1, CreateEntityOptions { skip_embedding: true }).await.unwrap();

        let mut e2 = Entity::new("tmp:2", EntityType::File);
        e2.path = Some("src/a.ts".to_string());
        let outcome = svc
            .create_entities_bulk(vec![e2], CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();

        assert_eq!(outcome.id_rewrites.get("tmp:2"), Some(&"tmp:1".to_string()));
    }

    #[tokio::test]
    async fn ensure_graph_indexes_then_health_reports_present() {
        let svc = service();
        svc.ensure_graph_indexes().await;
        let health = svc.get_index_health().await.unwrap();
        assert!(health.iter().any(|s| s.present));
    }

    #[tokio::test]
    async fn delete_entity_removes_node_and_reports_existence() {
        let svc = service();
        let mut e = Entity::new("file:1", EntityType::File);
        e.path = Some("src/a.ts".to_string());
        let id = svc.create_entity(e, CreateEntityOptions { skip_embedding: true }).await.unwrap();

        assert!(svc.delete_entity(&id).await.unwrap());
        assert!(svc.get_entity(&id).await.unwrap().is_none());
        assert!(!svc.delete_entity(&id).await.unwrap());
    }

    #[tokio::test]
    async fn find_entities_by_path_matches_exact_path_only() {
        let svc = service();
        svc.create_entity(symbol("src/a.ts", "foo"), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();
        svc.create_entity(symbol("src/a.ts", "bar"), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();
        svc.create_entity(symbol("src/a.test.ts", "baz"), CreateEntityOptions { skip_embedding: true })
            .await
            .unwrap();

        let found = svc.find_entities_by_path("src/a.ts").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|e| e.path.as_deref() == Some("src/a.ts")));
    }
}
