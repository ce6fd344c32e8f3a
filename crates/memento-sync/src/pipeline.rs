//! The per-file processing pipeline (spec §4.1 "Per-file pipeline"):
//! parse, detect conflicts, upsert entities, resolve and upsert
//! relationships, parking anything unresolved for the coordinator's
//! post-batch pass.

use crate::conflict::{self, EntityResolution};
use crate::operation::{Conflict, ConflictResolution, RecordedError};
use crate::parser::{ParsedRelationship, RelationshipTarget, RepositorySource, Severity};
use chrono::{DateTime, Utc};
use memento_core::ids::to_base36;
use memento_core::{Entity, ErrorKind, Relationship, Result};
use memento_embeddings::EmbeddingProvider;
use memento_graph_store::GraphStore;
use memento_kgs::{CreateEntityOptions, CreateRelationshipOptions, KnowledgeGraphService};
use memento_temporal::{AppendVersionOptions, TemporalLayer};
use memento_vector_store::VectorStore;

/// A relationship the pipeline couldn't resolve a target for yet, tagged
/// with the file it was discovered in (needed for a later
/// `findNearbySymbols` retry — spec §4.1 "Unresolved relationships are
/// parked in a per-operation `unresolvedRelationships` set").
#[derive(Debug, Clone)]
pub struct UnresolvedRelationship {
    pub calling_file: String,
    pub parsed: ParsedRelationship,
}

/// Everything one file contributed to an operation: counters, accumulated
/// errors/conflicts, the relationships it successfully resolved (for the
/// evidence-bulk pass), and relationships still needing a target.
#[derive(Default)]
pub struct FileOutcome {
    pub entities_created: u64,
    pub entities_updated: u64,
    pub relationships_created: u64,
    pub errors: Vec<RecordedError>,
    pub conflicts: Vec<Conflict>,
    pub resolved: Vec<Relationship>,
    pub unresolved: Vec<UnresolvedRelationship>,
}

/// Run the pipeline for a single file. Never returns `Err`: parser and store
/// failures are folded into [`FileOutcome::errors`] so the caller can keep
/// processing the rest of the batch (spec §4.1 "parse errors ... do not
/// abort the operation").
pub async fn process_file<G, V, P>(
    kgs: &KnowledgeGraphService<G, V, P>,
    temporal: Option<&TemporalLayer<G, V, P>>,
    source: &dyn RepositorySource,
    path: &str,
    resolution: ConflictResolution,
    history_enabled: bool,
    now: DateTime<Utc>,
) -> FileOutcome
where
    G: GraphStore,
    V: VectorStore,
    P: EmbeddingProvider,
{
    let mut outcome = FileOutcome::default();

    let parsed = match source.parse_file(path).await {
        Ok(p) => p,
        Err(e) => {
            outcome.errors.push(RecordedError::new(Some(path.to_string()), e.kind(), e.to_string()));
            return outcome;
        }
    };

    for err in &parsed.errors {
        let kind = match err.severity {
            Severity::Error => ErrorKind::Parse,
            Severity::Warning => ErrorKind::Validation,
        };
        outcome.errors.push(RecordedError::new(Some(err.file.clone()), kind, err.message.clone()));
    }

    for entity in parsed.entities {
        process_entity(kgs, temporal, entity, resolution, &mut outcome, now).await;
    }

    for rel in parsed.relationships {
        let result = resolve_and_upsert(kgs, temporal, rel, path, resolution, history_enabled, now).await;
        outcome.errors.extend(result.errors);
        outcome.conflicts.extend(result.conflicts);
        if let Some(rel) = result.created {
            outcome.relationships_created += 1;
            outcome.resolved.push(rel);
        }
        if let Some(parsed) = result.unresolved {
            outcome.unresolved.push(UnresolvedRelationship { calling_file: path.to_string(), parsed });
        }
    }

    outcome
}

/// The stored entity matching `inbound`'s identity, whether keyed by id or,
/// for codebase entities, by `(type, path)` (invariant I2) — conflict
/// detection needs the state that `createEntity`'s own MERGE would match
/// against, not just an id lookup.
async fn find_existing_entity<G, V, P>(
    kgs: &KnowledgeGraphService<G, V, P>,
    inbound: &Entity,
) -> Result<Option<Entity>>
where
    G: GraphStore,
    V: VectorStore,
    P: EmbeddingProvider,
{
    if let Some(existing) = kgs.get_entity(&inbound.id).await? {
        return Ok(Some(existing));
    }
    if let Some((_, path)) = inbound.upsert_key() {
        let candidates = kgs.find_entities_by_path(path).await?;
        return Ok(candidates.into_iter().find(|e| e.entity_type == inbound.entity_type));
    }
    Ok(None)
}

async fn process_entity<G, V, P>(
    kgs: &KnowledgeGraphService<G, V, P>,
    temporal: Option<&TemporalLayer<G, V, P>>,
    inbound: Entity,
    resolution: ConflictResolution,
    outcome: &mut FileOutcome,
    now: DateTime<Utc>,
) where
    G: GraphStore,
    V: VectorStore,
    P: EmbeddingProvider,
{
    let existing = match find_existing_entity(kgs, &inbound).await {
        Ok(e) => e,
        Err(e) => {
            outcome.errors.push(RecordedError::new(inbound.path.clone(), e.kind(), e.to_string()));
            return;
        }
    };

    let is_update = existing.is_some();
    let to_persist = match conflict::detect_version_conflict(existing.as_ref(), &inbound) {
        Some(c) => {
            outcome.conflicts.push(c);
            match conflict::resolve_entity(resolution, existing, inbound) {
                EntityResolution::Persist(e) => e,
                EntityResolution::Skip => return,
            }
        }
        // No version conflict: apply inbound as-is regardless of policy —
        // `conflictResolution` only governs state that actually conflicts.
        None => inbound,
    };
    let hash = to_persist.content_hash.clone().unwrap_or_else(|| to_base36(now.timestamp_millis().unsigned_abs()));

    match kgs.create_entity(to_persist, CreateEntityOptions::default()).await {
        Ok(id) => {
            if is_update {
                outcome.entities_updated += 1;
            } else {
                outcome.entities_created += 1;
            }
            if let Some(temporal) = temporal {
                let opts = AppendVersionOptions { timestamp: Some(now), ..Default::default() };
                if let Err(e) = temporal.append_version(&id, &hash, opts).await {
                    outcome.errors.push(RecordedError::new(None, e.kind(), e.to_string()));
                }
            }
        }
        Err(e) => outcome.errors.push(RecordedError::new(None, e.kind(), e.to_string())),
    }
}

/// Resolve a [`RelationshipTarget`] to a concrete entity id, preferring the
/// file-scoped lookup and falling back to directory-proximity ranking (spec
/// §4.2 `findSymbolInFile`/`findNearbySymbols`).
async fn resolve_target<G, V, P>(
    kgs: &KnowledgeGraphService<G, V, P>,
    target: &RelationshipTarget,
    calling_file: &str,
) -> Result<Option<String>>
where
    G: GraphStore,
    V: VectorStore,
    P: EmbeddingProvider,
{
    match target {
        RelationshipTarget::EntityId(id) => Ok(Some(id.clone())),
        RelationshipTarget::SymbolRef { name, file_hint } => {
            let scope = file_hint.as_deref().unwrap_or(calling_file);
            if let Some(entity) = kgs.find_symbol_in_file(scope, name).await? {
                return Ok(Some(entity.id));
            }
            let nearby = kgs.find_nearby_symbols(calling_file, name).await?;
            Ok(nearby.into_iter().next().map(|e| e.id))
        }
    }
}

/// Outcome of attempting to resolve and upsert one relationship. At most one
/// of `created`/`unresolved` is set; `errors`/`conflicts` may be non-empty
/// either way.
#[derive(Default)]
pub struct RelationshipOutcome {
    pub created: Option<Relationship>,
    pub unresolved: Option<ParsedRelationship>,
    pub errors: Vec<RecordedError>,
    pub conflicts: Vec<Conflict>,
}

/// Resolve `parsed`'s target and, if found, detect/resolve a relationship
/// conflict and upsert it. Used both inline (per file) and by the
/// coordinator's post-batch retry over [`UnresolvedRelationship`]s.
pub async fn resolve_and_upsert<G, V, P>(
    kgs: &KnowledgeGraphService<G, V, P>,
    temporal: Option<&TemporalLayer<G, V, P>>,
    parsed: ParsedRelationship,
    calling_file: &str,
    resolution: ConflictResolution,
    history_enabled: bool,
    now: DateTime<Utc>,
) -> RelationshipOutcome
where
    G: GraphStore,
    V: VectorStore,
    P: EmbeddingProvider,
{
    let mut outcome = RelationshipOutcome::default();

    let target_id = match resolve_target(kgs, &parsed.target, calling_file).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            outcome.unresolved = Some(parsed);
            return outcome;
        }
        Err(e) => {
            outcome.errors.push(RecordedError::new(Some(calling_file.to_string()), e.kind(), e.to_string()));
            outcome.unresolved = Some(parsed);
            return outcome;
        }
    };

    let mut rel = Relationship::new(parsed.from_entity_id.clone(), target_id, parsed.rel_type, parsed.created, None);
    rel.metadata = parsed.metadata;
    rel.valid_from = history_enabled.then_some(now);
    rel.occurrences = 1;
    rel.evidence = vec![calling_file.to_string()];
    if let Some(loc) = parsed.location {
        rel.locations = vec![loc];
    }

    let existing = match kgs
        .get_relationships(memento_graph_store::RelationshipFilter {
            from: Some(rel.from_entity_id.clone()),
            to: Some(rel.to_entity_id.clone()),
            ..Default::default()
        })
        .await
    {
        Ok(rows) => rows.into_iter().next(),
        Err(e) => {
            outcome.errors.push(RecordedError::new(Some(calling_file.to_string()), e.kind(), e.to_string()));
            return outcome;
        }
    };

    let detected = conflict::detect_relationship_conflict(existing.as_ref().map(|r| r.rel_type.as_str()), &rel);
    let to_persist = match detected {
        Some(c) => {
            outcome.conflicts.push(c);
            match resolution {
                ConflictResolution::Overwrite => rel,
                ConflictResolution::Merge => {
                    let existing = existing.expect("relationship conflict implies an existing edge");
                    conflict::merge_relationship(existing, rel)
                }
                ConflictResolution::Skip | ConflictResolution::Manual => return outcome,
            }
        }
        None => rel,
    };

    match kgs.create_relationship(to_persist.clone(), CreateRelationshipOptions::default()).await {
        Ok(()) => {
            if let Some(temporal) = temporal {
                let opened = temporal
                    .open_edge(&to_persist.from_entity_id, &to_persist.to_entity_id, &to_persist.rel_type, Some(now), None)
                    .await;
                if let Err(e) = opened {
                    outcome.errors.push(RecordedError::new(Some(calling_file.to_string()), e.kind(), e.to_string()));
                }
            }
            outcome.created = Some(to_persist);
        }
        Err(e) => outcome.errors.push(RecordedError::new(Some(calling_file.to_string()), e.kind(), e.to_string())),
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{IncrementalParseResult, ParseResult, RelationshipTarget};
    use async_trait::async_trait;
    use memento_core::{EntityType, EventBus, RelationshipType};
    use memento_embeddings::MockEmbeddingProvider;
    use memento_graph_store::InMemoryGraphStore;
    use memento_vector_store::InMemoryVectorStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixtureSource {
        files: Mutex<HashMap<String, ParseResult>>,
    }

    #[async_trait]
    impl RepositorySource for FixtureSource {
        async fn parse_file(&self, path: &str) -> Result<ParseResult> {
            Ok(self.files.lock().unwrap().get(path).cloned().unwrap_or_default())
        }

        async fn list_files(&self) -> Result<Vec<String>> {
            Ok(self.files.lock().unwrap().keys().cloned().collect())
        }
    }

    fn service() -> KnowledgeGraphService<InMemoryGraphStore, InMemoryVectorStore, MockEmbeddingProvider> {
        KnowledgeGraphService::new(
            std::sync::Arc::new(InMemoryGraphStore::new()),
            std::sync::Arc::new(MockEmbeddingProvider::new(8)),
            std::sync::Arc::new(InMemoryVectorStore::new()),
            EventBus::new(),
        )
    }

    fn file_entity(id: &str) -> Entity {
        let mut e = Entity::new(id, EntityType::File);
        e.path = Some(id.to_string());
        e
    }

    fn symbol_entity(path: &str, id: &str, name: &str) -> Entity {
        let mut e = Entity::new(id, EntityType::Symbol);
        e.path = Some(path.to_string());
        e.name = Some(name.to_string());
        e
    }

    #[tokio::test]
    async fn full_scan_creates_entities_and_resolves_a_call_edge() {
        let svc = service();
        let now = Utc::now();

        let mut a = ParseResult::default();
        a.entities.push(file_entity("src/a.ts"));
        a.entities.push(symbol_entity("src/a.ts", "sym:foo", "foo"));

        let mut b = ParseResult::default();
        b.entities.push(file_entity("src/b.ts"));
        b.relationships.push(ParsedRelationship {
            from_entity_id: "src/b.ts".to_string(),
            rel_type: RelationshipType::Calls,
            target: RelationshipTarget::SymbolRef { name: "foo".to_string(), file_hint: None },
            created: now,
            metadata: HashMap::new(),
            location: None,
        });

        let mut files = HashMap::new();
        files.insert("src/a.ts".to_string(), a);
        files.insert("src/b.ts".to_string(), b);
        let source = FixtureSource { files: Mutex::new(files) };

        let outcome_a = process_file(&svc, None, &source, "src/a.ts", ConflictResolution::Overwrite, true, now).await;
        assert_eq!(outcome_a.entities_created, 2);
        assert!(outcome_a.unresolved.is_empty());

        let outcome_b = process_file(&svc, None, &source, "src/b.ts", ConflictResolution::Overwrite, true, now).await;
        assert_eq!(outcome_b.entities_created, 1);
        assert_eq!(outcome_b.relationships_created, 1);
        assert!(outcome_b.unresolved.is_empty());
        assert_eq!(outcome_b.resolved[0].to_entity_id, "sym:foo");
    }

    #[tokio::test]
    async fn relationship_parks_unresolved_when_target_is_missing() {
        let svc = service();
        let now = Utc::now();

        let mut b = ParseResult::default();
        b.relationships.push(ParsedRelationship {
            from_entity_id: "src/b.ts".to_string(),
            rel_type: RelationshipType::Calls,
            target: RelationshipTarget::SymbolRef { name: "missing".to_string(), file_hint: None },
            created: now,
            metadata: HashMap::new(),
            location: None,
        });
        let mut files = HashMap::new();
        files.insert("src/b.ts".to_string(), b);
        let source = FixtureSource { files: Mutex::new(files) };

        let outcome = process_file(&svc, None, &source, "src/b.ts", ConflictResolution::Overwrite, true, now).await;
        assert_eq!(outcome.relationships_created, 0);
        assert_eq!(outcome.unresolved.len(), 1);
        assert_eq!(outcome.unresolved[0].calling_file, "src/b.ts");
    }

    #[tokio::test]
    async fn parser_io_failure_is_recorded_without_panicking() {
        struct FailingSource;
        #[async_trait]
        impl RepositorySource for FailingSource {
            async fn parse_file(&self, _path: &str) -> Result<ParseResult> {
                Err(memento_core::Error::other("disk read failed"))
            }
            async fn list_files(&self) -> Result<Vec<String>> {
                Ok(Vec::new())
            }
        }

        let svc = service();
        let outcome = process_file(&svc, None, &FailingSource, "src/a.ts", ConflictResolution::Overwrite, true, Utc::now()).await;
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.entities_created, 0);
    }

    #[allow(dead_code)]
    fn unused_incremental_type_reference(_: IncrementalParseResult) {}
}
