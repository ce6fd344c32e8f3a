//! The Parser contract (spec §6): `parseFile(path) -> ParseResult{entities,
//! relationships, errors}`. Language-specific AST extraction is out of scope
//! (spec §1); this module only defines the boundary the coordinator calls
//! across, and assumes implementations are pure and deterministic per file
//! content hash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use memento_core::{Entity, Location, RelationshipType, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `errors` carry `{file, line, column, message, severity}` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub severity: Severity,
}

/// Where a [`ParsedRelationship`] points. AST extraction emits symbol
/// references by name, not by graph id — the pipeline resolves these via
/// the §4.2 lookups (`findSymbolInFile`/`findNearbySymbols`) before upsert
/// (spec §4.1 "placeholder relationship").
#[derive(Debug, Clone)]
pub enum RelationshipTarget {
    /// The target's entity id is already known (e.g. a file-to-file
    /// `DEPENDS_ON` edge where both paths were already upserted).
    EntityId(String),
    /// A symbol reference that must be resolved by name, optionally scoped
    /// to a file hint (the calling file, for `findNearbySymbols` ranking).
    SymbolRef { name: String, file_hint: Option<String> },
}

/// One relationship as emitted by the parser, target unresolved until the
/// pipeline looks it up.
#[derive(Debug, Clone)]
pub struct ParsedRelationship {
    pub from_entity_id: String,
    pub rel_type: RelationshipType,
    pub target: RelationshipTarget,
    pub created: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Call-site location, folded into the edge's `evidence`/`locations` on
    /// upsert (spec §4.2 `upsertEdgeEvidenceBulk`).
    pub location: Option<Location>,
}

/// `parseFile(path) -> ParseResult{entities, relationships, errors}` (spec §6).
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<ParsedRelationship>,
    pub errors: Vec<ParseError>,
}

/// `parseFileIncremental(path) -> IncrementalParseResult{..., isIncremental,
/// addedEntities[], removedEntities[], updatedEntities[]}` (spec §6).
#[derive(Debug, Clone)]
pub struct IncrementalParseResult {
    pub base: ParseResult,
    pub is_incremental: bool,
    pub added_entities: Vec<String>,
    pub removed_entities: Vec<String>,
    pub updated_entities: Vec<String>,
}

/// The boundary the coordinator calls across for file-level extraction. Full
/// scans additionally need to enumerate the repository; that's `list_files`,
/// a small coordinator-side extension of the parser contract (full-scan
/// enumeration isn't named in spec §6, but `startFullSync` has nothing else
/// to discover files from — the analyzer/transport layers that would own
/// this are out of scope per spec §1).
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// `parseFile(path)` (spec §6). Parse errors are returned inline on
    /// [`ParseResult::errors`], not as an `Err` — only I/O-level failures
    /// that prevent parsing at all should be `Err`.
    async fn parse_file(&self, path: &str) -> Result<ParseResult>;

    /// `parseFileIncremental(path)` (spec §6). The default delegates to
    /// [`Self::parse_file`] and reports no incremental diff, which is always
    /// a valid (if less precise) implementation.
    async fn parse_file_incremental(&self, path: &str) -> Result<IncrementalParseResult> {
        let base = self.parse_file(path).await?;
        Ok(IncrementalParseResult {
            added_entities: base.entities.iter().map(|e| e.id.clone()).collect(),
            removed_entities: Vec::new(),
            updated_entities: Vec::new(),
            base,
            is_incremental: false,
        })
    }

    /// Enumerate every file path a full scan should parse.
    async fn list_files(&self) -> Result<Vec<String>>;
}
