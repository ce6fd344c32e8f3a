//! Shared request/response types for the [`crate::GraphStore`] trait.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// A parameterized query's keyed arguments. Relationship *types* never go
/// here — spec §6 requires them as literal query text, validated by the
/// caller against an allow-list (see [`memento_core::RelationshipType::is_allowed`]).
#[derive(Debug, Clone, Default)]
pub struct QueryParams(pub HashMap<String, Value>);

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

/// One row of a bulk relationship upsert (spec §4.2 `createRelationshipsBulk`).
#[derive(Debug, Clone)]
pub struct RelUpsertRow {
    pub id: String,
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub version: u64,
    pub metadata: HashMap<String, Value>,
    pub valid_from: Option<DateTime<Utc>>,
}

/// Filter for `getRelationships` (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct RelationshipFilter {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Literal relationship type text, already allow-list-validated by the caller.
    pub rel_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// What kind of schema element an index targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexTarget {
    /// An index on a node label's property, e.g. `file(path)`.
    Node { label: String, property: String },
    /// An index on a relationship type's property, e.g. edges' `validFrom`.
    Relationship { rel_type: String, property: String },
}

/// Result of an index-health check for one [`IndexTarget`] (spec §4.2
/// `getIndexHealth`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub target: IndexTarget,
    pub present: bool,
    /// `false` when the store cannot introspect indexes at all (e.g.
    /// `CALL db.indexes()` unsupported); `present` is then meaningless.
    pub supported: bool,
}

/// One `(type, kind)` pair a structural search may require, plus the free-text
/// predicate's OR'd terms (spec §4.2 "Structural" search). Every field here is
/// an AND; `type_kind` itself is an OR (an entity matches if it matches any
/// listed pair).
#[derive(Debug, Clone, Default)]
pub struct NodeSearchPredicate {
    /// `(type, kind)` pairs; an entity matches if its `type` equals any
    /// pair's first element, and — when that pair's `kind` is `Some` — its
    /// `kind` equals that value too. `kind: None` leaves kind unconstrained
    /// (matches any entity of that type, e.g. `findEntitiesByType`).
    pub type_kind: Vec<(String, Option<String>)>,
    /// `STARTS WITH` for paths beginning with `/`, `CONTAINS` otherwise (the
    /// caller decides which per spec §4.2; this struct just carries the mode).
    pub path: Option<PathPredicate>,
    pub language: Option<String>,
    pub last_modified_since: Option<DateTime<Utc>>,
    pub last_modified_until: Option<DateTime<Utc>>,
    /// Intersect with a checkpoint's member set (`CHECKPOINT_INCLUDES`).
    pub checkpoint_id: Option<String>,
    /// Exact id match (used when the query text is a UUID).
    pub exact_id: Option<String>,
    /// OR'd substring/prefix/equality terms over `name`, `docstring`, `path`, `id`.
    pub text_terms: Vec<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum PathPredicate {
    StartsWith(String),
    Contains(String),
}
