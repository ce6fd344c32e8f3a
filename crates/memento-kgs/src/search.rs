//! Compiles `search(request)` (spec §4.2) into either a vector-store query
//! (semantic mode) or a [`NodeSearchPredicate`] (structural mode).

use chrono::{DateTime, Utc};
use memento_core::{Error, Result};
use memento_graph_store::{NodeSearchPredicate, PathPredicate};

/// Which of the two search strategies spec §4.2 describes to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Embed the query, search the vector store, hydrate hits via `getEntity`.
    /// Falls back to structural on zero hits or a provider/store error.
    Semantic,
    /// Compiled predicate over `type`/`kind`/`path`/`language`/`lastModified`/`checkpointId`.
    Structural,
}

/// A `search(request)` call (spec §4.2).
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    /// Logical types from the caller: `function|class|interface|file|module`.
    pub logical_types: Vec<String>,
    pub path: Option<String>,
    pub language: Option<String>,
    pub last_modified_since: Option<DateTime<Utc>>,
    pub last_modified_until: Option<DateTime<Utc>>,
    pub checkpoint_id: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            query: query.into(),
            mode,
            logical_types: Vec::new(),
            path: None,
            language: None,
            last_modified_since: None,
            last_modified_until: None,
            checkpoint_id: None,
            limit: 10,
            offset: 0,
        }
    }

    /// B2: "Semantic search with `limit ≤ 0` ... throws validation."
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::Validation("search limit must be > 0".into()));
        }
        Ok(())
    }
}

/// The ordered `logicalType -> (type, kind)` mapping spec §4.2 requires.
#[must_use]
pub fn map_logical_type(logical: &str) -> Option<(String, Option<String>)> {
    match logical {
        "function" => Some(("symbol".to_string(), Some("function".to_string()))),
        "class" => Some(("symbol".to_string(), Some("class".to_string()))),
        "interface" => Some(("symbol".to_string(), Some("interface".to_string()))),
        "file" => Some(("file".to_string(), None)),
        "module" => Some(("module".to_string(), None)),
        _ => None,
    }
}

/// Text predicate compilation (spec §4.2 "Text predicate"): an exact id match
/// when the query is a UUID, otherwise whitespace-split lowercase terms OR'd
/// across `name/docstring/path/id`.
#[must_use]
pub fn compile_text_predicate(query: &str) -> (Option<String>, Vec<String>) {
    if uuid::Uuid::parse_str(query).is_ok() {
        (Some(query.to_string()), Vec::new())
    } else {
        let terms = query
            .split_whitespace()
            .map(str::to_lowercase)
            .filter(|t| !t.is_empty())
            .collect();
        (None, terms)
    }
}

/// Compile a [`SearchRequest`] into a [`NodeSearchPredicate`] for the
/// structural path (also used as the B3 fallback for a failed semantic or
/// unsupported-function query, in which case callers should strip
/// `text_terms` down to the exact-id case only).
#[must_use]
pub fn compile_structural(request: &SearchRequest) -> NodeSearchPredicate {
    let (exact_id, text_terms) = compile_text_predicate(&request.query);
    let type_kind = request
        .logical_types
        .iter()
        .filter_map(|t| map_logical_type(t))
        .collect();
    let path = request.path.as_ref().map(|p| {
        if p.starts_with('/') {
            PathPredicate::StartsWith(p.clone())
        } else {
            PathPredicate::Contains(p.clone())
        }
    });

    NodeSearchPredicate {
        type_kind,
        path,
        language: request.language.clone(),
        last_modified_since: request.last_modified_since,
        last_modified_until: request.last_modified_until,
        checkpoint_id: request.checkpoint_id.clone(),
        exact_id,
        text_terms,
        limit: Some(request.limit),
        offset: Some(request.offset),
    }
}

/// B3 fallback: exact-match-only structural predicate, used when a query
/// fails on an unsupported store function.
#[must_use]
pub fn compile_exact_match_fallback(request: &SearchRequest) -> NodeSearchPredicate {
    let mut predicate = compile_structural(request);
    predicate.text_terms.clear();
    predicate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_zero_limit() {
        let mut req = SearchRequest::new("foo", SearchMode::Semantic);
        req.limit = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_accepts_positive_limit() {
        let req = SearchRequest::new("foo", SearchMode::Semantic);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn maps_known_logical_types() {
        assert_eq!(
            map_logical_type("function"),
            Some(("symbol".to_string(), Some("function".to_string())))
        );
        assert_eq!(map_logical_type("file"), Some(("file".to_string(), None)));
        assert_eq!(map_logical_type("unknown"), None);
    }

    #[test]
    fn uuid_query_compiles_to_exact_id() {
        let (exact, terms) = compile_text_predicate("550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(exact, Some("550e8400-e29b-41d4-a716-446655440000".to_string()));
        assert!(terms.is_empty());
    }

    #[test]
    fn plain_text_query_splits_into_lowercase_terms() {
        let (exact, terms) = compile_text_predicate("Foo Bar");
        assert_eq!(exact, None);
        assert_eq!(terms, vec!["foo".to_string(), "bar".to_string()]);
    }

    #[test]
    fn absolute_path_uses_starts_with() {
        let mut req = SearchRequest::new("foo", SearchMode::Structural);
        req.path = Some("/src/a.ts".to_string());
        let predicate = compile_structural(&req);
        assert!(matches!(predicate.path, Some(PathPredicate::StartsWith(_))));
    }

    #[test]
    fn relative_path_uses_contains() {
        let mut req = SearchRequest::new("foo", SearchMode::Structural);
        req.path = Some("src/a.ts".to_string());
        let predicate = compile_structural(&req);
        assert!(matches!(predicate.path, Some(PathPredicate::Contains(_))));
    }

    #[test]
    fn exact_match_fallback_strips_text_terms() {
        let req = SearchRequest::new("foo bar", SearchMode::Structural);
        let predicate = compile_exact_match_fallback(&req);
        assert!(predicate.text_terms.is_empty());
    }
}
