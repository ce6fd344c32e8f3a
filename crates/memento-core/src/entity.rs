//! Entity (node) domain types — spec §3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Primary type tag for an entity. Codebase entities (`File`, `Symbol`,
/// `Module`, `Test`, `Documentation`) additionally carry filesystem
/// provenance via [`Entity::path`]/[`Entity::content_hash`]/[`Entity::language`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EntityType {
    /// A source file.
    File,
    /// A symbol (function, class, interface, ...) inside a file.
    Symbol,
    /// A logical grouping of files (package, crate, namespace).
    Module,
    /// A test case or test file.
    Test,
    /// A documentation entity.
    Documentation,
    /// A version snapshot node (spec §4.3).
    Version,
    /// A checkpoint node (spec §4.3).
    Checkpoint,
    /// A security finding attached to an entity.
    SecurityIssue,
    /// A known-vulnerable dependency.
    Vulnerability,
    /// Any entity type not enumerated above; analyzers may mint their own.
    Other(String),
}

impl EntityType {
    /// Whether this is one of the five "codebase entity" types that carry
    /// `path`/`content_hash`/`language` provenance (spec §3, invariant I2).
    #[must_use]
    pub fn is_codebase_entity(&self) -> bool {
        matches!(
            self,
            Self::File | Self::Symbol | Self::Module | Self::Test | Self::Documentation
        )
    }

    /// The exact wire string used as the `type` property in the graph store.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Symbol => "symbol",
            Self::Module => "module",
            Self::Test => "test",
            Self::Documentation => "documentation",
            Self::Version => "version",
            Self::Checkpoint => "checkpoint",
            Self::SecurityIssue => "securityIssue",
            Self::Vulnerability => "vulnerability",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self {
        match s {
            "file" => Self::File,
            "symbol" => Self::Symbol,
            "module" => Self::Module,
            "test" => Self::Test,
            "documentation" => Self::Documentation,
            "version" => Self::Version,
            "checkpoint" => Self::Checkpoint,
            "securityIssue" => Self::SecurityIssue,
            "vulnerability" => Self::Vulnerability,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<EntityType> for String {
    fn from(t: EntityType) -> Self {
        t.as_str().to_string()
    }
}

impl TryFrom<String> for EntityType {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(Self::from(s.as_str()))
    }
}

/// Kind of a symbol entity (function, class, interface, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Method,
    Variable,
    Enum,
    TypeAlias,
    Other(String),
}

impl SymbolKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Method => "method",
            Self::Variable => "variable",
            Self::Enum => "enum",
            Self::TypeAlias => "typeAlias",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SymbolKind {
    fn from(s: &str) -> Self {
        match s {
            "function" => Self::Function,
            "class" => Self::Class,
            "interface" => Self::Interface,
            "method" => Self::Method,
            "variable" => Self::Variable,
            "enum" => Self::Enum,
            "typeAlias" => Self::TypeAlias,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<SymbolKind> for String {
    fn from(k: SymbolKind) -> Self {
        k.as_str().to_string()
    }
}

impl TryFrom<String> for SymbolKind {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(Self::from(s.as_str()))
    }
}

/// A node in the knowledge graph.
///
/// Codebase entities (`type.is_codebase_entity()`) are keyed for upsert
/// purposes by `(type, path)` rather than `id` — see invariant I2 and
/// [`crate::ids`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique, stable id (invariant I1).
    pub id: String,
    /// Primary type tag.
    pub entity_type: EntityType,

    // Codebase-entity provenance.
    pub path: Option<String>,
    pub content_hash: Option<String>,
    pub language: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,

    // Symbol-only fields.
    pub name: Option<String>,
    pub kind: Option<SymbolKind>,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub visibility: Option<String>,
    pub is_exported: Option<bool>,

    // File-only fields.
    pub is_test: Option<bool>,
    pub is_config: Option<bool>,
    pub dependencies: Option<Vec<String>>,

    /// Arbitrary metadata, serialized as a JSON string when flattened for
    /// the graph store (spec §9 "Flattening for the graph store").
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Entity {
    /// Construct a minimal entity of the given type and id.
    #[must_use]
    pub fn new(id: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: id.into(),
            entity_type,
            path: None,
            content_hash: None,
            language: None,
            last_modified: None,
            created: None,
            name: None,
            kind: None,
            signature: None,
            docstring: None,
            visibility: None,
            is_exported: None,
            is_test: None,
            is_config: None,
            dependencies: None,
            metadata: HashMap::new(),
        }
    }

    /// The composite symbol path `"<filePath>:<name>"` used by
    /// `findSymbolInFile` (spec §4.2).
    #[must_use]
    pub fn symbol_path(file_path: &str, name: &str) -> String {
        format!("{file_path}:{name}")
    }

    /// The upsert key for codebase entities: `(type, path)` (invariant I2).
    /// Returns `None` for non-codebase entities, which key on `id` instead.
    #[must_use]
    pub fn upsert_key(&self) -> Option<(&str, &str)> {
        if self.entity_type.is_codebase_entity() {
            self.path.as_deref().map(|p| (self.entity_type.as_str(), p))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_round_trips_known_values() {
        for raw in [
            "file",
            "symbol",
            "module",
            "test",
            "documentation",
            "version",
            "checkpoint",
            "securityIssue",
            "vulnerability",
        ] {
            let t = EntityType::from(raw);
            assert_eq!(t.as_str(), raw);
        }
    }

    #[test]
    fn entity_type_other_preserves_unknown_strings() {
        let t = EntityType::from("customAnalyzerFinding");
        assert_eq!(t.as_str(), "customAnalyzerFinding");
        assert!(!t.is_codebase_entity());
    }

    #[test]
    fn codebase_entities_are_identified_correctly() {
        assert!(EntityType::File.is_codebase_entity());
        assert!(EntityType::Symbol.is_codebase_entity());
        assert!(EntityType::Module.is_codebase_entity());
        assert!(EntityType::Test.is_codebase_entity());
        assert!(EntityType::Documentation.is_codebase_entity());
        assert!(!EntityType::Version.is_codebase_entity());
        assert!(!EntityType::Checkpoint.is_codebase_entity());
        assert!(!EntityType::SecurityIssue.is_codebase_entity());
    }

    #[test]
    fn symbol_path_composes_file_and_name() {
        assert_eq!(Entity::symbol_path("src/a.ts", "foo"), "src/a.ts:foo");
    }

    #[test]
    fn upsert_key_present_only_for_codebase_entities_with_path() {
        let mut e = Entity::new("sym:foo", EntityType::Symbol);
        assert_eq!(e.upsert_key(), None);
        e.path = Some("src/a.ts".into());
        assert_eq!(e.upsert_key(), Some(("symbol", "src/a.ts")));

        let v = Entity::new("ver_1", EntityType::Version);
        assert_eq!(v.upsert_key(), None);
    }

    #[test]
    fn serde_round_trip_preserves_entity_type() {
        let e = Entity::new("f:1", EntityType::File);
        let json = serde_json::to_string(&e).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entity_type, EntityType::File);
    }
}
