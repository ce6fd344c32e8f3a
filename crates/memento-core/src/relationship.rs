//! Relationship (edge) domain types — spec §3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The enumerated relationship types spec.md names explicitly. Relationship
/// type cannot be a Cypher query parameter (spec §6) and must be emitted as
/// literal text, so every constructor of a query string must route through
/// [`RelationshipType::as_str`] and validate against this allow-list — never
/// interpolate an arbitrary caller-supplied string directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RelationshipType {
    Calls,
    References,
    DependsOn,
    Tests,
    CoverageProvides,
    HasSecurityIssue,
    DependsOnVulnerable,
    SecurityImpacts,
    PerformanceImpact,
    PerformanceRegression,
    Of,
    PreviousVersion,
    CheckpointIncludes,
    /// Any other relationship type an analyzer mints, still subject to the
    /// allow-list the caller configures for query construction.
    Other(String),
}

impl RelationshipType {
    /// The exact literal text used in Cypher-style `[:TYPE]` patterns.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Calls => "CALLS",
            Self::References => "REFERENCES",
            Self::DependsOn => "DEPENDS_ON",
            Self::Tests => "TESTS",
            Self::CoverageProvides => "COVERAGE_PROVIDES",
            Self::HasSecurityIssue => "HAS_SECURITY_ISSUE",
            Self::DependsOnVulnerable => "DEPENDS_ON_VULNERABLE",
            Self::SecurityImpacts => "SECURITY_IMPACTS",
            Self::PerformanceImpact => "PERFORMANCE_IMPACT",
            Self::PerformanceRegression => "PERFORMANCE_REGRESSION",
            Self::Of => "OF",
            Self::PreviousVersion => "PREVIOUS_VERSION",
            Self::CheckpointIncludes => "CHECKPOINT_INCLUDES",
            Self::Other(s) => s,
        }
    }

    /// True for types that are the edge-evidence kind the coordinator
    /// accumulates occurrences/evidence for (spec §4.2 `upsertEdgeEvidenceBulk`
    /// operates on "code edges" — we treat anything other than the temporal
    /// bookkeeping types `OF`/`PREVIOUS_VERSION`/`CHECKPOINT_INCLUDES` as one).
    #[must_use]
    pub fn is_code_edge(&self) -> bool {
        !matches!(
            self,
            Self::Of | Self::PreviousVersion | Self::CheckpointIncludes
        )
    }

    /// Validate this type's literal text against a caller-supplied allow-list
    /// of identifiers safe to interpolate into a query (spec §6: "relationship
    /// type cannot be a parameter ... caller must validate against an
    /// allow-list"). An empty allow-list permits nothing.
    #[must_use]
    pub fn is_allowed(&self, allow_list: &[&str]) -> bool {
        allow_list.contains(&self.as_str())
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for RelationshipType {
    fn from(s: &str) -> Self {
        match s {
            "CALLS" => Self::Calls,
            "REFERENCES" => Self::References,
            "DEPENDS_ON" => Self::DependsOn,
            "TESTS" => Self::Tests,
            "COVERAGE_PROVIDES" => Self::CoverageProvides,
            "HAS_SECURITY_ISSUE" => Self::HasSecurityIssue,
            "DEPENDS_ON_VULNERABLE" => Self::DependsOnVulnerable,
            "SECURITY_IMPACTS" => Self::SecurityImpacts,
            "PERFORMANCE_IMPACT" => Self::PerformanceImpact,
            "PERFORMANCE_REGRESSION" => Self::PerformanceRegression,
            "OF" => Self::Of,
            "PREVIOUS_VERSION" => Self::PreviousVersion,
            "CHECKPOINT_INCLUDES" => Self::CheckpointIncludes,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<RelationshipType> for String {
    fn from(t: RelationshipType) -> Self {
        t.as_str().to_string()
    }
}

impl TryFrom<String> for RelationshipType {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(Self::from(s.as_str()))
    }
}

/// A `(path, line, column)` triple used to deduplicate evidence/locations
/// when merging relationships (spec §9 relationship-merge resolution).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub line: u32,
    pub column: u32,
}

/// A directed, typed edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique id. Deterministic unless explicitly overridden (invariant I3).
    pub id: String,
    pub from_entity_id: String,
    pub to_entity_id: String,
    pub rel_type: RelationshipType,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub version: u64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    // Temporal fields (spec §3, §4.3). `None` when history is disabled.
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub active: Option<bool>,
    pub last_seen_at: Option<DateTime<Utc>>,

    // Incremental-evidence bookkeeping (spec §4.2 `upsertEdgeEvidenceBulk`).
    #[serde(default)]
    pub occurrences: u64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl Relationship {
    /// The deterministic relationship id per invariant I3: `rel_<from>_<to>_<TYPE>`.
    #[must_use]
    pub fn deterministic_id(from: &str, to: &str, rel_type: &RelationshipType) -> String {
        format!("rel_{from}_{to}_{}", rel_type.as_str())
    }

    /// Build a new relationship, assigning the deterministic id unless one
    /// is explicitly given.
    #[must_use]
    pub fn new(
        from_entity_id: impl Into<String>,
        to_entity_id: impl Into<String>,
        rel_type: RelationshipType,
        created: DateTime<Utc>,
        explicit_id: Option<String>,
    ) -> Self {
        let from = from_entity_id.into();
        let to = to_entity_id.into();
        let id = explicit_id.unwrap_or_else(|| Self::deterministic_id(&from, &to, &rel_type));
        Self {
            id,
            from_entity_id: from,
            to_entity_id: to,
            rel_type,
            created,
            last_modified: created,
            version: 1,
            metadata: HashMap::new(),
            valid_from: None,
            valid_to: None,
            active: None,
            last_seen_at: None,
            occurrences: 0,
            evidence: Vec::new(),
            locations: Vec::new(),
        }
    }

    /// Merge another relationship's evidence/locations into this one,
    /// deduplicating by `(path, line, column)` (spec §9).
    pub fn merge_evidence_from(&mut self, other: &Relationship) {
        for e in &other.evidence {
            if !self.evidence.contains(e) {
                self.evidence.push(e.clone());
            }
        }
        for l in &other.locations {
            if !self.locations.contains(l) {
                self.locations.push(l.clone());
            }
        }
        self.occurrences = self.occurrences.max(other.occurrences);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deterministic_id_matches_spec_format() {
        let id = Relationship::deterministic_id("a", "b", &RelationshipType::Calls);
        assert_eq!(id, "rel_a_b_CALLS");
    }

    #[test]
    fn two_constructions_with_same_endpoints_collide_on_purpose() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let r1 = Relationship::new("a", "b", RelationshipType::Calls, t, None);
        let r2 = Relationship::new("a", "b", RelationshipType::Calls, t, None);
        assert_eq!(r1.id, r2.id);
    }

    #[test]
    fn explicit_id_overrides_deterministic_scheme() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let r = Relationship::new(
            "a",
            "b",
            RelationshipType::Calls,
            t,
            Some("custom_id".to_string()),
        );
        assert_eq!(r.id, "custom_id");
    }

    #[test]
    fn relationship_type_round_trips() {
        for raw in [
            "CALLS",
            "REFERENCES",
            "DEPENDS_ON",
            "TESTS",
            "COVERAGE_PROVIDES",
            "HAS_SECURITY_ISSUE",
            "DEPENDS_ON_VULNERABLE",
            "SECURITY_IMPACTS",
            "PERFORMANCE_IMPACT",
            "PERFORMANCE_REGRESSION",
            "OF",
            "PREVIOUS_VERSION",
            "CHECKPOINT_INCLUDES",
        ] {
            assert_eq!(RelationshipType::from(raw).as_str(), raw);
        }
    }

    #[test]
    fn allow_list_rejects_types_not_present() {
        let t = RelationshipType::from("DROP_TABLE");
        assert!(!t.is_allowed(&["CALLS", "REFERENCES"]));
        assert!(RelationshipType::Calls.is_allowed(&["CALLS"]));
    }

    #[test]
    fn temporal_bookkeeping_types_are_not_code_edges() {
        assert!(!RelationshipType::Of.is_code_edge());
        assert!(!RelationshipType::PreviousVersion.is_code_edge());
        assert!(!RelationshipType::CheckpointIncludes.is_code_edge());
        assert!(RelationshipType::Calls.is_code_edge());
    }

    #[test]
    fn merge_evidence_deduplicates_by_location() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut base = Relationship::new("a", "b", RelationshipType::Calls, t, None);
        base.locations.push(Location {
            path: "a.ts".into(),
            line: 1,
            column: 2,
        });
        base.occurrences = 1;

        let mut incoming = Relationship::new("a", "b", RelationshipType::Calls, t, None);
        incoming.locations.push(Location {
            path: "a.ts".into(),
            line: 1,
            column: 2,
        });
        incoming.locations.push(Location {
            path: "a.ts".into(),
            line: 5,
            column: 0,
        });
        incoming.occurrences = 3;

        base.merge_evidence_from(&incoming);
        assert_eq!(base.locations.len(), 2);
        assert_eq!(base.occurrences, 3);
    }
}
