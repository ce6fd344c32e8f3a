//! Conflict detection and resolution (spec §4.1 "Conflict taxonomy").
//!
//! Detection compares inbound state against what's already stored; resolution
//! applies the operation's `conflictResolution` policy. Relationship merge
//! semantics follow spec §9's open-question resolution: merge `metadata`,
//! keep latest `lastModified`, union `evidence[]`/`locations[]` deduplicated
//! by `(path, line, column)`.

use crate::operation::{Conflict, ConflictResolution};
use memento_core::{Entity, Relationship};

/// What to do with an inbound entity after conflict resolution.
pub enum EntityResolution {
    /// Persist this entity (possibly merged with the stored one).
    Persist(Entity),
    /// Drop the inbound entity; the store is left untouched.
    Skip,
}

/// `version_conflict`: inbound entity is older than stored (spec §4.1).
/// `None` when there's nothing stored yet, or either side lacks a
/// `last_modified` to compare.
#[must_use]
pub fn detect_version_conflict(existing: Option<&Entity>, inbound: &Entity) -> Option<Conflict> {
    let existing = existing?;
    let stored_lm = existing.last_modified?;
    let inbound_lm = inbound.last_modified?;
    if inbound_lm < stored_lm {
        Some(Conflict::VersionConflict {
            entity_id: existing.id.clone(),
            stored_last_modified: stored_lm,
            inbound_last_modified: inbound_lm,
        })
    } else {
        None
    }
}

/// `deletion_conflict`: an update targets an entity that no longer exists
/// (spec §4.1).
#[must_use]
pub fn detect_deletion_conflict(existing_found: bool, entity_id: &str) -> Option<Conflict> {
    if existing_found {
        None
    } else {
        Some(Conflict::DeletionConflict { entity_id: entity_id.to_string() })
    }
}

/// `relationship_conflict`: an inbound edge contradicts an existing edge's
/// type between the same endpoints (spec §4.1).
#[must_use]
pub fn detect_relationship_conflict(existing_type: Option<&str>, inbound: &Relationship) -> Option<Conflict> {
    let existing_type = existing_type?;
    if existing_type == inbound.rel_type.as_str() {
        None
    } else {
        Some(Conflict::RelationshipConflict {
            from_entity_id: inbound.from_entity_id.clone(),
            to_entity_id: inbound.to_entity_id.clone(),
            stored_type: existing_type.to_string(),
            inbound_type: inbound.rel_type.as_str().to_string(),
        })
    }
}

/// Apply `conflictResolution` to an inbound entity that conflicted with an
/// existing one (spec §4.1 "Resolution"): `overwrite` writes inbound;
/// `merge` merges `metadata` and takes max `lastModified`; `skip` drops
/// inbound; `manual` records the conflict and leaves the store untouched
/// (same effect as `skip` here — the conflict log is what differs).
#[must_use]
pub fn resolve_entity(resolution: ConflictResolution, existing: Option<Entity>, inbound: Entity) -> EntityResolution {
    match resolution {
        ConflictResolution::Overwrite => EntityResolution::Persist(inbound),
        ConflictResolution::Merge => {
            let Some(existing) = existing else {
                return EntityResolution::Persist(inbound);
            };
            let mut merged = inbound.clone();
            let mut metadata = existing.metadata.clone();
            metadata.extend(inbound.metadata.clone());
            merged.metadata = metadata;
            merged.last_modified = match (existing.last_modified, inbound.last_modified) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            EntityResolution::Persist(merged)
        }
        ConflictResolution::Skip | ConflictResolution::Manual => EntityResolution::Skip,
    }
}

/// Merge two relationships per spec §9's relationship-merge resolution.
#[must_use]
pub fn merge_relationship(existing: Relationship, inbound: Relationship) -> Relationship {
    let mut merged = inbound.clone();
    let mut metadata = existing.metadata.clone();
    metadata.extend(inbound.metadata.clone());
    merged.metadata = metadata;
    merged.last_modified = existing.last_modified.max(inbound.last_modified);
    merged.merge_evidence_from(&existing);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use memento_core::EntityType;
    use serde_json::json;

    fn entity_at(id: &str, ts: i64, key: &str, value: i64) -> Entity {
        let mut e = Entity::new(id, EntityType::File);
        e.last_modified = Some(Utc.timestamp_opt(ts, 0).unwrap());
        e.metadata.insert(key.to_string(), json!(value));
        e
    }

    #[test]
    fn version_conflict_detected_when_inbound_is_older() {
        let stored = entity_at("e1", 200, "a", 1);
        let inbound = entity_at("e1", 100, "b", 2);
        let conflict = detect_version_conflict(Some(&stored), &inbound);
        assert!(matches!(conflict, Some(Conflict::VersionConflict { .. })));
    }

    #[test]
    fn no_version_conflict_when_inbound_is_newer() {
        let stored = entity_at("e1", 100, "a", 1);
        let inbound = entity_at("e1", 200, "b", 2);
        assert!(detect_version_conflict(Some(&stored), &inbound).is_none());
    }

    #[test]
    fn deletion_conflict_when_entity_not_found() {
        assert!(detect_deletion_conflict(false, "e1").is_some());
        assert!(detect_deletion_conflict(true, "e1").is_none());
    }

    #[test]
    fn merge_resolution_unions_metadata_and_keeps_max_last_modified() {
        let stored = entity_at("e1", 100, "a", 1);
        let inbound = entity_at("e1", 200, "b", 2);
        match resolve_entity(ConflictResolution::Merge, Some(stored), inbound) {
            EntityResolution::Persist(merged) => {
                assert_eq!(merged.metadata.get("a"), Some(&json!(1)));
                assert_eq!(merged.metadata.get("b"), Some(&json!(2)));
                assert_eq!(merged.last_modified, Some(Utc.timestamp_opt(200, 0).unwrap()));
            }
            EntityResolution::Skip => panic!("expected a merged entity"),
        }
    }

    #[test]
    fn skip_resolution_drops_inbound() {
        let stored = entity_at("e1", 100, "a", 1);
        let inbound = entity_at("e1", 200, "b", 2);
        assert!(matches!(resolve_entity(ConflictResolution::Skip, Some(stored), inbound), EntityResolution::Skip));
    }

    #[test]
    fn overwrite_resolution_always_persists_inbound() {
        let inbound = entity_at("e1", 200, "b", 2);
        match resolve_entity(ConflictResolution::Overwrite, None, inbound.clone()) {
            EntityResolution::Persist(e) => assert_eq!(e.id, inbound.id),
            EntityResolution::Skip => panic!("expected persist"),
        }
    }
}
