//! `SyncOperation` records (spec §4.1): lifecycle, counters, accumulated
//! errors and conflicts for one unit of synchronization work.

use chrono::{DateTime, Utc};
use memento_core::ErrorKind;
use serde::{Deserialize, Serialize};

/// `type ∈ {full, incremental, partial}` (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOperationType {
    Full,
    Incremental,
    Partial,
}

/// `status ∈ {pending, running, completed, failed, rolled_back}` (spec §4.1
/// "State machine"). Transitions: `pending → running → (completed | failed)`;
/// `failed → pending` on retry; `failed → rolled_back` on successful
/// rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    RolledBack,
}

/// Aggregate counters tracked on a [`SyncOperation`] (spec §4.1, §7).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Counters {
    pub entities_created: u64,
    pub entities_updated: u64,
    pub entities_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub files_processed: u64,
    pub files_failed: u64,
}

/// One recorded error (spec §7 "Kinds"). `file` is set for per-file parse
/// errors; `None` for operation-level failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedError {
    pub file: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
}

impl RecordedError {
    #[must_use]
    pub fn new(file: Option<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            file,
            kind,
            message: message.into(),
            recoverable: kind.is_recoverable(),
        }
    }
}

/// Structured conflict log (spec §2 supplemented feature): an exhaustively
/// matched enum rather than a stringly-typed bag, so resolution logic can't
/// silently skip a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Conflict {
    /// Inbound entity is older than the stored one (spec §4.1 taxonomy).
    VersionConflict {
        entity_id: String,
        stored_last_modified: DateTime<Utc>,
        inbound_last_modified: DateTime<Utc>,
    },
    /// A partial update targets an entity that no longer exists.
    DeletionConflict { entity_id: String },
    /// An inbound edge contradicts an existing edge's type between the same
    /// endpoints.
    RelationshipConflict {
        from_entity_id: String,
        to_entity_id: String,
        stored_type: String,
        inbound_type: String,
    },
}

impl Conflict {
    #[must_use]
    pub fn subject_id(&self) -> &str {
        match self {
            Self::VersionConflict { entity_id, .. } | Self::DeletionConflict { entity_id } => entity_id,
            Self::RelationshipConflict { from_entity_id, .. } => from_entity_id,
        }
    }
}

/// `opts.conflictResolution ∈ {overwrite, merge, skip, manual}` (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictResolution {
    #[default]
    Overwrite,
    Merge,
    Skip,
    Manual,
}

/// A unit of synchronization work with a lifecycle and accumulated counters
/// (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperation {
    pub id: String,
    pub op_type: SyncOperationType,
    pub status: OperationStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub counters: Counters,
    pub errors: Vec<RecordedError>,
    pub conflicts: Vec<Conflict>,
    /// Number of attempts made so far, starting at 1 for the first run.
    pub attempt: u32,
}

impl SyncOperation {
    #[must_use]
    pub fn new(id: impl Into<String>, op_type: SyncOperationType) -> Self {
        Self {
            id: id.into(),
            op_type,
            status: OperationStatus::Pending,
            start_time: None,
            end_time: None,
            counters: Counters::default(),
            errors: Vec::new(),
            conflicts: Vec::new(),
            attempt: 0,
        }
    }

    /// Whether any accumulated error is recoverable, making the whole
    /// operation eligible for retry (spec §7 "Propagation").
    #[must_use]
    pub fn has_recoverable_error(&self) -> bool {
        self.errors.iter().any(|e| e.recoverable)
    }

    /// Whether any accumulated error is non-recoverable, which fails the
    /// operation outright regardless of recoverable errors alongside it.
    #[must_use]
    pub fn has_nonrecoverable_error(&self) -> bool {
        self.errors.iter().any(|e| !e.recoverable)
    }

    /// Reset for a retry attempt: clears errors/conflicts, returns to
    /// `pending` (spec §4.1 "Retries ... reset status to pending, clear
    /// errors/conflicts, and re-enqueue").
    pub fn reset_for_retry(&mut self) {
        self.status = OperationStatus::Pending;
        self.errors.clear();
        self.conflicts.clear();
        self.start_time = None;
        self.end_time = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_operation_starts_pending_with_zero_attempts() {
        let op = SyncOperation::new("op1", SyncOperationType::Full);
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.attempt, 0);
    }

    #[test]
    fn recoverable_error_makes_operation_retry_eligible() {
        let mut op = SyncOperation::new("op1", SyncOperationType::Incremental);
        op.errors.push(RecordedError::new(Some("a.ts".into()), ErrorKind::Parse, "boom"));
        assert!(op.has_recoverable_error());
        assert!(!op.has_nonrecoverable_error());
    }

    #[test]
    fn nonrecoverable_error_is_detected_independent_of_recoverable_ones() {
        let mut op = SyncOperation::new("op1", SyncOperationType::Incremental);
        op.errors.push(RecordedError::new(Some("a.ts".into()), ErrorKind::Parse, "boom"));
        op.errors.push(RecordedError::new(None, ErrorKind::Validation, "bad param"));
        assert!(op.has_recoverable_error());
        assert!(op.has_nonrecoverable_error());
    }

    #[test]
    fn reset_for_retry_clears_errors_and_conflicts() {
        let mut op = SyncOperation::new("op1", SyncOperationType::Full);
        op.status = OperationStatus::Failed;
        op.errors.push(RecordedError::new(None, ErrorKind::Database, "timeout"));
        op.conflicts.push(Conflict::DeletionConflict { entity_id: "e1".into() });
        op.reset_for_retry();
        assert_eq!(op.status, OperationStatus::Pending);
        assert!(op.errors.is_empty());
        assert!(op.conflicts.is_empty());
    }
}
