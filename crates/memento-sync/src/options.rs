//! Request-shaped inputs to the coordinator's public API (spec §4.1).

use crate::operation::ConflictResolution;
use std::time::Duration;

/// The guard window a `pending` operation has to transition to `running`
/// before it's failed with a timeout (spec §4.1, §5): the smaller of a 2s
/// liveness floor and the caller's requested timeout.
pub(crate) const PENDING_GUARD_FLOOR: Duration = Duration::from_secs(2);

/// Options accepted by `startFullSync`/`syncFileChanges`/`syncPartial`
/// (spec §4.1).
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub conflict_resolution: ConflictResolution,
    pub timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::default(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl SyncOptions {
    /// The pending-guard window: `min(opts.timeout, 2s)` (spec §4.1 "≥2s,
    /// capped at `opts.timeout`"; spec §5 "≤`opts.timeout`, capped at 2s for
    /// liveness" — both hold simultaneously only when the guard is the
    /// smaller of the two).
    #[must_use]
    pub fn pending_guard(&self) -> Duration {
        self.timeout.min(PENDING_GUARD_FLOOR)
    }
}

/// Per-operation tuning, settable at creation time and mutable afterwards
/// via `updateTuning` (spec §4.1 "Scheduling model").
#[derive(Debug, Clone, Copy)]
pub struct TuningOptions {
    pub max_concurrency: usize,
    pub batch_size: usize,
}

impl Default for TuningOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            batch_size: 10,
        }
    }
}

/// `changes = [{path, type ∈ {create, modify, delete}}]` (spec §4.1
/// `syncFileChanges`).
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: String,
    pub change_type: FileChangeType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeType {
    Create,
    Modify,
    Delete,
}

/// `updates = [{entityId, type ∈ {create,update,delete}, changes?}]` (spec
/// §4.1 `syncPartial`).
#[derive(Debug, Clone)]
pub struct PartialUpdate {
    pub entity_id: String,
    pub change_type: PartialChangeType,
    pub changes: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialChangeType {
    Create,
    Update,
    Delete,
}

/// `startFullSync(opts)` input: an explicit path list, or `None` to ask the
/// configured [`crate::parser::RepositorySource`] to enumerate the repository.
#[derive(Debug, Clone, Default)]
pub struct FullSyncRequest {
    pub paths: Option<Vec<String>>,
    pub options: SyncOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_guard_is_floored_at_two_seconds() {
        let opts = SyncOptions { timeout: Duration::from_secs(30), ..Default::default() };
        assert_eq!(opts.pending_guard(), Duration::from_secs(2));
    }

    #[test]
    fn pending_guard_respects_a_shorter_timeout() {
        let opts = SyncOptions { timeout: Duration::from_millis(500), ..Default::default() };
        assert_eq!(opts.pending_guard(), Duration::from_millis(500));
    }
}
