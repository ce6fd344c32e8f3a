//! `getStatistics()` (spec §4.1, §7): aggregate counts across all operations
//! the coordinator has ever seen.

use serde::{Deserialize, Serialize};

/// Aggregate `total/active/queued/completed/failed/retried` (spec §7
/// "Statistics aggregate").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: u64,
    pub active: u64,
    pub queued: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
}
