//! Temporal history layer (spec §4.3): version chains, edge validity
//! intervals, checkpoints, time-travel traversal, pruning, and metrics over
//! a [`memento_kgs::KnowledgeGraphService`].

pub mod checkpoint;
pub mod edge;
pub mod metrics;
pub mod prune;
pub mod service;
pub mod traversal;
pub mod version;

pub use checkpoint::{
    create_checkpoint, export_checkpoint, get_checkpoint_members, import_checkpoint,
    CheckpointData, CheckpointReason, CreateCheckpointOptions, ImportCheckpointOptions,
};
pub use edge::{close_edge, open_edge, valid_at};
pub use metrics::{get_history_metrics, HistoryMetrics};
pub use prune::{prune_history, PruneOptions, PruneSummary};
pub use service::TemporalLayer;
pub use traversal::{time_travel_traversal, TimeQuery, TimeTravelRequest, TimeTravelResult};
pub use version::{append_version, AppendVersionOptions};
