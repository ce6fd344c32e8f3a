//! Synchronization Coordinator (spec §4.1): a single FIFO queue of
//! full/incremental/partial operations, drained by one driver loop that
//! fans per-operation file work out with bounded concurrency, detects and
//! resolves conflicts, retries recoverable failures with linear backoff,
//! and reports progress/statistics over a [`memento_core::EventBus`].

pub mod conflict;
pub mod coordinator;
pub mod operation;
pub mod options;
pub mod parser;
pub mod pipeline;
pub mod queue;
pub mod retry;
pub mod statistics;

pub use conflict::{detect_deletion_conflict, detect_relationship_conflict, detect_version_conflict, merge_relationship, resolve_entity, EntityResolution};
pub use coordinator::Coordinator;
pub use operation::{Conflict, ConflictResolution, Counters, OperationStatus, RecordedError, SyncOperation, SyncOperationType};
pub use options::{FileChange, FileChangeType, FullSyncRequest, PartialChangeType, PartialUpdate, SyncOptions, TuningOptions};
pub use parser::{IncrementalParseResult, ParseError, ParseResult, ParsedRelationship, RelationshipTarget, RepositorySource, Severity};
pub use pipeline::{process_file, resolve_and_upsert, FileOutcome, RelationshipOutcome, UnresolvedRelationship};
pub use queue::OperationQueue;
pub use retry::{delay_for_attempt, retry_schedule};
pub use statistics::Statistics;
