//! The Memento knowledge-graph sync engine, assembled.
//!
//! Application code depends on this crate alone: it re-exports the public
//! surface of every member crate and provides [`Engine`], the single handle
//! that wires a backing graph/vector/embedding stack, the Knowledge Graph
//! Service, the optional Temporal History layer, and the Synchronization
//! Coordinator together.

pub mod engine;

pub use engine::Engine;

pub use memento_core::{
    Entity, EntityType, EngineConfig, Error, ErrorKind, Event, EventBus, HistoryConfig, Location,
    Relationship, RelationshipType, Result, SymbolKind, SyncConfig, SyncPhase,
};
pub use memento_embeddings::{
    EmbeddingDispatcher, EmbeddingOutcome, EmbeddingProvider, EmbeddingTarget, MockEmbeddingProvider,
    CODE_COLLECTION, DOCUMENTATION_COLLECTION,
};
pub use memento_graph_store::{
    GraphStore, IndexStatus, IndexTarget, InMemoryGraphStore, NodeSearchPredicate, PathPredicate,
    RelUpsertRow, RelationshipFilter,
};
#[cfg(feature = "neo4j")]
pub use memento_graph_store::Neo4jStore;
pub use memento_kgs::{
    BulkUpsertOutcome, CreateEntityOptions, CreateRelationshipOptions, KnowledgeGraphService,
    SearchMode, SearchRequest, TtlLruCache,
};
pub use memento_sync::{
    Conflict, ConflictResolution, Coordinator, Counters, FileChange, FileChangeType,
    FullSyncRequest, OperationStatus, ParseError, ParseResult, ParsedRelationship,
    PartialChangeType, PartialUpdate, RecordedError, RelationshipTarget, RepositorySource,
    Severity, Statistics, SyncOperation, SyncOperationType, SyncOptions, TuningOptions,
};
pub use memento_temporal::{
    CheckpointData, CheckpointReason, CreateCheckpointOptions, HistoryMetrics,
    ImportCheckpointOptions, PruneOptions, PruneSummary, TemporalLayer, TimeQuery,
    TimeTravelRequest, TimeTravelResult,
};
pub use memento_vector_store::{InMemoryVectorStore, VectorStore};
#[cfg(feature = "qdrant")]
pub use memento_vector_store::QdrantVectorStore;
