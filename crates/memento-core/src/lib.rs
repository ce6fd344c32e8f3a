//! Shared domain types, error handling, configuration and the in-process
//! event bus for the Memento knowledge-graph sync engine.
//!
//! This crate has no knowledge of any particular backing store; it defines
//! the vocabulary (`Entity`, `Relationship`, ids, flattening) that
//! `memento-graph-store`, `memento-vector-store`, `memento-kgs`,
//! `memento-temporal` and `memento-sync` all build on.

pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod flatten;
pub mod ids;
pub mod relationship;
pub mod telemetry;

pub use config::{EngineConfig, HistoryConfig, SyncConfig};
pub use entity::{Entity, EntityType, SymbolKind};
pub use error::{Error, ErrorKind, Result};
pub use events::{Event, EventBus, SyncPhase};
pub use relationship::{Location, Relationship, RelationshipType};
pub use telemetry::{span, Traceable};
