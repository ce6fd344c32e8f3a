//! In-process event bus (spec §6 "Events", design note "Cyclic event emitter
//! + caches").
//!
//! Cache invalidation in `memento-kgs` and progress reporting in
//! `memento-sync` are both driven by events published here. This is a plain
//! broadcast channel wrapper, not a reflective pub/sub registry or a global
//! singleton — callers hold an explicit [`EventBus`] handle and subscribe to
//! it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// The sync phases reported via [`Event::SyncProgress`] (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    Scanning,
    Parsing,
    ProcessingChanges,
    ProcessingPartial,
    Completed,
}

/// All events the core emits. Consumers subscribe by matching on this enum,
/// not by string name, to keep compile-time exhaustiveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OperationStarted { op_id: String },
    OperationCompleted { op_id: String },
    OperationFailed { op_id: String, message: String },
    OperationCancelled { op_id: String },
    OperationAbandoned { op_id: String },
    OperationRolledBack { op_id: String },
    SyncProgress { op_id: String, phase: SyncPhase, progress: f64 },
    ConflictsDetected { op_id: String, count: usize },
    EntityCreated { id: String },
    EntityUpdated { id: String },
    EntityDeleted { id: String },
    RelationshipCreated { id: String },
    RelationshipDeleted { id: String },
    AlertTriggered { message: String },
}

/// Default channel capacity. Slow subscribers that fall behind this many
/// events will see [`broadcast::error::RecvError::Lagged`] on their next
/// receive, per `tokio::sync::broadcast` semantics — callers that must not
/// miss events should drain promptly.
const DEFAULT_CAPACITY: usize = 1024;

/// A cloneable handle to the in-process event bus.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new bus with an explicit channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns the number of active subscribers that
    /// received it; `0` is not an error — it just means nobody is listening.
    pub fn emit(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
