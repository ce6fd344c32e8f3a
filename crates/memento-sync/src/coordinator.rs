//! The Synchronization Coordinator (spec §4.1): a single FIFO operation
//! queue drained by one driver loop, fanning per-operation file work out
//! with bounded concurrency, retrying recoverable failures with linear
//! backoff, and finalizing full scans by marking stale edges inactive.
//!
//! Bounded fan-out follows the same `Semaphore`-free `buffer_unordered`
//! idiom used for parallel evaluation elsewhere in this stack: build the
//! futures, then poll at most `max_concurrency` of them at a time.

use crate::operation::{Conflict, ConflictResolution, RecordedError, SyncOperation, SyncOperationType};
use crate::options::{FileChange, FullSyncRequest, PartialUpdate, SyncOptions, TuningOptions};
use crate::parser::RepositorySource;
use crate::pipeline::{self, UnresolvedRelationship};
use crate::queue::OperationQueue;
use crate::retry;
use crate::statistics::Statistics;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use futures::stream::{self, StreamExt};
use memento_core::{Event, EventBus, SyncConfig, SyncPhase};
use memento_embeddings::EmbeddingProvider;
use memento_graph_store::GraphStore;
use memento_kgs::KnowledgeGraphService;
use memento_temporal::TemporalLayer;
use memento_vector_store::VectorStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// What one queued operation actually does, captured at enqueue time so the
/// driver loop can re-run it on retry without the caller keeping anything
/// alive.
#[derive(Clone)]
enum Work {
    Full { paths: Vec<String> },
    Incremental { changes: Vec<FileChange> },
    Partial { updates: Vec<PartialUpdate> },
}

struct Inner<G, V, P, S>
where
    G: GraphStore,
    V: VectorStore,
    P: EmbeddingProvider,
    S: RepositorySource,
{
    kgs: Arc<KnowledgeGraphService<G, V, P>>,
    temporal: Option<Arc<TemporalLayer<G, V, P>>>,
    source: Arc<S>,
    events: EventBus,
    sync_config: SyncConfig,

    queue: OperationQueue,
    queue_notify: Notify,
    paused: AtomicBool,
    resume_notify: Notify,

    operations: DashMap<String, SyncOperation>,
    work: DashMap<String, (Work, SyncOptions)>,
    tuning: DashMap<String, TuningOptions>,
    cancelled: DashSet<String>,
    stats: Mutex<Statistics>,
}

impl<G, V, P, S> Inner<G, V, P, S>
where
    G: GraphStore + 'static,
    V: VectorStore + 'static,
    P: EmbeddingProvider + 'static,
    S: RepositorySource + 'static,
{
    fn history_enabled(&self) -> bool {
        self.temporal.as_ref().map(|t| t.config().enabled).unwrap_or(false)
    }

    fn emit_progress(&self, op_id: &str, phase: SyncPhase, progress: f64) {
        self.events.emit(Event::SyncProgress { op_id: op_id.to_string(), phase, progress });
    }

    fn push_error(&self, op_id: &str, err: RecordedError) {
        if let Some(mut op) = self.operations.get_mut(op_id) {
            op.errors.push(err);
        }
    }

    /// Register and enqueue a unit of work, returning its operation id.
    fn enqueue(inner: &Arc<Self>, op_type: SyncOperationType, work: Work, opts: SyncOptions) -> String {
        let op_id = format!("op_{}", uuid::Uuid::new_v4());
        inner.operations.insert(op_id.clone(), SyncOperation::new(op_id.clone(), op_type));
        inner.work.insert(op_id.clone(), (work, opts.clone()));
        inner.queue.push_back(op_id.clone());
        inner.queue_notify.notify_one();
        {
            let mut s = inner.stats.lock();
            s.total += 1;
            s.queued += 1;
        }
        Self::spawn_pending_guard(Arc::clone(inner), op_id.clone(), opts.pending_guard());
        op_id
    }

    fn spawn_pending_guard(inner: Arc<Self>, op_id: String, guard: std::time::Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(guard).await;
            inner.fail_if_still_pending(&op_id);
        });
    }

    fn fail_if_still_pending(&self, op_id: &str) {
        let still_pending = self
            .operations
            .get(op_id)
            .map(|op| op.status == crate::operation::OperationStatus::Pending)
            .unwrap_or(false);
        if !still_pending {
            return;
        }
        self.queue.remove(op_id);
        if let Some(mut op) = self.operations.get_mut(op_id) {
            op.status = crate::operation::OperationStatus::Failed;
            op.errors.push(RecordedError::new(
                None,
                memento_core::ErrorKind::Timeout,
                "operation did not start running within its pending guard window",
            ));
            op.end_time = Some(Utc::now());
        }
        {
            let mut s = self.stats.lock();
            s.queued = s.queued.saturating_sub(1);
            s.failed += 1;
        }
        self.events.emit(Event::OperationFailed {
            op_id: op_id.to_string(),
            message: "pending guard timeout".to_string(),
        });
    }

    fn cancel(&self, op_id: &str) -> bool {
        let was_queued = self.queue.remove(op_id);
        let known = self.operations.contains_key(op_id);
        if !known {
            return false;
        }
        self.cancelled.insert(op_id.to_string());
        if was_queued {
            if let Some(mut op) = self.operations.get_mut(op_id) {
                op.status = crate::operation::OperationStatus::Failed;
                op.end_time = Some(Utc::now());
            }
            let mut s = self.stats.lock();
            s.queued = s.queued.saturating_sub(1);
            s.failed += 1;
        }
        true
    }

    /// The driver loop: pop, run, finalize, repeat. Runs for the lifetime of
    /// the coordinator.
    async fn drive(self: Arc<Self>) {
        loop {
            if self.paused.load(Ordering::Acquire) {
                self.resume_notify.notified().await;
                continue;
            }
            let Some(op_id) = self.queue.pop_front() else {
                self.queue_notify.notified().await;
                continue;
            };
            if self.cancelled.remove(&op_id).is_some() {
                self.events.emit(Event::OperationCancelled { op_id });
                continue;
            }
            Self::run_operation(Arc::clone(&self), op_id).await;
        }
    }

    async fn run_operation(inner: Arc<Self>, op_id: String) {
        let Some(entry) = inner.work.get(&op_id) else { return };
        let (work, opts) = entry.value().clone();
        drop(entry);

        {
            let Some(mut op) = inner.operations.get_mut(&op_id) else { return };
            op.status = crate::operation::OperationStatus::Running;
            op.start_time = Some(Utc::now());
            op.attempt += 1;
        }
        inner.events.emit(Event::OperationStarted { op_id: op_id.clone() });
        {
            let mut s = inner.stats.lock();
            s.active += 1;
            s.queued = s.queued.saturating_sub(1);
        }

        let tuning = inner.tuning.get(&op_id).map(|t| *t.value()).unwrap_or_default();

        match work {
            Work::Full { paths } => Self::run_full(&inner, &op_id, paths, &opts, tuning).await,
            Work::Incremental { changes } => Self::run_incremental(&inner, &op_id, changes, &opts, tuning).await,
            Work::Partial { updates } => Self::run_partial(&inner, &op_id, updates, &opts).await,
        }

        Self::finalize(inner, op_id, opts).await;
    }

    async fn process_batch(
        inner: &Arc<Self>,
        batch: &[String],
        resolution: ConflictResolution,
        history_enabled: bool,
        now: DateTime<Utc>,
        max_concurrency: usize,
    ) -> Vec<pipeline::FileOutcome> {
        let tasks = batch.iter().map(|path| {
            let inner = Arc::clone(inner);
            let path = path.clone();
            async move {
                pipeline::process_file(
                    inner.kgs.as_ref(),
                    inner.temporal.as_deref(),
                    inner.source.as_ref(),
                    &path,
                    resolution,
                    history_enabled,
                    now,
                )
                .await
            }
        });
        stream::iter(tasks).buffer_unordered(max_concurrency.max(1)).collect().await
    }

    fn merge_outcome(inner: &Arc<Self>, op_id: &str, outcome: pipeline::FileOutcome) {
        if let Some(mut op) = inner.operations.get_mut(op_id) {
            op.counters.entities_created += outcome.entities_created;
            op.counters.entities_updated += outcome.entities_updated;
            op.counters.relationships_created += outcome.relationships_created;
            let file_failed = outcome.errors.iter().any(|e| !e.recoverable);
            if file_failed {
                op.counters.files_failed += 1;
            } else {
                op.counters.files_processed += 1;
            }
            op.errors.extend(outcome.errors);
            op.conflicts.extend(outcome.conflicts);
        }
    }

    async fn upsert_evidence(inner: &Arc<Self>, op_id: &str, rels: &[memento_core::Relationship], now: DateTime<Utc>) {
        if rels.is_empty() {
            return;
        }
        if let Err(e) = inner.kgs.upsert_edge_evidence_bulk(rels, now).await {
            inner.push_error(op_id, RecordedError::new(None, e.kind(), e.to_string()));
        }
    }

    /// Full scan (spec §4.1 "startFullSync"): enumerate, batch, parse+upsert
    /// with bounded concurrency, retry unresolved relationships once all
    /// files are in, then mark edges not seen this scan inactive.
    async fn run_full(inner: &Arc<Self>, op_id: &str, paths: Vec<String>, opts: &SyncOptions, tuning: TuningOptions) {
        let scan_start = Utc::now();
        let history_enabled = inner.history_enabled();
        inner.emit_progress(op_id, SyncPhase::Scanning, 0.0);

        let total = paths.len().max(1);
        let batch_size = tuning.batch_size.max(1);
        let chunks: Vec<Vec<String>> = paths.chunks(batch_size).map(<[String]>::to_vec).collect();

        let mut processed = 0usize;
        let mut all_unresolved: Vec<UnresolvedRelationship> = Vec::new();

        for batch in chunks {
            if inner.cancelled.contains(op_id) {
                break;
            }
            inner.emit_progress(op_id, SyncPhase::Parsing, processed as f64 / total as f64);

            let results = Self::process_batch(inner, &batch, opts.conflict_resolution, history_enabled, scan_start, tuning.max_concurrency).await;
            let mut resolved_this_batch = Vec::new();
            for outcome in results {
                resolved_this_batch.extend(outcome.resolved.clone());
                all_unresolved.extend(outcome.unresolved.clone());
                Self::merge_outcome(inner, op_id, outcome);
            }
            Self::upsert_evidence(inner, op_id, &resolved_this_batch, scan_start).await;

            processed += batch.len();
        }

        if !inner.cancelled.contains(op_id) {
            Self::retry_unresolved(inner, op_id, all_unresolved, opts.conflict_resolution, history_enabled, scan_start).await;

            match inner.kgs.mark_inactive_edges_not_seen_since(scan_start, None).await {
                Ok(_) => {}
                Err(e) => inner.push_error(op_id, RecordedError::new(None, e.kind(), e.to_string())),
            }
        }
    }

    /// `syncFileChanges` (spec §4.1): deletes are applied directly; create/
    /// modify go back through the parse pipeline for the affected paths.
    async fn run_incremental(inner: &Arc<Self>, op_id: &str, changes: Vec<FileChange>, opts: &SyncOptions, tuning: TuningOptions) {
        let now = Utc::now();
        let history_enabled = inner.history_enabled();
        inner.emit_progress(op_id, SyncPhase::ProcessingChanges, 0.0);

        let mut touched = Vec::new();
        for change in &changes {
            match change.change_type {
                crate::options::FileChangeType::Delete => {
                    Self::delete_file_entities(inner, op_id, &change.path).await;
                }
                crate::options::FileChangeType::Create | crate::options::FileChangeType::Modify => {
                    touched.push(change.path.clone());
                }
            }
        }

        let total = touched.len().max(1);
        let mut processed = 0usize;
        let mut all_unresolved = Vec::new();

        for batch in touched.chunks(tuning.batch_size.max(1)) {
            if inner.cancelled.contains(op_id) {
                break;
            }
            inner.emit_progress(op_id, SyncPhase::ProcessingChanges, processed as f64 / total as f64);
            let results = Self::process_batch(inner, batch, opts.conflict_resolution, history_enabled, now, tuning.max_concurrency).await;
            let mut resolved = Vec::new();
            for outcome in results {
                resolved.extend(outcome.resolved.clone());
                all_unresolved.extend(outcome.unresolved.clone());
                Self::merge_outcome(inner, op_id, outcome);
            }
            Self::upsert_evidence(inner, op_id, &resolved, now).await;
            processed += batch.len();
        }

        if !inner.cancelled.contains(op_id) {
            Self::retry_unresolved(inner, op_id, all_unresolved, opts.conflict_resolution, history_enabled, now).await;
        }
    }

    async fn delete_file_entities(inner: &Arc<Self>, op_id: &str, path: &str) {
        let entities = match inner.kgs.find_entities_by_path(path).await {
            Ok(e) => e,
            Err(e) => {
                inner.push_error(op_id, RecordedError::new(Some(path.to_string()), e.kind(), e.to_string()));
                return;
            }
        };
        let now = Utc::now();
        let mut deleted = 0u64;
        for entity in entities {
            if let Some(temporal) = inner.temporal.as_deref() {
                Self::close_edges_touching(inner, op_id, temporal, &entity.id, now).await;
            }
            match inner.kgs.delete_entity(&entity.id).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => inner.push_error(op_id, RecordedError::new(Some(path.to_string()), e.kind(), e.to_string())),
            }
        }
        if let Some(mut op) = inner.operations.get_mut(op_id) {
            op.counters.entities_deleted += deleted;
        }
    }

    /// `closeEdge` on every relationship touching `entity_id` (either
    /// endpoint) before its node is detach-deleted, so the edge's validity
    /// interval reflects the deletion instead of simply vanishing.
    async fn close_edges_touching(
        inner: &Arc<Self>,
        op_id: &str,
        temporal: &TemporalLayer<G, V, P>,
        entity_id: &str,
        now: DateTime<Utc>,
    ) {
        for filter in [
            memento_graph_store::RelationshipFilter { from: Some(entity_id.to_string()), ..Default::default() },
            memento_graph_store::RelationshipFilter { to: Some(entity_id.to_string()), ..Default::default() },
        ] {
            let rels = match inner.kgs.get_relationships(filter).await {
                Ok(rels) => rels,
                Err(e) => {
                    inner.push_error(op_id, RecordedError::new(None, e.kind(), e.to_string()));
                    continue;
                }
            };
            for rel in rels {
                if let Err(e) =
                    temporal.close_edge(&rel.from_entity_id, &rel.to_entity_id, &rel.rel_type, Some(now)).await
                {
                    inner.push_error(op_id, RecordedError::new(None, e.kind(), e.to_string()));
                }
            }
        }
    }

    /// `syncPartial` (spec §4.1): applies entity-level create/update/delete
    /// directly, with deletion conflicts recorded for updates/deletes that
    /// target a missing entity.
    async fn run_partial(inner: &Arc<Self>, op_id: &str, updates: Vec<PartialUpdate>, opts: &SyncOptions) {
        inner.emit_progress(op_id, SyncPhase::ProcessingPartial, 0.0);
        let now = Utc::now();

        for update in updates {
            match update.change_type {
                crate::options::PartialChangeType::Delete => {
                    let existing = inner.kgs.get_entity(&update.entity_id).await;
                    match existing {
                        Ok(Some(_)) => {
                            if let Some(temporal) = inner.temporal.as_deref() {
                                Self::close_edges_touching(inner, op_id, temporal, &update.entity_id, now).await;
                            }
                            match inner.kgs.delete_entity(&update.entity_id).await {
                                Ok(_) => {
                                    if let Some(mut op) = inner.operations.get_mut(op_id) {
                                        op.counters.entities_deleted += 1;
                                    }
                                }
                                Err(e) => inner.push_error(op_id, RecordedError::new(None, e.kind(), e.to_string())),
                            }
                        }
                        Ok(None) => {
                            if let Some(mut op) = inner.operations.get_mut(op_id) {
                                op.conflicts.push(Conflict::DeletionConflict { entity_id: update.entity_id.clone() });
                            }
                        }
                        Err(e) => inner.push_error(op_id, RecordedError::new(None, e.kind(), e.to_string())),
                    }
                }
                crate::options::PartialChangeType::Create | crate::options::PartialChangeType::Update => {
                    let existing = match inner.kgs.get_entity(&update.entity_id).await {
                        Ok(e) => e,
                        Err(e) => {
                            inner.push_error(op_id, RecordedError::new(None, e.kind(), e.to_string()));
                            continue;
                        }
                    };
                    let is_update = existing.is_some();
                    if update.change_type == crate::options::PartialChangeType::Update && existing.is_none() {
                        if let Some(mut op) = inner.operations.get_mut(op_id) {
                            op.conflicts.push(Conflict::DeletionConflict { entity_id: update.entity_id.clone() });
                        }
                        if opts.conflict_resolution == ConflictResolution::Skip || opts.conflict_resolution == ConflictResolution::Manual {
                            continue;
                        }
                    }

                    let mut entity = existing.unwrap_or_else(|| memento_core::Entity::new(update.entity_id.clone(), memento_core::EntityType::Other("partial".to_string())));
                    if let Some(changes) = update.changes {
                        apply_partial_changes(&mut entity, changes);
                    }
                    entity.last_modified = Some(now);

                    match inner.kgs.create_entity(entity, memento_kgs::CreateEntityOptions::default()).await {
                        Ok(_) if is_update => {
                            if let Some(mut op) = inner.operations.get_mut(op_id) {
                                op.counters.entities_updated += 1;
                            }
                        }
                        Ok(_) => {
                            if let Some(mut op) = inner.operations.get_mut(op_id) {
                                op.counters.entities_created += 1;
                            }
                        }
                        Err(e) => inner.push_error(op_id, RecordedError::new(None, e.kind(), e.to_string())),
                    }
                }
            }
        }
    }

    /// A second pass over relationships the per-file pipeline couldn't
    /// resolve a target for: by now every file in the batch has had its
    /// symbols upserted, so a retry of the same lookup may now succeed
    /// (spec §4.1 "Unresolved relationships ... retried once per operation
    /// after the full batch has been processed").
    async fn retry_unresolved(
        inner: &Arc<Self>,
        op_id: &str,
        unresolved: Vec<UnresolvedRelationship>,
        resolution: ConflictResolution,
        history_enabled: bool,
        now: DateTime<Utc>,
    ) {
        if unresolved.is_empty() {
            return;
        }
        let mut resolved = Vec::new();
        for item in unresolved {
            let result = pipeline::resolve_and_upsert(
                inner.kgs.as_ref(),
                inner.temporal.as_deref(),
                item.parsed,
                &item.calling_file,
                resolution,
                history_enabled,
                now,
            )
            .await;
            if let Some(mut op) = inner.operations.get_mut(op_id) {
                op.errors.extend(result.errors);
                op.conflicts.extend(result.conflicts);
                if result.created.is_some() {
                    op.counters.relationships_created += 1;
                }
            }
            if let Some(rel) = result.created {
                resolved.push(rel);
            }
            if result.unresolved.is_some() {
                // Still unresolved after the retry; not an error, just left
                // out of the graph until a future scan sees the target.
            }
        }
        Self::upsert_evidence(inner, op_id, &resolved, now).await;
    }

    /// Decide completed/retry/abandon/fail after a run (spec §4.1 "Result
    /// classification").
    async fn finalize(inner: Arc<Self>, op_id: String, opts: SyncOptions) {
        if inner.cancelled.remove(&op_id).is_some() {
            if let Some(mut op) = inner.operations.get_mut(&op_id) {
                op.status = crate::operation::OperationStatus::Failed;
                op.end_time = Some(Utc::now());
            }
            {
                let mut s = inner.stats.lock();
                s.active = s.active.saturating_sub(1);
                s.failed += 1;
            }
            inner.events.emit(Event::OperationCancelled { op_id });
            return;
        }

        let (has_recoverable, has_nonrecoverable, conflict_count, attempt) = {
            let Some(op) = inner.operations.get(&op_id) else { return };
            (op.has_recoverable_error(), op.has_nonrecoverable_error(), op.conflicts.len(), op.attempt)
        };

        if conflict_count > 0 {
            inner.events.emit(Event::ConflictsDetected { op_id: op_id.clone(), count: conflict_count });
        }

        if has_nonrecoverable {
            if let Some(mut op) = inner.operations.get_mut(&op_id) {
                op.status = crate::operation::OperationStatus::Failed;
                op.end_time = Some(Utc::now());
            }
            let mut s = inner.stats.lock();
            s.active = s.active.saturating_sub(1);
            s.failed += 1;
            drop(s);
            inner.events.emit(Event::OperationFailed { op_id, message: "non-recoverable error".to_string() });
            return;
        }

        if has_recoverable {
            let delay = retry::delay_for_attempt(
                std::time::Duration::from_secs(inner.sync_config.retry_delay_secs),
                inner.sync_config.max_retry_attempts,
                attempt,
            );
            match delay {
                Some(delay) => {
                    if let Some(mut op) = inner.operations.get_mut(&op_id) {
                        op.reset_for_retry();
                    }
                    {
                        let mut s = inner.stats.lock();
                        s.active = s.active.saturating_sub(1);
                        s.retried += 1;
                        s.queued += 1;
                    }
                    let respawn = Arc::clone(&inner);
                    let retry_id = op_id.clone();
                    let guard = opts.pending_guard();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        respawn.queue.push_back(retry_id.clone());
                        respawn.queue_notify.notify_one();
                        Self::spawn_pending_guard(respawn, retry_id, guard);
                    });
                }
                None => {
                    if let Some(mut op) = inner.operations.get_mut(&op_id) {
                        op.status = crate::operation::OperationStatus::Failed;
                        op.end_time = Some(Utc::now());
                    }
                    {
                        let mut s = inner.stats.lock();
                        s.active = s.active.saturating_sub(1);
                        s.failed += 1;
                    }
                    inner.events.emit(Event::OperationAbandoned { op_id });
                }
            }
            return;
        }

        if let Some(mut op) = inner.operations.get_mut(&op_id) {
            op.status = crate::operation::OperationStatus::Completed;
            op.end_time = Some(Utc::now());
        }
        {
            let mut s = inner.stats.lock();
            s.active = s.active.saturating_sub(1);
            s.completed += 1;
        }
        inner.emit_progress(&op_id, SyncPhase::Completed, 1.0);
        inner.events.emit(Event::OperationCompleted { op_id });
    }
}

/// Apply a JSON patch of field changes onto an entity's `metadata` map
/// (spec §4.1 `syncPartial` "changes is a flat property bag merged into the
/// entity's metadata").
fn apply_partial_changes(entity: &mut memento_core::Entity, changes: serde_json::Value) {
    if let serde_json::Value::Object(map) = changes {
        for (key, value) in map {
            entity.metadata.insert(key, value);
        }
    }
}

/// Handle to the coordinator. Cheaply cloneable; all instances share the
/// same queue, operation table, and driver task.
pub struct Coordinator<G, V, P, S>
where
    G: GraphStore,
    V: VectorStore,
    P: EmbeddingProvider,
    S: RepositorySource,
{
    inner: Arc<Inner<G, V, P, S>>,
}

impl<G, V, P, S> Clone for Coordinator<G, V, P, S>
where
    G: GraphStore,
    V: VectorStore,
    P: EmbeddingProvider,
    S: RepositorySource,
{
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<G, V, P, S> Coordinator<G, V, P, S>
where
    G: GraphStore + 'static,
    V: VectorStore + 'static,
    P: EmbeddingProvider + 'static,
    S: RepositorySource + 'static,
{
    #[must_use]
    pub fn new(
        kgs: Arc<KnowledgeGraphService<G, V, P>>,
        temporal: Option<Arc<TemporalLayer<G, V, P>>>,
        source: Arc<S>,
        events: EventBus,
        sync_config: SyncConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            kgs,
            temporal,
            source,
            events,
            sync_config,
            queue: OperationQueue::new(),
            queue_notify: Notify::new(),
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            operations: DashMap::new(),
            work: DashMap::new(),
            tuning: DashMap::new(),
            cancelled: DashSet::new(),
            stats: Mutex::new(Statistics::default()),
        });
        tokio::spawn(Inner::drive(Arc::clone(&inner)));
        Self { inner }
    }

    /// `startFullSync(opts)` (spec §4.1): `request.paths` explicit, or
    /// enumerated from the configured source.
    pub async fn start_full_sync(&self, request: FullSyncRequest) -> String {
        let paths = match request.paths {
            Some(p) => p,
            None => self.inner.source.list_files().await.unwrap_or_default(),
        };
        Inner::enqueue(&self.inner, SyncOperationType::Full, Work::Full { paths }, request.options)
    }

    /// `syncFileChanges(changes, opts)` (spec §4.1).
    #[must_use]
    pub fn sync_file_changes(&self, changes: Vec<FileChange>, opts: SyncOptions) -> String {
        Inner::enqueue(&self.inner, SyncOperationType::Incremental, Work::Incremental { changes }, opts)
    }

    /// `syncPartial(updates, opts)` (spec §4.1).
    #[must_use]
    pub fn sync_partial(&self, updates: Vec<PartialUpdate>, opts: SyncOptions) -> String {
        Inner::enqueue(&self.inner, SyncOperationType::Partial, Work::Partial { updates }, opts)
    }

    /// `cancel(opId)` (spec §4.1): removes a still-queued operation outright,
    /// or marks a running one for cooperative cancellation at its next
    /// batch/file boundary. Returns `false` if `op_id` is unknown.
    #[must_use]
    pub fn cancel(&self, op_id: &str) -> bool {
        self.inner.cancel(op_id)
    }

    /// `pause()` (spec §4.1): the driver loop stops popping new operations;
    /// whatever is currently running finishes normally.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Release);
    }

    /// `resume()` (spec §4.1).
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Release);
        self.inner.resume_notify.notify_one();
    }

    /// `getStatus(opId)` (spec §4.1).
    #[must_use]
    pub fn get_status(&self, op_id: &str) -> Option<SyncOperation> {
        self.inner.operations.get(op_id).map(|e| e.value().clone())
    }

    /// `getStatistics()` (spec §4.1, §7).
    #[must_use]
    pub fn get_statistics(&self) -> Statistics {
        *self.inner.stats.lock()
    }

    /// `updateTuning(opId, tuning)` (spec §4.1 "Scheduling model"). Applies
    /// from the operation's next batch onward; has no effect once the
    /// operation has finished.
    pub fn update_tuning(&self, op_id: &str, tuning: TuningOptions) {
        self.inner.tuning.insert(op_id.to_string(), tuning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseResult, ParsedRelationship, RelationshipTarget};
    use async_trait::async_trait;
    use memento_core::{Entity, EntityType, RelationshipType, Result};
    use memento_embeddings::MockEmbeddingProvider;
    use memento_graph_store::InMemoryGraphStore;
    use memento_vector_store::InMemoryVectorStore;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration as StdDuration;

    struct FixtureSource {
        files: StdMutex<HashMap<String, ParseResult>>,
    }

    #[async_trait]
    impl RepositorySource for FixtureSource {
        async fn parse_file(&self, path: &str) -> Result<ParseResult> {
            Ok(self.files.lock().unwrap().get(path).cloned().unwrap_or_default())
        }

        async fn list_files(&self) -> Result<Vec<String>> {
            let mut keys: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
            keys.sort();
            Ok(keys)
        }
    }

    type TestCoordinator = Coordinator<InMemoryGraphStore, InMemoryVectorStore, MockEmbeddingProvider, FixtureSource>;

    fn new_coordinator(files: HashMap<String, ParseResult>) -> TestCoordinator {
        let graph = Arc::new(InMemoryGraphStore::new());
        let vectors = Arc::new(InMemoryVectorStore::new());
        let provider = Arc::new(MockEmbeddingProvider::new(8));
        let events = EventBus::new();
        let kgs = Arc::new(KnowledgeGraphService::new(graph, provider, vectors, events.clone()));
        let source = Arc::new(FixtureSource { files: StdMutex::new(files) });
        Coordinator::new(kgs, None, source, events, SyncConfig { retry_delay_secs: 0, ..SyncConfig::default() })
    }

    async fn wait_for_terminal(coordinator: &TestCoordinator, op_id: &str) -> SyncOperation {
        for _ in 0..200 {
            if let Some(op) = coordinator.get_status(op_id) {
                if matches!(
                    op.status,
                    crate::operation::OperationStatus::Completed
                        | crate::operation::OperationStatus::Failed
                        | crate::operation::OperationStatus::RolledBack
                ) {
                    return op;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        panic!("operation {op_id} did not reach a terminal state in time");
    }

    fn file_entity(id: &str) -> Entity {
        let mut e = Entity::new(id, EntityType::File);
        e.path = Some(id.to_string());
        e
    }

    #[tokio::test]
    async fn full_sync_creates_entities_and_completes() {
        let mut a = ParseResult::default();
        a.entities.push(file_entity("src/a.ts"));
        let mut files = HashMap::new();
        files.insert("src/a.ts".to_string(), a);
        let coordinator = new_coordinator(files);

        let op_id = coordinator.start_full_sync(FullSyncRequest::default()).await;
        let op = wait_for_terminal(&coordinator, &op_id).await;

        assert_eq!(op.status, crate::operation::OperationStatus::Completed);
        assert_eq!(op.counters.entities_created, 1);
        assert_eq!(coordinator.get_statistics().completed, 1);
    }

    #[tokio::test]
    async fn full_sync_resolves_relationship_across_files_in_one_operation() {
        let mut a = ParseResult::default();
        a.entities.push(file_entity("src/a.ts"));
        let mut sym = Entity::new("sym:foo", EntityType::Symbol);
        sym.path = Some("src/a.ts".to_string());
        sym.name = Some("foo".to_string());
        a.entities.push(sym);

        let mut b = ParseResult::default();
        b.entities.push(file_entity("src/b.ts"));
        b.relationships.push(ParsedRelationship {
            from_entity_id: "src/b.ts".to_string(),
            rel_type: RelationshipType::Calls,
            target: RelationshipTarget::SymbolRef { name: "foo".to_string(), file_hint: None },
            created: Utc::now(),
            metadata: HashMap::new(),
            location: None,
        });

        let mut files = HashMap::new();
        files.insert("src/a.ts".to_string(), a);
        files.insert("src/b.ts".to_string(), b);
        let coordinator = new_coordinator(files);

        let mut opts = SyncOptions::default();
        opts.timeout = StdDuration::from_secs(60);
        let op_id = coordinator.start_full_sync(FullSyncRequest { paths: None, options: opts }).await;
        let op = wait_for_terminal(&coordinator, &op_id).await;

        assert_eq!(op.status, crate::operation::OperationStatus::Completed);
        assert_eq!(op.counters.relationships_created, 1);
    }

    #[tokio::test]
    async fn incremental_delete_removes_the_file_entity() {
        let mut a = ParseResult::default();
        a.entities.push(file_entity("src/a.ts"));
        let mut files = HashMap::new();
        files.insert("src/a.ts".to_string(), a);
        let coordinator = new_coordinator(files);

        let first = coordinator.start_full_sync(FullSyncRequest::default()).await;
        wait_for_terminal(&coordinator, &first).await;

        let op_id = coordinator.sync_file_changes(
            vec![FileChange { path: "src/a.ts".to_string(), change_type: crate::options::FileChangeType::Delete }],
            SyncOptions::default(),
        );
        let op = wait_for_terminal(&coordinator, &op_id).await;
        assert_eq!(op.status, crate::operation::OperationStatus::Completed);
        assert_eq!(op.counters.entities_deleted, 1);
    }

    #[tokio::test]
    async fn cancel_before_start_fails_the_operation_without_running_it() {
        let coordinator = new_coordinator(HashMap::new());
        coordinator.pause();
        let op_id = coordinator.start_full_sync(FullSyncRequest::default()).await;
        assert!(coordinator.cancel(&op_id));
        coordinator.resume();

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        let op = coordinator.get_status(&op_id).expect("operation recorded");
        assert_eq!(op.status, crate::operation::OperationStatus::Failed);
    }

    #[tokio::test]
    async fn statistics_track_total_and_completed_counts() {
        let coordinator = new_coordinator(HashMap::new());
        let op1 = coordinator.start_full_sync(FullSyncRequest::default()).await;
        wait_for_terminal(&coordinator, &op1).await;
        let stats = coordinator.get_statistics();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 0);
    }
}
