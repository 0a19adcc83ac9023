//! Write-behind buffering of grants and revokes with batched flush.
//!
//! Grants and revokes are enqueued and return immediately; a background
//! scheduler flushes queued operations to the authorization service in
//! batches, triggered by a recurring timer, by the pending count reaching
//! the batch size, or by an explicit flush request. After each batch is
//! confirmed by the remote store, affected read-through cache entries are
//! invalidated so no stale answer survives a write.
//!
//! # State machine
//!
//! `Disabled -> Idle -> Flushing -> Idle` (loops). `Disabled` is terminal
//! until configuration changes. Only one flush is in-flight at a time:
//! automatic triggers arriving while flushing are coalesced, because the
//! in-flight flush loops until the queue is empty anyway.
//!
//! # Delivery guarantee
//!
//! At-most-once per flushed batch. A batch that fails to send is dropped,
//! counted in `flush_errors`, and surfaced to the flush caller; it is never
//! requeued, so a permanently failing backend cannot trap the process in a
//! retry loop. Callers needing the lost operations must re-issue them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fgacache_client::{AuthorizationClient, TupleKey};
use serde::Serialize;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::ReadThroughCache;
use crate::config::CacheSettings;
use crate::error::{CacheError, CacheResult};
use crate::queue::{OperationKind, PendingOperation, PendingOperationQueue, QueueCounts};
use crate::stats::StatsRegistry;

/// Bound on the pending-operation views exposed for operator display.
const RECENT_OPERATIONS_LIMIT: usize = 10;

/// Lifecycle state of the write-behind cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteBehindState {
    /// The feature is turned off; grants and revokes are rejected.
    Disabled,
    /// Accepting operations, no flush in-flight.
    Idle,
    /// A flush is draining the queue.
    Flushing,
}

/// Counts confirmed by the remote store in one flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub writes: usize,
    pub deletes: usize,
}

/// Operator-facing status of the write-behind cache.
#[derive(Debug, Clone, Serialize)]
pub struct WriteBehindStatus {
    pub pending_writes: usize,
    pub pending_deletes: usize,
    pub pending_total: usize,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    /// Most recently enqueued operations, newest first, bounded.
    pub recent: Vec<PendingOperation>,
}

/// Write-behind cache buffering permission mutations.
///
/// Exactly one instance should own a given connection's queue; two
/// independent flush loops against the same backend store can reorder or
/// duplicate writes.
pub struct WriteBehindCache {
    settings: CacheSettings,
    connection: String,
    queue: PendingOperationQueue,
    cache: Arc<ReadThroughCache>,
    client: Arc<dyn AuthorizationClient>,
    stats: Arc<StatsRegistry>,
    /// Serializes flush cycles. Automatic triggers `try_lock` and coalesce;
    /// a manual flush waits so its caller gets accurate counts.
    flush_lock: Mutex<()>,
    flushing: AtomicBool,
    /// Wakes the scheduler when the pending count reaches the batch size.
    wakeup: Notify,
    shutdown_tx: watch::Sender<bool>,
    scheduler: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl WriteBehindCache {
    /// Creates a write-behind cache for one connection.
    ///
    /// The background scheduler is not running yet; call
    /// [`start`](Self::start) to launch it.
    pub fn new(
        settings: CacheSettings,
        connection: impl Into<String>,
        client: Arc<dyn AuthorizationClient>,
        cache: Arc<ReadThroughCache>,
        stats: Arc<StatsRegistry>,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            settings,
            connection: connection.into(),
            queue: PendingOperationQueue::new(),
            cache,
            client,
            stats,
            flush_lock: Mutex::new(()),
            flushing: AtomicBool::new(false),
            wakeup: Notify::new(),
            shutdown_tx,
            scheduler: std::sync::Mutex::new(None),
        })
    }

    /// Launches the background flush scheduler.
    ///
    /// No-op when the feature is disabled or the scheduler already runs.
    pub fn start(self: &Arc<Self>) {
        if !self.settings.enabled {
            return;
        }
        let mut slot = self
            .scheduler
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return;
        }

        let this = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.settings.flush_interval());
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = this.wakeup.notified() => {}
                    _ = shutdown_rx.changed() => break,
                }
                if this.queue.counts().total == 0 {
                    continue;
                }
                // Coalesce: if a flush is already in-flight it will drain
                // everything enqueued so far once it completes.
                if let Ok(guard) = this.flush_lock.try_lock() {
                    if let Err(error) = this.flush_locked(&guard).await {
                        warn!(connection = %this.connection, %error, "scheduled flush failed");
                    }
                }
            }
            debug!(connection = %this.connection, "flush scheduler stopped");
        });
        *slot = Some(handle);
        info!(
            connection = %self.connection,
            interval_ms = self.settings.flush_interval_ms,
            batch_size = self.settings.batch_size,
            "flush scheduler started"
        );
    }

    /// Stops the scheduler, joins it, and drains any remaining operations.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = {
            let mut slot = self
                .scheduler
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        // One final drain so accepted operations are not silently dropped.
        if self.settings.enabled && self.queue.counts().total > 0 {
            if let Err(error) = self.flush().await {
                warn!(connection = %self.connection, %error, "final drain on shutdown failed");
            }
        }
    }

    /// Buffers a tuple grant. Returns immediately; no network call.
    pub fn grant(
        &self,
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> CacheResult<()> {
        self.enqueue(OperationKind::Write, TupleKey::new(user, relation, object))
    }

    /// Buffers a tuple revoke. Returns immediately; no network call.
    pub fn revoke(
        &self,
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> CacheResult<()> {
        self.enqueue(OperationKind::Delete, TupleKey::new(user, relation, object))
    }

    fn enqueue(&self, kind: OperationKind, tuple: TupleKey) -> CacheResult<()> {
        if !self.settings.enabled {
            return Err(CacheError::WriteBehindDisabled);
        }
        self.queue.enqueue(kind, tuple);
        if self.queue.counts().total >= self.settings.batch_size {
            self.wakeup.notify_one();
        }
        Ok(())
    }

    /// Synchronously drains the queue in batches, invalidating cache
    /// entries after each confirmed send.
    ///
    /// Waits for any in-flight flush to finish first, then flushes what is
    /// queued. An empty queue yields a zero-count success. On a failed send
    /// the loop stops and [`CacheError::FlushFailed`] reports both the
    /// failure and what was confirmed before it.
    pub async fn flush(&self) -> CacheResult<FlushSummary> {
        if !self.settings.enabled {
            return Err(CacheError::WriteBehindDisabled);
        }
        let guard = self.flush_lock.lock().await;
        self.flush_locked(&guard).await
    }

    /// The flush cycle proper. Caller holds the flush lock.
    async fn flush_locked(&self, _guard: &tokio::sync::MutexGuard<'_, ()>) -> CacheResult<FlushSummary> {
        self.flushing.store(true, Ordering::SeqCst);
        let result = self.drain_all().await;
        self.flushing.store(false, Ordering::SeqCst);
        result
    }

    async fn drain_all(&self) -> CacheResult<FlushSummary> {
        let mut summary = FlushSummary::default();

        loop {
            let batch = self.queue.drain_batch(self.settings.batch_size);
            if batch.is_empty() {
                break;
            }
            debug!(
                connection = %self.connection,
                writes = batch.writes.len(),
                deletes = batch.deletes.len(),
                remaining = batch.remaining,
                "flushing batch"
            );

            if !batch.writes.is_empty() {
                if let Err(error) = self
                    .client
                    .write_tuples(&self.connection, batch.writes.clone())
                    .await
                {
                    return Err(self.batch_failed(&summary, error, batch.len()));
                }
                summary.writes += batch.writes.len();
                self.stats.record_flushed_writes(batch.writes.len() as u64);
                metrics::counter!("fgacache_flushed_writes_total")
                    .increment(batch.writes.len() as u64);
                self.invalidate_batch(&batch.writes).await;
            }

            if !batch.deletes.is_empty() {
                if let Err(error) = self
                    .client
                    .delete_tuples(&self.connection, batch.deletes.clone())
                    .await
                {
                    return Err(self.batch_failed(&summary, error, batch.deletes.len()));
                }
                summary.deletes += batch.deletes.len();
                self.stats
                    .record_flushed_deletes(batch.deletes.len() as u64);
                metrics::counter!("fgacache_flushed_deletes_total")
                    .increment(batch.deletes.len() as u64);
                self.invalidate_batch(&batch.deletes).await;
            }
        }

        if summary.writes > 0 || summary.deletes > 0 {
            info!(
                connection = %self.connection,
                writes = summary.writes,
                deletes = summary.deletes,
                "flush complete"
            );
        }
        Ok(summary)
    }

    /// Records a failed send. The drained-but-unsent operations are lost by
    /// policy; the error carries what was confirmed before the failure.
    fn batch_failed(
        &self,
        summary: &FlushSummary,
        error: fgacache_client::ClientError,
        dropped: usize,
    ) -> CacheError {
        self.stats.record_flush_error();
        metrics::counter!("fgacache_flush_errors_total").increment(1);
        warn!(
            connection = %self.connection,
            %error,
            dropped,
            "batch send failed; operations dropped"
        );
        CacheError::FlushFailed {
            failed_batches: 1,
            writes: summary.writes,
            deletes: summary.deletes,
        }
    }

    /// Invalidation happens strictly after the batch's remote send has
    /// succeeded, so a racing check may observe the pre-flush answer but
    /// never an invalidated-then-stale combination.
    async fn invalidate_batch(&self, tuples: &[TupleKey]) {
        for tuple in tuples {
            self.cache
                .invalidate_for_tuple(&self.connection, tuple)
                .await;
        }
    }

    /// Point-in-time pending counts.
    pub fn pending_counts(&self) -> QueueCounts {
        self.queue.counts()
    }

    /// Recent pending operations per kind, for inspection.
    pub fn pending_operations(&self) -> (Vec<PendingOperation>, Vec<PendingOperation>) {
        self.queue.pending_operations(RECENT_OPERATIONS_LIMIT)
    }

    /// Discards all unflushed operations and returns how many were dropped.
    ///
    /// Destructive: the discarded grants and revokes never reach the remote
    /// store. Confirmation is the management surface's responsibility.
    pub fn clear(&self) -> usize {
        let discarded = self.queue.clear();
        if discarded > 0 {
            info!(
                connection = %self.connection,
                discarded,
                "pending operations discarded without flushing"
            );
        }
        discarded
    }

    /// Operator status view.
    pub fn status(&self) -> WriteBehindStatus {
        let counts = self.queue.counts();
        WriteBehindStatus {
            pending_writes: counts.writes,
            pending_deletes: counts.deletes,
            pending_total: counts.total,
            batch_size: self.settings.batch_size,
            flush_interval_ms: self.settings.flush_interval_ms,
            recent: self.queue.recent(RECENT_OPERATIONS_LIMIT),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WriteBehindState {
        if !self.settings.enabled {
            WriteBehindState::Disabled
        } else if self.flushing.load(Ordering::SeqCst) {
            WriteBehindState::Flushing
        } else {
            WriteBehindState::Idle
        }
    }
}
