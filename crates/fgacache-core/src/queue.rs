//! Thread-safe buffer of pending write and delete operations.
//!
//! The queue preserves global insertion order across both kinds via a
//! monotonic sequence number, and collapses contradictory operations for the
//! same tuple at enqueue time so that the most recent operation wins. All
//! mutation happens under one tightly-scoped mutex; nothing network-facing
//! ever runs while it is held.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use fgacache_client::TupleKey;
use serde::Serialize;
use tracing::debug;

/// The kind of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationKind {
    /// A tuple grant waiting to be written to the remote store.
    Write,
    /// A tuple revoke waiting to be deleted from the remote store.
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Write => write!(f, "write"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A buffered operation awaiting flush.
///
/// Created when a grant or revoke is accepted while write-behind mode is
/// active; removed only by a drain or an explicit clear; never mutated in
/// place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub tuple: TupleKey,
    pub enqueued_at: DateTime<Utc>,
    /// Global insertion order across both kinds.
    seq: u64,
}

impl PendingOperation {
    fn new(kind: OperationKind, tuple: TupleKey, seq: u64) -> Self {
        Self {
            kind,
            tuple,
            enqueued_at: Utc::now(),
            seq,
        }
    }
}

/// Snapshot of queue occupancy. `writes + deletes == total` at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub writes: usize,
    pub deletes: usize,
    pub total: usize,
}

/// Operations removed by one [`PendingOperationQueue::drain_batch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedBatch {
    /// Drained write tuples, in insertion order.
    pub writes: Vec<TupleKey>,
    /// Drained delete tuples, in insertion order.
    pub deletes: Vec<TupleKey>,
    /// Operations still queued after this drain.
    pub remaining: usize,
}

impl DrainedBatch {
    /// Whether the drain removed nothing.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }

    /// Number of operations removed by this drain.
    pub fn len(&self) -> usize {
        self.writes.len() + self.deletes.len()
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    writes: VecDeque<PendingOperation>,
    deletes: VecDeque<PendingOperation>,
    /// Kind of the single net-pending operation per tuple.
    pending_kind: HashMap<TupleKey, OperationKind>,
    next_seq: u64,
}

/// Thread-safe ordered buffer of pending write and delete operations.
///
/// # Tie-break rule
///
/// If a tuple is enqueued with the opposite kind of an operation already
/// pending (grant then revoke before any flush, or vice versa), the earlier
/// operation is superseded and silently dropped: only the most recent
/// operation for a tuple is ever flushed. A same-kind duplicate is a no-op
/// and keeps the original queue position. Counts therefore always reflect
/// distinct tuples with a net-pending operation.
#[derive(Debug, Default)]
pub struct PendingOperationQueue {
    inner: Mutex<QueueInner>,
}

impl PendingOperationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        // A poisoning panic cannot originate inside these critical sections;
        // recover the guard rather than propagate the poison.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends an operation, applying the tie-break rule. O(1) except when
    /// superseding an opposite-kind entry, which scans that kind's queue.
    pub fn enqueue(&self, kind: OperationKind, tuple: TupleKey) {
        let mut inner = self.lock();

        match inner.pending_kind.get(&tuple).copied() {
            Some(existing) if existing == kind => {
                // Already pending with the same effect.
                debug!(%tuple, %kind, "duplicate pending operation ignored");
                return;
            }
            Some(_) => {
                // Later operation wins; drop the contradictory one.
                match kind {
                    OperationKind::Write => inner.deletes.retain(|op| op.tuple != tuple),
                    OperationKind::Delete => inner.writes.retain(|op| op.tuple != tuple),
                }
                debug!(%tuple, %kind, "superseded contradictory pending operation");
            }
            None => {}
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let op = PendingOperation::new(kind, tuple.clone(), seq);
        match kind {
            OperationKind::Write => inner.writes.push_back(op),
            OperationKind::Delete => inner.deletes.push_back(op),
        }
        inner.pending_kind.insert(tuple, kind);
    }

    /// Atomically removes up to `max` operations in global insertion order.
    ///
    /// Operations enqueued concurrently with a drain are neither included in
    /// its result nor lost; they stay queued for the next drain.
    pub fn drain_batch(&self, max: usize) -> DrainedBatch {
        let mut inner = self.lock();
        let mut writes = Vec::new();
        let mut deletes = Vec::new();

        while writes.len() + deletes.len() < max {
            // Pop whichever head was enqueued first.
            let take_write = match (inner.writes.front(), inner.deletes.front()) {
                (Some(w), Some(d)) => w.seq < d.seq,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };

            let op = if take_write {
                inner.writes.pop_front()
            } else {
                inner.deletes.pop_front()
            };
            let Some(op) = op else { break };

            inner.pending_kind.remove(&op.tuple);
            match op.kind {
                OperationKind::Write => writes.push(op.tuple),
                OperationKind::Delete => deletes.push(op.tuple),
            }
        }

        DrainedBatch {
            writes,
            deletes,
            remaining: inner.writes.len() + inner.deletes.len(),
        }
    }

    /// Point-in-time occupancy, safe to call concurrently with any mutation.
    pub fn counts(&self) -> QueueCounts {
        let inner = self.lock();
        QueueCounts {
            writes: inner.writes.len(),
            deletes: inner.deletes.len(),
            total: inner.writes.len() + inner.deletes.len(),
        }
    }

    /// Atomically discards every pending operation, returning how many were
    /// dropped without flushing. Operator-initiated only; never called
    /// automatically.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let discarded = inner.writes.len() + inner.deletes.len();
        inner.writes.clear();
        inner.deletes.clear();
        inner.pending_kind.clear();
        discarded
    }

    /// The most recently enqueued operations across both kinds, newest
    /// first, bounded by `limit`. Diagnostic view for operator display.
    pub fn recent(&self, limit: usize) -> Vec<PendingOperation> {
        let inner = self.lock();
        let mut ops: Vec<PendingOperation> = inner
            .writes
            .iter()
            .chain(inner.deletes.iter())
            .cloned()
            .collect();
        ops.sort_by(|a, b| b.seq.cmp(&a.seq));
        ops.truncate(limit);
        ops
    }

    /// The most recently enqueued operations per kind, in insertion order,
    /// bounded by `limit` each.
    pub fn pending_operations(
        &self,
        limit: usize,
    ) -> (Vec<PendingOperation>, Vec<PendingOperation>) {
        let inner = self.lock();
        let tail = |ops: &VecDeque<PendingOperation>| {
            ops.iter()
                .skip(ops.len().saturating_sub(limit))
                .cloned()
                .collect()
        };
        (tail(&inner.writes), tail(&inner.deletes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(n: u32) -> TupleKey {
        TupleKey::new("user:1", "viewer", format!("doc:{n}"))
    }

    // ============================================================
    // Section 1: Ordering and counts
    // ============================================================

    #[test]
    fn test_counts_invariant_holds() {
        let queue = PendingOperationQueue::new();
        queue.enqueue(OperationKind::Write, tuple(1));
        queue.enqueue(OperationKind::Write, tuple(2));
        queue.enqueue(OperationKind::Delete, tuple(3));

        let counts = queue.counts();
        assert_eq!(counts.writes, 2);
        assert_eq!(counts.deletes, 1);
        assert_eq!(counts.writes + counts.deletes, counts.total);
    }

    #[test]
    fn test_drain_preserves_global_insertion_order() {
        let queue = PendingOperationQueue::new();
        queue.enqueue(OperationKind::Write, tuple(1));
        queue.enqueue(OperationKind::Delete, tuple(2));
        queue.enqueue(OperationKind::Write, tuple(3));

        // A drain of 2 must take the two oldest operations: the write of
        // doc:1 and the delete of doc:2, not two writes.
        let batch = queue.drain_batch(2);

        assert_eq!(batch.writes, vec![tuple(1)]);
        assert_eq!(batch.deletes, vec![tuple(2)]);
        assert_eq!(batch.remaining, 1);
    }

    #[test]
    fn test_drained_operation_does_not_reappear() {
        let queue = PendingOperationQueue::new();
        queue.enqueue(OperationKind::Write, tuple(1));

        let first = queue.drain_batch(10);
        assert_eq!(first.writes, vec![tuple(1)]);

        // Gone until re-enqueued
        assert!(queue.drain_batch(10).is_empty());

        queue.enqueue(OperationKind::Write, tuple(1));
        let again = queue.drain_batch(10);
        assert_eq!(again.writes, vec![tuple(1)]);
    }

    #[test]
    fn test_drain_respects_max() {
        let queue = PendingOperationQueue::new();
        for n in 0..5 {
            queue.enqueue(OperationKind::Write, tuple(n));
        }

        let batch = queue.drain_batch(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.remaining, 3);

        let batch = queue.drain_batch(10);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.remaining, 0);
    }

    // ============================================================
    // Section 2: Tie-break rule
    // ============================================================

    #[test]
    fn test_later_delete_supersedes_pending_write() {
        let queue = PendingOperationQueue::new();
        let t = TupleKey::new("user:1", "viewer", "doc:1");

        queue.enqueue(OperationKind::Write, t.clone());
        queue.enqueue(OperationKind::Delete, t.clone());

        assert_eq!(queue.counts().total, 1);

        let batch = queue.drain_batch(10);
        assert!(batch.writes.is_empty());
        assert_eq!(batch.deletes, vec![t]);
    }

    #[test]
    fn test_later_write_supersedes_pending_delete() {
        let queue = PendingOperationQueue::new();
        let t = TupleKey::new("user:1", "viewer", "doc:1");

        queue.enqueue(OperationKind::Delete, t.clone());
        queue.enqueue(OperationKind::Write, t.clone());

        let batch = queue.drain_batch(10);
        assert_eq!(batch.writes, vec![t]);
        assert!(batch.deletes.is_empty());
    }

    #[test]
    fn test_same_kind_duplicate_collapses() {
        let queue = PendingOperationQueue::new();
        let t = TupleKey::new("user:1", "viewer", "doc:1");

        queue.enqueue(OperationKind::Write, t.clone());
        queue.enqueue(OperationKind::Write, t.clone());
        queue.enqueue(OperationKind::Write, t.clone());

        assert_eq!(queue.counts().total, 1);
        let batch = queue.drain_batch(10);
        assert_eq!(batch.writes, vec![t]);
    }

    #[test]
    fn test_total_counts_distinct_net_pending_tuples() {
        let queue = PendingOperationQueue::new();
        let a = TupleKey::new("user:1", "viewer", "doc:a");
        let b = TupleKey::new("user:1", "viewer", "doc:b");

        // Six calls, two distinct net-pending tuples
        queue.enqueue(OperationKind::Write, a.clone());
        queue.enqueue(OperationKind::Delete, a.clone());
        queue.enqueue(OperationKind::Write, a);
        queue.enqueue(OperationKind::Write, b.clone());
        queue.enqueue(OperationKind::Write, b.clone());
        queue.enqueue(OperationKind::Delete, b);

        let counts = queue.counts();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.writes, 1);
        assert_eq!(counts.deletes, 1);
    }

    // ============================================================
    // Section 3: Clear and diagnostics
    // ============================================================

    #[test]
    fn test_clear_empties_queue_and_reports_exact_count() {
        let queue = PendingOperationQueue::new();
        for n in 0..4 {
            queue.enqueue(OperationKind::Write, tuple(n));
        }
        queue.enqueue(OperationKind::Delete, tuple(9));

        assert_eq!(queue.clear(), 5);
        assert_eq!(queue.counts().total, 0);
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn test_recent_returns_newest_first_bounded() {
        let queue = PendingOperationQueue::new();
        for n in 0..5 {
            queue.enqueue(OperationKind::Write, tuple(n));
        }
        queue.enqueue(OperationKind::Delete, tuple(100));

        let recent = queue.recent(3);

        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].tuple, tuple(100));
        assert_eq!(recent[0].kind, OperationKind::Delete);
        assert_eq!(recent[1].tuple, tuple(4));
        assert_eq!(recent[2].tuple, tuple(3));
    }

    #[test]
    fn test_pending_operations_view_is_bounded_per_kind() {
        let queue = PendingOperationQueue::new();
        for n in 0..5 {
            queue.enqueue(OperationKind::Write, tuple(n));
        }

        let (writes, deletes) = queue.pending_operations(2);

        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].tuple, tuple(3));
        assert_eq!(writes[1].tuple, tuple(4));
        assert!(deletes.is_empty());
    }

    // ============================================================
    // Section 4: Concurrency
    // ============================================================

    #[test]
    fn test_concurrent_enqueue_and_drain_lose_nothing() {
        use std::sync::Arc;

        let queue = Arc::new(PendingOperationQueue::new());
        let mut handles = Vec::new();

        for task in 0..4u32 {
            let queue = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                for n in 0..100u32 {
                    queue.enqueue(
                        OperationKind::Write,
                        TupleKey::new(format!("user:{task}"), "viewer", format!("doc:{n}")),
                    );
                }
            }));
        }

        let drainer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut drained = 0;
                while drained < 400 {
                    drained += queue.drain_batch(16).len();
                }
                drained
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        let drained = drainer.join().unwrap();

        // Every distinct tuple was drained exactly once
        assert_eq!(drained, 400);
        assert_eq!(queue.counts().total, 0);
    }
}
