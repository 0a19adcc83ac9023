//! Aggregated cache and flush counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters for cache and flush activity.
///
/// Counters only move forward except on an explicit [`reset`](Self::reset).
/// The registry is shared read-only (behind `Arc`) between the read-through
/// cache, the write-behind cache, and operator surfaces; its lifecycle is
/// the process lifetime.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    hits: AtomicU64,
    misses: AtomicU64,
    flushed_writes: AtomicU64,
    flushed_deletes: AtomicU64,
    flush_errors: AtomicU64,
}

impl StatsRegistry {
    /// Creates a new registry with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flushed_writes(&self, count: u64) {
        self.flushed_writes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_flushed_deletes(&self, count: u64) {
        self.flushed_deletes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_flush_error(&self) {
        self.flush_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            flushed_writes: self.flushed_writes.load(Ordering::Relaxed),
            flushed_deletes: self.flushed_deletes.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.flushed_writes.store(0, Ordering::Relaxed);
        self.flushed_deletes.store(0, Ordering::Relaxed);
        self.flush_errors.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of the registry, safe to serialize for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub flushed_writes: u64,
    pub flushed_deletes: u64,
    pub flush_errors: u64,
}

impl StatsSnapshot {
    /// Cache hit rate in `[0.0, 1.0]`; `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let stats = StatsRegistry::new();
        let snapshot = stats.snapshot();

        assert_eq!(snapshot.hits, 0);
        assert_eq!(snapshot.misses, 0);
        assert_eq!(snapshot.flushed_writes, 0);
        assert_eq!(snapshot.flushed_deletes, 0);
        assert_eq!(snapshot.flush_errors, 0);
        assert_eq!(snapshot.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_is_hits_over_lookups() {
        let stats = StatsRegistry::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hits, 3);
        assert_eq!(snapshot.misses, 1);
        assert!((snapshot.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_flush_counters_accumulate_by_count() {
        let stats = StatsRegistry::new();
        stats.record_flushed_writes(5);
        stats.record_flushed_writes(2);
        stats.record_flushed_deletes(3);
        stats.record_flush_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.flushed_writes, 7);
        assert_eq!(snapshot.flushed_deletes, 3);
        assert_eq!(snapshot.flush_errors, 1);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let stats = StatsRegistry::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_flushed_writes(4);
        stats.record_flush_error();

        stats.reset();

        assert_eq!(stats.snapshot(), StatsSnapshot {
            hits: 0,
            misses: 0,
            flushed_writes: 0,
            flushed_deletes: 0,
            flush_errors: 0,
        });
    }
}
