//! Core error types for cache and write-behind operations.

use fgacache_client::ClientError;
use thiserror::Error;

/// Errors surfaced by the caching core.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Remote call failure during a cache-miss check or a flush send.
    /// Never cached, never retried by the core.
    #[error("authorization client error: {0}")]
    Client(#[from] ClientError),

    /// Write-behind buffering was invoked while disabled by configuration.
    #[error("write-behind buffering is disabled")]
    WriteBehindDisabled,

    /// One or more batches in a flush cycle failed to send.
    ///
    /// The counts describe what *was* confirmed by the remote store before
    /// the failure; operations in failed batches are dropped (at-most-once).
    #[error("flush failed for {failed_batches} batch(es); {writes} writes and {deletes} deletes were confirmed")]
    FlushFailed {
        failed_batches: usize,
        writes: usize,
        deletes: usize,
    },

    /// Activity-driven warming was requested without an activity log.
    #[error("no activity log configured")]
    ActivityLogNotConfigured,
}

/// Result type for core operations.
pub type CacheResult<T> = Result<T, CacheError>;
