//! fgacache-core: caching and write-buffering core for a remote
//! relationship-based authorization service
//!
//! Two jobs:
//! - Absorb bursts of permission checks with a read-through cache that
//!   stays consistent with the authoritative store via targeted
//!   invalidation.
//! - Decouple grant/revoke latency from callers by buffering mutations and
//!   flushing them in batches (write-behind), with at-most-once delivery
//!   per flushed batch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  fgacache-core                    │
//! ├──────────────────────────────────────────────────┤
//! │  cache.rs         - Read-through check cache     │
//! │  queue.rs         - Pending-operation buffer     │
//! │  write_behind.rs  - Batched flush + scheduler    │
//! │  warmer.rs        - Invalidation & warming       │
//! │  stats.rs         - Hit/miss/flush counters      │
//! │  config.rs        - Typed settings               │
//! │  observability.rs - Logging/metrics bootstrap    │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fgacache_client::MemoryAuthorizationClient;
//! use fgacache_core::{CacheSettings, ReadThroughCache, StatsRegistry, WriteBehindCache};
//!
//! let settings = CacheSettings::default().with_enabled(true);
//! let client = Arc::new(MemoryAuthorizationClient::new());
//! let stats = Arc::new(StatsRegistry::new());
//! let cache = Arc::new(ReadThroughCache::new(&settings, client.clone(), stats.clone()));
//!
//! let write_behind = WriteBehindCache::new(settings, "default", client, cache, stats);
//! write_behind.start();
//!
//! write_behind.grant("user:alice", "viewer", "document:readme")?;
//! // ... flushed in the background; shut down cleanly on exit:
//! write_behind.shutdown().await;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod observability;
pub mod queue;
pub mod stats;
pub mod warmer;
pub mod write_behind;

// Re-export commonly used types at the crate root
pub use cache::{CacheKey, CheckOutcome, InvalidationFilter, ReadThroughCache};
pub use config::{CacheSettings, SettingsError};
pub use error::{CacheError, CacheResult};
pub use queue::{
    DrainedBatch, OperationKind, PendingOperation, PendingOperationQueue, QueueCounts,
};
pub use stats::{StatsRegistry, StatsSnapshot};
pub use warmer::CacheWarmer;
pub use write_behind::{FlushSummary, WriteBehindCache, WriteBehindState, WriteBehindStatus};
