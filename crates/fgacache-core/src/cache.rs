//! Read-through check cache with TTL and targeted invalidation.
//!
//! Uses Moka's async cache for lock-free concurrent access with built-in
//! TTL-based eviction, plus a `(connection, object)` secondary index so the
//! flush path can invalidate affected entries in O(K) for K entries on the
//! object instead of scanning the whole cache.
//!
//! # Key Design
//!
//! Cache keys include `(connection, user, relation, object, context_hash)`.
//! The context hash folds in any contextual tuples and condition context
//! supplied to a check, so context-dependent answers never collide with
//! plain ones. Entries are stored whole and overwritten whole; expired
//! entries are treated as misses and never served.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use fgacache_client::{AuthorizationClient, CheckRequest, TupleKey};
use moka::future::Cache;
use tracing::debug;

use crate::config::CacheSettings;
use crate::error::CacheResult;
use crate::stats::{StatsRegistry, StatsSnapshot};

/// Cache key that uniquely identifies a check operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// The connection the check ran against.
    pub connection: String,
    /// The user performing the access (e.g., "user:alice").
    pub user: String,
    /// The relation that was checked (e.g., "viewer").
    pub relation: String,
    /// The object that was checked (e.g., "document:doc1").
    pub object: String,
    /// Stable hash of contextual tuples and condition context.
    pub context_hash: u64,
}

impl CacheKey {
    /// Derives the cache key for a check request.
    pub fn from_request(request: &CheckRequest) -> Self {
        Self {
            connection: request.connection.clone(),
            user: request.user.clone(),
            relation: request.relation.clone(),
            object: request.object.clone(),
            context_hash: context_hash(request),
        }
    }
}

/// Stable hash over a request's contextual tuples and condition context.
///
/// Contextual tuples are order-insensitive. `serde_json` maps are ordered,
/// so the string form of the context is canonical for equal content.
fn context_hash(request: &CheckRequest) -> u64 {
    let mut hasher = DefaultHasher::new();
    let mut tuples = request.contextual_tuples.clone();
    tuples.sort();
    for tuple in &tuples {
        tuple.hash(&mut hasher);
    }
    if let Some(context) = &request.context {
        context.to_string().hash(&mut hasher);
    }
    hasher.finish()
}

/// Result of a cached check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    /// The authorization decision.
    pub allowed: bool,
    /// Whether the decision was served from cache.
    pub from_cache: bool,
}

/// Filter selecting cache entries for invalidation.
///
/// Every supplied field must match; an omitted field is a wildcard. An empty
/// filter matches the entire cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationFilter {
    pub user: Option<String>,
    pub relation: Option<String>,
    pub object: Option<String>,
}

impl InvalidationFilter {
    /// Creates an empty (match-all) filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the filter to a user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Restricts the filter to a relation.
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Restricts the filter to an object.
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    fn matches(&self, key: &CacheKey) -> bool {
        self.user.as_ref().is_none_or(|u| *u == key.user)
            && self.relation.as_ref().is_none_or(|r| *r == key.relation)
            && self.object.as_ref().is_none_or(|o| *o == key.object)
    }
}

/// Read-through cache over the remote check surface.
///
/// On a hit the cached decision is returned without contacting the service.
/// On a miss the calling task blocks for one remote `check`, the result is
/// stored under the configured TTL, and the fresh decision is returned. A
/// failed remote check propagates to the caller uncached.
///
/// # Thread Safety
///
/// Fully thread-safe; share behind `Arc` without external synchronization.
pub struct ReadThroughCache {
    /// The underlying Moka cache storing check decisions.
    entries: Cache<CacheKey, bool>,
    /// Secondary index: `(connection, object)` -> keys, for O(K) invalidation.
    by_object: DashMap<(String, String), HashSet<CacheKey>>,
    client: Arc<dyn AuthorizationClient>,
    stats: Arc<StatsRegistry>,
}

impl std::fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("entry_count", &self.entries.entry_count())
            .field("object_index_size", &self.by_object.len())
            .finish()
    }
}

impl ReadThroughCache {
    /// Creates a cache with the given settings, client, and stats registry.
    pub fn new(
        settings: &CacheSettings,
        client: Arc<dyn AuthorizationClient>,
        stats: Arc<StatsRegistry>,
    ) -> Self {
        let entries = Cache::builder()
            .max_capacity(settings.max_capacity)
            .time_to_live(settings.ttl())
            .build();

        Self {
            entries,
            by_object: DashMap::new(),
            client,
            stats,
        }
    }

    /// Performs a permission check through the cache.
    pub async fn check(&self, request: &CheckRequest) -> CacheResult<CheckOutcome> {
        let key = CacheKey::from_request(request);

        if let Some(allowed) = self.lookup(&key).await {
            return Ok(CheckOutcome {
                allowed,
                from_cache: true,
            });
        }

        // Miss: the remote fetch happens outside any lock, and a failed
        // check is never cached as either answer.
        let allowed = self.client.check(request).await?;
        self.insert(key, allowed).await;
        Ok(CheckOutcome {
            allowed,
            from_cache: false,
        })
    }

    /// Retrieves a cached decision, recording hit/miss counters.
    async fn lookup(&self, key: &CacheKey) -> Option<bool> {
        let result = self.entries.get(key).await;
        if result.is_some() {
            self.stats.record_hit();
            metrics::counter!("fgacache_cache_hits_total").increment(1);
        } else {
            self.stats.record_miss();
            metrics::counter!("fgacache_cache_misses_total").increment(1);
        }
        result
    }

    /// Stores a decision and updates the secondary index.
    async fn insert(&self, key: CacheKey, allowed: bool) {
        let index_key = (key.connection.clone(), key.object.clone());
        self.by_object
            .entry(index_key)
            .or_default()
            .insert(key.clone());
        self.entries.insert(key, allowed).await;
    }

    /// Removes every entry whose key matches all supplied filters, across
    /// connections and context variants. Returns the number removed.
    pub async fn invalidate(&self, filter: &InvalidationFilter) -> usize {
        let removed = match &filter.object {
            Some(object) => self.invalidate_indexed(object.clone(), filter).await,
            None => self.invalidate_scan(filter).await,
        };
        debug!(removed, ?filter, "invalidated cache entries");
        removed
    }

    /// Object-targeted invalidation via the secondary index: O(K) for K
    /// entries on the object, instead of O(N) over the whole cache.
    async fn invalidate_indexed(&self, object: String, filter: &InvalidationFilter) -> usize {
        let index_keys: Vec<(String, String)> = self
            .by_object
            .iter()
            .filter(|entry| entry.key().1 == object)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for index_key in index_keys {
            // Atomic remove() so no concurrent insert can add keys between
            // reading and removing the set.
            let Some((_, keys)) = self.by_object.remove(&index_key) else {
                continue;
            };
            let mut kept = HashSet::new();
            for key in keys {
                if filter.matches(&key) {
                    self.entries.invalidate(&key).await;
                    removed += 1;
                } else {
                    kept.insert(key);
                }
            }
            if !kept.is_empty() {
                // Merge survivors back; the entry may have been re-created
                // by a concurrent insert in the meantime.
                self.by_object.entry(index_key).or_default().extend(kept);
            }
        }
        removed
    }

    /// Wildcard-object invalidation: full predicate scan.
    async fn invalidate_scan(&self, filter: &InvalidationFilter) -> usize {
        self.entries.run_pending_tasks().await;

        let keys_to_remove: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, _)| filter.matches(key.as_ref()))
            .map(|(key, _)| (*key).clone())
            .collect();

        let mut removed = 0;
        for key in keys_to_remove {
            self.remove_from_index(&key);
            self.entries.invalidate(&key).await;
            removed += 1;
        }
        removed
    }

    /// Invalidates every cached entry touching the tuple's object.
    ///
    /// Called after a flushed batch is confirmed by the remote store. The
    /// scope is deliberately conservative: a tuple write can flip answers
    /// for other users and relations on the same object once the service
    /// evaluates its model, so all entries for `(connection, object)` go.
    pub async fn invalidate_for_tuple(&self, connection: &str, tuple: &TupleKey) -> usize {
        let index_key = (connection.to_string(), tuple.object.clone());
        let Some((_, keys)) = self.by_object.remove(&index_key) else {
            return 0;
        };

        let mut removed = 0;
        for key in &keys {
            self.entries.invalidate(key).await;
            removed += 1;
        }
        debug!(connection, %tuple, removed, "invalidated entries for flushed tuple");
        removed
    }

    fn remove_from_index(&self, key: &CacheKey) {
        let index_key = (key.connection.clone(), key.object.clone());
        if let Some(mut keys) = self.by_object.get_mut(&index_key) {
            keys.remove(key);
        }
    }

    /// Returns a snapshot of the shared stats registry.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Resets the shared stats registry.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Approximate number of cached entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Runs pending maintenance tasks (triggers TTL evictions). Test hook.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }
}
