//! Cache invalidation and warming independent of the write-behind flush.
//!
//! Invalidation must be triggerable on its own (after direct writes that
//! bypass the buffer, or for manual cache clearing), and warming primes the
//! read-through cache ahead of expected traffic.

use std::sync::Arc;

use fgacache_client::{ActivityLog, CheckRequest, TupleKey};
use tracing::{debug, warn};

use crate::cache::{InvalidationFilter, ReadThroughCache};
use crate::error::{CacheError, CacheResult};

/// Evicts or pre-populates read-through cache entries.
pub struct CacheWarmer {
    cache: Arc<ReadThroughCache>,
    activity: Option<Arc<dyn ActivityLog>>,
}

impl CacheWarmer {
    /// Creates a warmer over the given cache.
    pub fn new(cache: Arc<ReadThroughCache>) -> Self {
        Self {
            cache,
            activity: None,
        }
    }

    /// Attaches an activity log for [`warm_from_activity`](Self::warm_from_activity).
    pub fn with_activity_log(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Removes every cached entry matching the filter. Pass-through to the
    /// read-through cache; returns the number of entries removed.
    pub async fn invalidate(&self, filter: &InvalidationFilter) -> usize {
        self.cache.invalidate(filter).await
    }

    /// Primes the cache for the full `users x relations x objects` cross
    /// product and returns how many entries are now cached.
    ///
    /// Deliberately synchronous and sequential; large cross products are the
    /// caller's responsibility to chunk. A failed probe is skipped so one
    /// unreachable object does not void the rest of the pass.
    pub async fn warm_batch(
        &self,
        connection: &str,
        users: &[String],
        relations: &[String],
        objects: &[String],
    ) -> usize {
        let mut warmed = 0;
        for user in users {
            for relation in relations {
                for object in objects {
                    let request = CheckRequest::new(connection, user, relation, object);
                    match self.cache.check(&request).await {
                        Ok(_) => warmed += 1,
                        Err(error) => {
                            warn!(%user, %relation, %object, %error, "warm probe failed");
                        }
                    }
                }
            }
        }
        debug!(connection, warmed, "warm batch complete");
        warmed
    }

    /// Primes the cache from recently-checked tuples ranked by the activity
    /// log, bounded by `limit`. Returns how many entries are now cached.
    ///
    /// An activity-log failure propagates: without the ranked list there is
    /// nothing to warm.
    pub async fn warm_from_activity(&self, connection: &str, limit: usize) -> CacheResult<usize> {
        let activity = self
            .activity
            .as_ref()
            .ok_or(CacheError::ActivityLogNotConfigured)?;

        let tuples: Vec<TupleKey> = activity.recent_checks(connection, limit).await?;

        let mut warmed = 0;
        for tuple in tuples.iter().take(limit) {
            let request =
                CheckRequest::new(connection, &tuple.user, &tuple.relation, &tuple.object);
            match self.cache.check(&request).await {
                Ok(_) => warmed += 1,
                Err(error) => {
                    warn!(tuple = %tuple, %error, "warm probe failed");
                }
            }
        }
        debug!(connection, warmed, "activity-driven warm complete");
        Ok(warmed)
    }
}
