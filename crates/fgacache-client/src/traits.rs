//! Traits for the remote authorization service and activity log collaborators.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::types::{CheckRequest, ExpandTree, TupleKey};

/// Remote call surface of the relationship-based authorization service.
///
/// Implementations must be thread-safe (`Send + Sync`) and support async
/// operations. Timeouts are the implementation's responsibility; the caching
/// core passes calls through without imposing its own deadline.
#[async_trait]
pub trait AuthorizationClient: Send + Sync + 'static {
    /// Evaluates a permission check against the service.
    ///
    /// Model semantics (union/intersection/exclusion) are evaluated entirely
    /// on the service side.
    async fn check(&self, request: &CheckRequest) -> ClientResult<bool>;

    /// Writes relationship tuples to the service.
    async fn write_tuples(&self, connection: &str, tuples: Vec<TupleKey>) -> ClientResult<()>;

    /// Deletes relationship tuples from the service.
    async fn delete_tuples(&self, connection: &str, tuples: Vec<TupleKey>) -> ClientResult<()>;

    /// Lists objects of `object_type` on which `user` holds `relation`.
    async fn list_objects(
        &self,
        connection: &str,
        object_type: &str,
        relation: &str,
        user: &str,
    ) -> ClientResult<Vec<String>>;

    /// Expands the userset holding `relation` on `object`.
    async fn expand(
        &self,
        connection: &str,
        relation: &str,
        object: &str,
    ) -> ClientResult<ExpandTree>;
}

/// External activity-log collaborator used for cache warming.
///
/// Returns recently-checked tuples ranked most-frequent first. The ranking
/// source (request logs, sampled traffic) is an implementation concern.
#[async_trait]
pub trait ActivityLog: Send + Sync + 'static {
    /// Returns up to `limit` recently-checked tuples for a connection.
    async fn recent_checks(&self, connection: &str, limit: usize) -> ClientResult<Vec<TupleKey>>;
}
