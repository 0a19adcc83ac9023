//! Value types shared between the caching core and the authorization client.

use serde::{Deserialize, Serialize};

/// A relationship fact: `user` holds `relation` on `object`.
///
/// Immutable with structural equality. Used both as a cache-key component
/// and as the payload unit for writes and deletes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TupleKey {
    /// The user holding the relation (e.g., "user:alice").
    pub user: String,
    /// The relation (e.g., "viewer").
    pub relation: String,
    /// The object the relation applies to (e.g., "document:readme").
    pub object: String,
}

impl TupleKey {
    /// Creates a new tuple key.
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

impl std::fmt::Display for TupleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}@{}", self.user, self.relation, self.object)
    }
}

/// A permission check request against the remote service.
///
/// `contextual_tuples` are evaluated by the service as if they were written,
/// without being persisted. `context` carries an arbitrary JSON map consumed
/// by conditions on the service side; the core treats both as opaque inputs
/// that only influence the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    /// The connection (service-side store) to check against.
    pub connection: String,
    /// The user performing the access (e.g., "user:alice").
    pub user: String,
    /// The relation to check (e.g., "viewer").
    pub relation: String,
    /// The object identifier (e.g., "document:readme").
    pub object: String,
    /// Tuples evaluated as if written, for this request only.
    pub contextual_tuples: Vec<TupleKey>,
    /// Request-scoped condition context.
    pub context: Option<serde_json::Value>,
}

impl CheckRequest {
    /// Creates a new check request with no contextual tuples or context.
    pub fn new(
        connection: impl Into<String>,
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            connection: connection.into(),
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
            contextual_tuples: Vec::new(),
            context: None,
        }
    }

    /// Attaches contextual tuples to the request.
    pub fn with_contextual_tuples(mut self, tuples: Vec<TupleKey>) -> Self {
        self.contextual_tuples = tuples;
        self
    }

    /// Attaches a condition context to the request.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Flattened view of an expand response.
///
/// The core never walks usersets locally (evaluation is remote), so the
/// leaf list is all it needs to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandTree {
    /// The object that was expanded.
    pub object: String,
    /// The relation that was expanded.
    pub relation: String,
    /// Users directly holding the relation on the object.
    pub users: Vec<String>,
}
