//! In-memory authorization client for testing.
//!
//! Uses `HashSet<TupleKey>` per connection for O(1) write/delete/contains
//! operations, with `DashMap` for thread-safe concurrent access without
//! explicit locks.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::traits::AuthorizationClient;
use crate::types::{CheckRequest, ExpandTree, TupleKey};

/// In-memory implementation of [`AuthorizationClient`].
///
/// This is a test double and reference implementation: `check` is direct
/// tuple membership unioned with the request's contextual tuples. There is
/// no model evaluation; union/intersection/exclusion semantics belong to
/// the real remote service.
///
/// # Performance Characteristics
///
/// - **Write/delete tuple**: O(1) average (HashSet insert/remove)
/// - **Check**: O(1) average (HashSet contains)
/// - **List objects / expand**: O(N) where N is tuples in the connection
///
/// Writes and deletes are idempotent: re-writing an existing tuple or
/// deleting an absent one succeeds without effect, which keeps flush tests
/// deterministic.
#[derive(Debug, Default)]
pub struct MemoryAuthorizationClient {
    connections: DashMap<String, HashSet<TupleKey>>,
}

impl MemoryAuthorizationClient {
    /// Creates a new in-memory client with no connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an empty connection so checks against it succeed.
    pub fn add_connection(&self, connection: impl Into<String>) {
        self.connections.entry(connection.into()).or_default();
    }

    /// Returns whether the given tuple is stored on the connection.
    pub fn contains(&self, connection: &str, tuple: &TupleKey) -> bool {
        self.connections
            .get(connection)
            .is_some_and(|tuples| tuples.contains(tuple))
    }

    /// Returns the number of tuples stored on the connection.
    pub fn tuple_count(&self, connection: &str) -> usize {
        self.connections
            .get(connection)
            .map_or(0, |tuples| tuples.len())
    }
}

#[async_trait]
impl AuthorizationClient for MemoryAuthorizationClient {
    async fn check(&self, request: &CheckRequest) -> ClientResult<bool> {
        let tuples = self.connections.get(&request.connection).ok_or_else(|| {
            ClientError::ConnectionNotFound {
                connection: request.connection.clone(),
            }
        })?;

        let probe = TupleKey::new(&request.user, &request.relation, &request.object);
        Ok(tuples.contains(&probe) || request.contextual_tuples.contains(&probe))
    }

    async fn write_tuples(&self, connection: &str, tuples: Vec<TupleKey>) -> ClientResult<()> {
        let count = tuples.len();
        let mut stored = self.connections.entry(connection.to_string()).or_default();
        stored.extend(tuples);
        debug!(connection, count, "wrote tuples");
        Ok(())
    }

    async fn delete_tuples(&self, connection: &str, tuples: Vec<TupleKey>) -> ClientResult<()> {
        let count = tuples.len();
        let mut stored = self.connections.entry(connection.to_string()).or_default();
        for tuple in &tuples {
            stored.remove(tuple);
        }
        debug!(connection, count, "deleted tuples");
        Ok(())
    }

    async fn list_objects(
        &self,
        connection: &str,
        object_type: &str,
        relation: &str,
        user: &str,
    ) -> ClientResult<Vec<String>> {
        let tuples =
            self.connections
                .get(connection)
                .ok_or_else(|| ClientError::ConnectionNotFound {
                    connection: connection.to_string(),
                })?;

        let prefix = format!("{object_type}:");
        let mut objects: Vec<String> = tuples
            .iter()
            .filter(|t| t.user == user && t.relation == relation && t.object.starts_with(&prefix))
            .map(|t| t.object.clone())
            .collect();
        objects.sort();
        objects.dedup();
        Ok(objects)
    }

    async fn expand(
        &self,
        connection: &str,
        relation: &str,
        object: &str,
    ) -> ClientResult<ExpandTree> {
        let tuples =
            self.connections
                .get(connection)
                .ok_or_else(|| ClientError::ConnectionNotFound {
                    connection: connection.to_string(),
                })?;

        let mut users: Vec<String> = tuples
            .iter()
            .filter(|t| t.relation == relation && t.object == object)
            .map(|t| t.user.clone())
            .collect();
        users.sort();
        Ok(ExpandTree {
            object: object.to_string(),
            relation: relation.to_string(),
            users,
        })
    }
}
