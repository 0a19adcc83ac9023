//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fgacache_client::{
    AuthorizationClient, CheckRequest, ClientError, ClientResult, ExpandTree,
    MemoryAuthorizationClient, TupleKey,
};
use fgacache_core::{CacheSettings, ReadThroughCache, StatsRegistry, WriteBehindCache};

/// Client wrapper that can be switched to fail and records batch sizes.
pub struct FlakyClient {
    inner: MemoryAuthorizationClient,
    unavailable: AtomicBool,
    fail_deletes: AtomicBool,
    write_batches: Mutex<Vec<usize>>,
    delete_batches: Mutex<Vec<usize>>,
}

impl FlakyClient {
    pub fn new() -> Self {
        Self {
            inner: MemoryAuthorizationClient::new(),
            unavailable: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            write_batches: Mutex::new(Vec::new()),
            delete_batches: Mutex::new(Vec::new()),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fails only delete sends, leaving writes healthy.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryAuthorizationClient {
        &self.inner
    }

    pub fn write_batch_sizes(&self) -> Vec<usize> {
        self.write_batches.lock().unwrap().clone()
    }

    pub fn delete_batch_sizes(&self) -> Vec<usize> {
        self.delete_batches.lock().unwrap().clone()
    }

    fn gate(&self) -> ClientResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ClientError::Unavailable {
                message: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AuthorizationClient for FlakyClient {
    async fn check(&self, request: &CheckRequest) -> ClientResult<bool> {
        self.gate()?;
        self.inner.check(request).await
    }

    async fn write_tuples(&self, connection: &str, tuples: Vec<TupleKey>) -> ClientResult<()> {
        self.gate()?;
        self.write_batches.lock().unwrap().push(tuples.len());
        self.inner.write_tuples(connection, tuples).await
    }

    async fn delete_tuples(&self, connection: &str, tuples: Vec<TupleKey>) -> ClientResult<()> {
        self.gate()?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable {
                message: "injected delete failure".to_string(),
            });
        }
        self.delete_batches.lock().unwrap().push(tuples.len());
        self.inner.delete_tuples(connection, tuples).await
    }

    async fn list_objects(
        &self,
        connection: &str,
        object_type: &str,
        relation: &str,
        user: &str,
    ) -> ClientResult<Vec<String>> {
        self.gate()?;
        self.inner
            .list_objects(connection, object_type, relation, user)
            .await
    }

    async fn expand(
        &self,
        connection: &str,
        relation: &str,
        object: &str,
    ) -> ClientResult<ExpandTree> {
        self.gate()?;
        self.inner.expand(connection, relation, object).await
    }
}

/// Fully wired stack over a [`FlakyClient`].
pub struct Stack {
    pub client: Arc<FlakyClient>,
    pub cache: Arc<ReadThroughCache>,
    pub stats: Arc<StatsRegistry>,
    pub write_behind: Arc<WriteBehindCache>,
}

/// Builds the full stack on the "default" connection.
pub fn build_stack(settings: CacheSettings) -> Stack {
    let client = Arc::new(FlakyClient::new());
    client.inner().add_connection("default");
    let stats = Arc::new(StatsRegistry::new());
    let cache = Arc::new(ReadThroughCache::new(
        &settings,
        client.clone(),
        stats.clone(),
    ));
    let write_behind = WriteBehindCache::new(
        settings,
        "default",
        client.clone(),
        cache.clone(),
        stats.clone(),
    );
    Stack {
        client,
        cache,
        stats,
        write_behind,
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
