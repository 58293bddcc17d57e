//! Connection handle owned by one service instance.

use std::future::Future;
use std::sync::Arc;

use common::RetryPolicy;

use crate::{KeyValueStore, Result, StoreError};

/// A store connection plus the policy used to ride out transient failures.
///
/// Transient errors trigger a pause, a [`KeyValueStore::reconnect`] and a
/// retry of the same operation. Once the policy is exhausted the operation
/// fails with [`StoreError::Unavailable`]. Non-transient errors are returned
/// immediately.
#[derive(Clone)]
pub struct StoreHandle {
    backend: Arc<dyn KeyValueStore>,
    policy: RetryPolicy,
}

impl StoreHandle {
    /// Creates a handle over `backend`.
    pub fn new(backend: Arc<dyn KeyValueStore>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_retry("get", || self.backend.get(key)).await
    }

    pub async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.with_retry("get_many", || self.backend.get_many(keys))
            .await
    }

    pub async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.with_retry("set", || self.backend.set(key, value)).await
    }

    pub async fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()> {
        self.with_retry("set_many", || self.backend.set_many(entries))
            .await
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if !self.policy.allows(attempts) {
                        metrics::counter!("store_unavailable_total", "op" => op).increment(1);
                        tracing::error!(op, attempts, error = %err, "store retry budget exhausted");
                        return Err(StoreError::Unavailable(format!(
                            "{op} failed after {attempts} attempts: {err}"
                        )));
                    }
                    tracing::warn!(op, attempts, error = %err, "store operation failed, reconnecting");
                    self.policy.pause().await;
                    if let Err(reconnect_err) = self.backend.reconnect().await {
                        tracing::warn!(op, error = %reconnect_err, "store reconnect failed");
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
