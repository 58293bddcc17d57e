use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use common::{CorrelationId, RetryPolicy};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::broker::{Broker, Consumer, Delivery, declare_with_retry, publish_with_retry};
use crate::error::{Result, RpcError};

type PendingCalls = Arc<Mutex<HashMap<CorrelationId, oneshot::Sender<Vec<u8>>>>>;

/// Settings for an [`RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Queues declared on connect, before the first call.
    pub queues: Vec<String>,
    /// Reconnect policy for publishes.
    pub retry: RetryPolicy,
    /// Maximum wait for a reply. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl RpcClientConfig {
    /// Creates a config declaring `queues`, with the default retry policy
    /// and no call timeout.
    pub fn new<I, Q>(queues: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<String>,
    {
        Self {
            queues: queues.into_iter().map(Into::into).collect(),
            retry: RetryPolicy::default(),
            call_timeout: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Request/reply client over a [`Broker`].
///
/// Owns one exclusive reply queue. A background task drains it and hands
/// each reply to the call waiting on the same correlation id, so any number
/// of calls may be in flight at once and replies may arrive in any order.
/// Replies nobody waits for are dropped.
pub struct RpcClient {
    broker: Arc<dyn Broker>,
    reply_queue: String,
    pending: PendingCalls,
    config: RpcClientConfig,
    dispatcher: JoinHandle<()>,
}

impl RpcClient {
    /// Declares the configured queues and a reply queue, and starts the
    /// reply dispatcher.
    #[tracing::instrument(skip(broker, config), fields(queues = ?config.queues))]
    pub async fn connect(broker: Arc<dyn Broker>, config: RpcClientConfig) -> Result<Self> {
        for queue in &config.queues {
            declare_with_retry(broker.as_ref(), config.retry, queue).await?;
        }

        let reply_queue = broker.declare_exclusive_queue().await?;
        let consumer = broker.consume(&reply_queue).await?;

        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let dispatcher = tokio::spawn(dispatch_replies(consumer, pending.clone()));

        tracing::debug!(%reply_queue, "rpc client connected");

        Ok(Self {
            broker,
            reply_queue,
            pending,
            config,
            dispatcher,
        })
    }

    /// Returns the name of this client's reply queue.
    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Returns the number of calls waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Sends `request` to `queue` and waits for the correlated reply.
    pub async fn call<Req, Resp>(&self, queue: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = common::encode(request)?;
        let correlation_id = CorrelationId::new();

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(correlation_id, tx);
        let _slot = PendingSlot {
            pending: &self.pending,
            correlation_id,
        };

        let delivery = Delivery::request(correlation_id, self.reply_queue.clone(), body);
        publish_with_retry(self.broker.as_ref(), self.config.retry, queue, delivery).await?;
        metrics::counter!("rpc_calls_total", "queue" => queue.to_string()).increment(1);

        let reply = match self.config.call_timeout {
            Some(timeout) => tokio::time::timeout(timeout, rx).await.map_err(|_| {
                tracing::warn!(queue, %correlation_id, ?timeout, "rpc call timed out");
                RpcError::Timeout {
                    queue: queue.to_string(),
                    timeout,
                }
            })?,
            None => rx.await,
        }
        .map_err(|_| RpcError::Disconnected)?;

        Ok(common::decode(&reply)?)
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

/// Removes a call's pending entry when the call finishes, fails, times out
/// or is dropped.
struct PendingSlot<'a> {
    pending: &'a PendingCalls,
    correlation_id: CorrelationId,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.correlation_id);
    }
}

async fn dispatch_replies(consumer: Consumer, pending: PendingCalls) {
    while let Some(delivery) = consumer.next().await {
        let waiter = lock(&pending).remove(&delivery.correlation_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(delivery.body);
            }
            None => {
                metrics::counter!("rpc_unmatched_replies_total").increment(1);
                tracing::debug!(
                    correlation_id = %delivery.correlation_id,
                    "dropping reply with no pending call"
                );
            }
        }
    }
    tracing::debug!(queue = consumer.queue(), "reply queue closed");
}

fn lock(
    pending: &PendingCalls,
) -> std::sync::MutexGuard<'_, HashMap<CorrelationId, oneshot::Sender<Vec<u8>>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}
