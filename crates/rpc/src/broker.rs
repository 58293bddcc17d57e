use std::sync::Arc;

use async_trait::async_trait;
use common::{CorrelationId, RetryPolicy};
use tokio::sync::{Mutex, mpsc};

use crate::error::{BrokerError, RpcError};

/// A message as it travels through a queue.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Matches a reply to its request.
    pub correlation_id: CorrelationId,
    /// Queue the receiver should publish its reply to, if any.
    pub reply_to: Option<String>,
    /// Encoded payload.
    pub body: Vec<u8>,
}

impl Delivery {
    /// Creates a request expecting a reply on `reply_to`.
    pub fn request(correlation_id: CorrelationId, reply_to: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            correlation_id,
            reply_to: Some(reply_to.into()),
            body,
        }
    }

    /// Creates a reply to the request identified by `correlation_id`.
    pub fn reply(correlation_id: CorrelationId, body: Vec<u8>) -> Self {
        Self {
            correlation_id,
            reply_to: None,
            body,
        }
    }
}

/// Receiving end of a queue.
///
/// Several consumers of the same queue compete: each delivery is handed to
/// exactly one of them. A delivery counts as acknowledged once returned by
/// [`Consumer::next`]; it is never redelivered.
#[derive(Clone)]
pub struct Consumer {
    queue: String,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Delivery>>>,
}

impl Consumer {
    /// Wraps the receiving half of a queue channel.
    pub fn new(queue: impl Into<String>, rx: Arc<Mutex<mpsc::UnboundedReceiver<Delivery>>>) -> Self {
        Self {
            queue: queue.into(),
            rx,
        }
    }

    /// Returns the consumed queue's name.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Waits for the next delivery. Returns `None` once the queue is closed.
    pub async fn next(&self) -> Option<Delivery> {
        self.rx.lock().await.recv().await
    }
}

/// A connection to a message broker.
///
/// One handle is owned by each service instance and passed to its RPC
/// client or server.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Ensures a named queue exists. Declaring an existing queue is a no-op.
    async fn declare_queue(&self, name: &str) -> Result<(), BrokerError>;

    /// Declares a fresh queue with a broker-generated name, for replies.
    async fn declare_exclusive_queue(&self) -> Result<String, BrokerError>;

    /// Publishes a delivery to a declared queue.
    async fn publish(&self, queue: &str, delivery: Delivery) -> Result<(), BrokerError>;

    /// Starts consuming a declared queue.
    async fn consume(&self, queue: &str) -> Result<Consumer, BrokerError>;

    /// Re-establishes the connection after a transient failure.
    async fn reconnect(&self) -> Result<(), BrokerError>;
}

/// Publishes `delivery`, reconnecting and resubmitting it unchanged on
/// transient failures until `policy` is exhausted.
pub async fn publish_with_retry(
    broker: &dyn Broker,
    policy: RetryPolicy,
    queue: &str,
    delivery: Delivery,
) -> Result<(), RpcError> {
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match broker.publish(queue, delivery.clone()).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transient() => {
                if !policy.allows(attempts) {
                    metrics::counter!("rpc_publish_exhausted_total", "queue" => queue.to_string())
                        .increment(1);
                    tracing::error!(queue, attempts, error = %err, "broker retry budget exhausted");
                    return Err(RpcError::RetriesExhausted {
                        queue: queue.to_string(),
                        attempts,
                    });
                }
                tracing::warn!(
                    queue,
                    attempts,
                    correlation_id = %delivery.correlation_id,
                    error = %err,
                    "publish failed, reconnecting"
                );
                policy.pause().await;
                if let Err(reconnect_err) = broker.reconnect().await {
                    tracing::warn!(queue, error = %reconnect_err, "broker reconnect failed");
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Declares `queue`, reconnecting on transient failures like a publish.
pub(crate) async fn declare_with_retry(
    broker: &dyn Broker,
    policy: RetryPolicy,
    queue: &str,
) -> Result<(), RpcError> {
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match broker.declare_queue(queue).await {
            Ok(()) => return Ok(()),
            Err(err) if err.is_transient() && policy.allows(attempts) => {
                tracing::warn!(queue, attempts, error = %err, "queue declaration failed, reconnecting");
                policy.pause().await;
                if let Err(reconnect_err) = broker.reconnect().await {
                    tracing::warn!(queue, error = %reconnect_err, "broker reconnect failed");
                }
            }
            Err(err) if err.is_transient() => {
                return Err(RpcError::RetriesExhausted {
                    queue: queue.to_string(),
                    attempts,
                });
            }
            Err(err) => return Err(err.into()),
        }
    }
}
