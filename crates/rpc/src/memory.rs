//! Process-local broker for tests and single-process deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::broker::{Broker, Consumer, Delivery};
use crate::error::BrokerError;

struct Queue {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>>,
    published: AtomicU64,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            published: AtomicU64::new(0),
        }
    }
}

struct Inner {
    queues: Mutex<HashMap<String, Arc<Queue>>>,
    disconnected: AtomicBool,
    failing_publishes: AtomicU32,
    lost_confirms: AtomicU32,
    refused_reconnects: AtomicU32,
    reconnects: AtomicU32,
}

/// In-memory broker backed by tokio channels.
///
/// Cloning shares the queues, so one clone can be handed to each service
/// instance. Fault injection mimics a flaky broker connection:
///
/// - [`drop_connection`](Self::drop_connection): everything fails until a
///   successful reconnect
/// - [`fail_next_publishes`](Self::fail_next_publishes): publishes fail
///   before reaching the queue
/// - [`lose_next_confirms`](Self::lose_next_confirms): publishes reach the
///   queue but report failure, so the sender resubmits a duplicate
/// - [`refuse_next_reconnects`](Self::refuse_next_reconnects)
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Creates a connected broker with no queues.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                queues: Mutex::new(HashMap::new()),
                disconnected: AtomicBool::new(false),
                failing_publishes: AtomicU32::new(0),
                lost_confirms: AtomicU32::new(0),
                refused_reconnects: AtomicU32::new(0),
                reconnects: AtomicU32::new(0),
            }),
        }
    }

    /// Simulates a dropped connection.
    pub fn drop_connection(&self) {
        self.inner.disconnected.store(true, Ordering::SeqCst);
    }

    /// Makes the next `count` publishes fail without enqueueing.
    pub fn fail_next_publishes(&self, count: u32) {
        self.inner.failing_publishes.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` publishes enqueue but report failure.
    pub fn lose_next_confirms(&self, count: u32) {
        self.inner.lost_confirms.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` reconnect attempts fail.
    pub fn refuse_next_reconnects(&self, count: u32) {
        self.inner.refused_reconnects.store(count, Ordering::SeqCst);
    }

    /// Returns how many successful reconnects happened.
    pub fn reconnect_count(&self) -> u32 {
        self.inner.reconnects.load(Ordering::SeqCst)
    }

    /// Returns how many deliveries were enqueued on `queue`.
    pub fn published_count(&self, queue: &str) -> u64 {
        self.queue(queue)
            .map(|q| q.published.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Returns true if `queue` has been declared.
    pub fn has_queue(&self, queue: &str) -> bool {
        self.queue(queue).is_some()
    }

    fn queue(&self, name: &str) -> Option<Arc<Queue>> {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.inner.disconnected.load(Ordering::SeqCst) {
            return Err(BrokerError::ConnectionLost("connection closed".into()));
        }
        Ok(())
    }

    fn consume_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_queue(&self, name: &str) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        self.inner
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Queue::new()));
        Ok(())
    }

    async fn declare_exclusive_queue(&self) -> Result<String, BrokerError> {
        let name = format!("amq.gen-{}", common::CorrelationId::new());
        self.declare_queue(&name).await?;
        Ok(name)
    }

    async fn publish(&self, queue: &str, delivery: Delivery) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        if Self::consume_fault(&self.inner.failing_publishes) {
            self.drop_connection();
            return Err(BrokerError::ConnectionLost("publish interrupted".into()));
        }

        let target = self
            .queue(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        target
            .tx
            .send(delivery)
            .map_err(|_| BrokerError::Closed(queue.to_string()))?;
        target.published.fetch_add(1, Ordering::SeqCst);

        if Self::consume_fault(&self.inner.lost_confirms) {
            self.drop_connection();
            return Err(BrokerError::ConnectionLost("publish confirm lost".into()));
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Consumer, BrokerError> {
        self.ensure_connected()?;
        let target = self
            .queue(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;
        Ok(Consumer::new(queue, target.rx.clone()))
    }

    async fn reconnect(&self) -> Result<(), BrokerError> {
        if Self::consume_fault(&self.inner.refused_reconnects) {
            return Err(BrokerError::ConnectionLost("reconnect refused".into()));
        }
        self.inner.disconnected.store(false, Ordering::SeqCst);
        self.inner.reconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
