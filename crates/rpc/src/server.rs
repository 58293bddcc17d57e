use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use common::{CorrelationId, RetryPolicy};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::broker::{Broker, Delivery, declare_with_retry, publish_with_retry};
use crate::error::Result;

/// Metadata of the request being handled.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    /// Correlation id the caller attached to the request.
    pub correlation_id: CorrelationId,
}

/// Application logic behind an [`RpcServer`].
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    type Request: DeserializeOwned + Send;
    type Reply: Serialize + Send;

    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Handles one decoded request.
    async fn handle(&self, request: Self::Request, ctx: RequestContext) -> Self::Reply;

    /// Builds the reply for a request that could not be decoded.
    fn reject(&self, reason: String) -> Self::Reply;
}

/// Serves one queue with a [`RequestHandler`].
///
/// Deliveries are taken off the queue one at a time and acknowledged on
/// receipt. Each reply goes to the request's `reply_to` queue with the
/// request's correlation id.
pub struct RpcServer<H: RequestHandler> {
    broker: Arc<dyn Broker>,
    queue: String,
    handler: Arc<H>,
    retry: RetryPolicy,
}

impl<H: RequestHandler> RpcServer<H> {
    pub fn new(broker: Arc<dyn Broker>, queue: impl Into<String>, handler: H) -> Self {
        Self {
            broker,
            queue: queue.into(),
            handler: Arc::new(handler),
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the reconnect policy used for replies.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Consumes the queue until it closes.
    #[tracing::instrument(skip(self), fields(queue = %self.queue, service = self.handler.name()))]
    pub async fn run(self) -> Result<()> {
        declare_with_retry(self.broker.as_ref(), self.retry, &self.queue).await?;
        let consumer = self.broker.consume(&self.queue).await?;
        tracing::info!("rpc server listening");

        while let Some(delivery) = consumer.next().await {
            tracing::debug!(correlation_id = %delivery.correlation_id, "acknowledged delivery");
            if let Err(e) = self.process(delivery).await {
                tracing::error!(error = %e, "failed to reply");
            }
        }

        tracing::info!("rpc server stopped");
        Ok(())
    }

    /// Runs the server on a background task.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn process(&self, delivery: Delivery) -> Result<()> {
        let started = Instant::now();
        let ctx = RequestContext {
            correlation_id: delivery.correlation_id,
        };

        let reply = match common::decode::<H::Request>(&delivery.body) {
            Ok(request) => self.handler.handle(request, ctx).await,
            Err(e) => {
                tracing::warn!(correlation_id = %ctx.correlation_id, error = %e, "malformed request");
                self.handler.reject(format!("malformed request: {e}"))
            }
        };

        metrics::histogram!("rpc_request_duration_seconds", "service" => self.handler.name())
            .record(started.elapsed().as_secs_f64());

        let Some(reply_to) = delivery.reply_to else {
            tracing::debug!(correlation_id = %ctx.correlation_id, "no reply_to, dropping reply");
            return Ok(());
        };

        let body = common::encode(&reply)?;
        publish_with_retry(
            self.broker.as_ref(),
            self.retry,
            &reply_to,
            Delivery::reply(ctx.correlation_id, body),
        )
        .await
    }
}
