//! Synchronous calls over an asynchronous message broker.
//!
//! A caller publishes a request to a service queue with a reply queue and a
//! fresh correlation id attached, then waits until the reply carrying the
//! same correlation id comes back:
//!
//! ```text
//! RpcClient ──(request, reply_to, correlation_id)──► service queue ──► RpcServer
//!     ▲                                                                   │
//!     └────────────── reply queue ◄──(reply, correlation_id)──────────────┘
//! ```
//!
//! Broker connection failures are retried under a [`common::RetryPolicy`]
//! with a reconnect between attempts. The retried publish reuses the
//! correlation id, so a request that did reach the broker may be delivered
//! twice; servers rely on caller-supplied idempotency keys for that case.

pub mod broker;
pub mod client;
pub mod error;
pub mod memory;
pub mod server;

pub use broker::{Broker, Consumer, Delivery, publish_with_retry};
pub use client::{RpcClient, RpcClientConfig};
pub use error::{BrokerError, RpcError};
pub use memory::InMemoryBroker;
pub use server::{RequestContext, RequestHandler, RpcServer};
