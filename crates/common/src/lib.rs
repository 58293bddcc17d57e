//! Shared primitives for the checkout services.
//!
//! - [`AggregateId`]: string key of an order, stock item or wallet
//! - [`CorrelationId`]: identifier matching an RPC reply to its request
//! - [`codec`]: the binary encoding used on the wire and in the stores
//! - [`RetryPolicy`]: fixed-interval reconnect policy shared by broker and store handles

pub mod codec;
pub mod retry;
pub mod types;

pub use codec::{CodecError, decode, encode};
pub use retry::RetryPolicy;
pub use types::{AggregateId, CorrelationId};
