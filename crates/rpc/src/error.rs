use std::time::Duration;

use common::CodecError;
use thiserror::Error;

/// Errors raised by a broker connection.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The connection to the broker dropped or was never established.
    #[error("Broker connection lost: {0}")]
    ConnectionLost(String),

    /// The queue has not been declared.
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// The queue's consumer side has gone away.
    #[error("Queue closed: {0}")]
    Closed(String),
}

impl BrokerError {
    /// Returns true if reconnecting may fix the error.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::ConnectionLost(_))
    }
}

/// Errors surfaced to an RPC caller.
#[derive(Debug, Error)]
pub enum RpcError {
    /// A non-retryable broker error.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// The broker stayed unreachable for the whole retry budget.
    #[error("Publishing to '{queue}' failed after {attempts} attempts")]
    RetriesExhausted { queue: String, attempts: u32 },

    /// No reply arrived within the configured call timeout.
    #[error("No reply from '{queue}' within {timeout:?}")]
    Timeout { queue: String, timeout: Duration },

    /// The request or reply could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The reply dispatcher stopped before a reply arrived.
    #[error("Reply channel disconnected")]
    Disconnected,
}

/// Result type for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;
