//! Checkout error types.

use domain::Status;
use rpc::RpcError;
use thiserror::Error;

use crate::state::CheckoutStage;

/// Failure of a single call to a remote service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service refused the command (bad input or a domain rule).
    #[error("{0}")]
    Rejected(String),

    /// The service reported an internal failure.
    #[error("Service error: {0}")]
    Failed(String),

    /// The call never got a reply.
    #[error("Transport error: {0}")]
    Transport(#[from] RpcError),

    /// The reply had an unexpected shape.
    #[error("Unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

impl ServiceError {
    pub fn status(&self) -> Status {
        match self {
            ServiceError::Rejected(_) => Status::ClientError,
            ServiceError::Failed(_)
            | ServiceError::Transport(_)
            | ServiceError::UnexpectedReply(_) => Status::ServerError,
        }
    }
}

/// Why a checkout did not complete.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The order could not be loaded.
    #[error("{0}")]
    OrderLookup(ServiceError),

    /// There is nothing to check out.
    #[error("Order {0} has no items")]
    EmptyOrder(String),

    /// A forward step failed; earlier steps have been compensated.
    #[error("{stage} failed: {source}")]
    StepFailed {
        stage: CheckoutStage,
        source: ServiceError,
    },

    /// Stock and credit were taken but the order could not be marked paid.
    #[error("Order {order_id} was charged but could not be confirmed: {source}")]
    Inconsistent {
        order_id: String,
        source: ServiceError,
    },
}

impl CheckoutError {
    /// Status of the originating failure.
    pub fn status(&self) -> Status {
        match self {
            CheckoutError::OrderLookup(e) | CheckoutError::StepFailed { source: e, .. } => {
                e.status()
            }
            CheckoutError::EmptyOrder(_) => Status::ClientError,
            CheckoutError::Inconsistent { .. } => Status::ServerError,
        }
    }

    /// Message of the originating failure, without the stage prefix.
    pub fn reason(&self) -> String {
        match self {
            CheckoutError::OrderLookup(e) | CheckoutError::StepFailed { source: e, .. } => {
                e.to_string()
            }
            other => other.to_string(),
        }
    }

    /// Label for the stage the checkout failed in.
    pub fn stage_label(&self) -> &'static str {
        match self {
            CheckoutError::OrderLookup(_) | CheckoutError::EmptyOrder(_) => "lookup",
            CheckoutError::StepFailed { stage, .. } => stage.as_str(),
            CheckoutError::Inconsistent { .. } => CheckoutStage::ConfirmingOrder.as_str(),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
