//! Gateways to the services a checkout talks to.
//!
//! Each gateway is a trait so the orchestrator can be driven by test doubles;
//! the `Rpc*` implementations send commands over the broker.

pub mod order;
pub mod payment;
pub mod stock;

pub use order::{OrderGateway, RpcOrderGateway};
pub use payment::{PaymentGateway, RpcPaymentGateway};
pub use stock::{RpcStockGateway, StockGateway};

use domain::{Reply, ReplyData, Status};

use crate::error::ServiceError;

/// Unwraps a successful reply's data, or classifies the failure.
pub(crate) fn into_result(reply: Reply) -> Result<ReplyData, ServiceError> {
    let Reply { status, data } = reply;
    let message = |data: ReplyData| match data {
        ReplyData::Message(message) => message,
        other => format!("{other:?}"),
    };
    match status {
        Status::Success => Ok(data),
        Status::ClientError => Err(ServiceError::Rejected(message(data))),
        Status::ServerError => Err(ServiceError::Failed(message(data))),
    }
}
