//! Payment service gateway.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{PAYMENT_QUEUE, PaymentCommand};
use rpc::RpcClient;

use super::into_result;
use crate::error::ServiceError;

/// Operations the checkout needs from the payment service.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount` to the user, once per `key`.
    async fn remove_credit(&self, user_id: &str, amount: i64, key: &str)
    -> Result<(), ServiceError>;

    /// Credits `amount` back. With `compensation` set, only a charge made
    /// under the same `key` is refunded.
    async fn add_funds(
        &self,
        user_id: &str,
        amount: i64,
        key: &str,
        compensation: bool,
    ) -> Result<(), ServiceError>;
}

/// [`PaymentGateway`] over the broker.
#[derive(Clone)]
pub struct RpcPaymentGateway {
    client: Arc<RpcClient>,
}

impl RpcPaymentGateway {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaymentGateway for RpcPaymentGateway {
    async fn remove_credit(
        &self,
        user_id: &str,
        amount: i64,
        key: &str,
    ) -> Result<(), ServiceError> {
        let command = PaymentCommand::RemoveCredit {
            user_id: user_id.to_string(),
            amount,
            key: Some(key.to_string()),
        };
        into_result(self.client.call(PAYMENT_QUEUE, &command).await?)?;
        Ok(())
    }

    async fn add_funds(
        &self,
        user_id: &str,
        amount: i64,
        key: &str,
        compensation: bool,
    ) -> Result<(), ServiceError> {
        let command = PaymentCommand::AddFunds {
            user_id: user_id.to_string(),
            amount,
            key: Some(key.to_string()),
            compensation,
        };
        into_result(self.client.call(PAYMENT_QUEUE, &command).await?)?;
        Ok(())
    }
}
