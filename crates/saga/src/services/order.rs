//! Order service gateway.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{ORDER_QUEUE, Order, OrderCommand, ReplyData};
use rpc::RpcClient;

use super::into_result;
use crate::error::ServiceError;

/// Operations the checkout needs from the order service.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn find_order(&self, order_id: &str) -> Result<Order, ServiceError>;

    /// Stores the settled order. Safe to repeat.
    async fn confirm_order(&self, order_id: &str, order: &Order) -> Result<(), ServiceError>;
}

/// [`OrderGateway`] over the broker.
#[derive(Clone)]
pub struct RpcOrderGateway {
    client: Arc<RpcClient>,
}

impl RpcOrderGateway {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrderGateway for RpcOrderGateway {
    async fn find_order(&self, order_id: &str) -> Result<Order, ServiceError> {
        let command = OrderCommand::FindOrder {
            order_id: order_id.to_string(),
        };
        match into_result(self.client.call(ORDER_QUEUE, &command).await?)? {
            ReplyData::Order(order) => Ok(order),
            _ => Err(ServiceError::UnexpectedReply("find_order")),
        }
    }

    async fn confirm_order(&self, order_id: &str, order: &Order) -> Result<(), ServiceError> {
        let command = OrderCommand::ConfirmOrder {
            order_id: order_id.to_string(),
            order_entry: order.clone(),
        };
        into_result(self.client.call(ORDER_QUEUE, &command).await?)?;
        Ok(())
    }
}
