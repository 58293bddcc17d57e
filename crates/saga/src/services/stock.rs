//! Stock service gateway.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{STOCK_QUEUE, StockCommand};
use rpc::RpcClient;

use super::into_result;
use crate::error::ServiceError;

/// Operations the checkout needs from the stock service.
#[async_trait]
pub trait StockGateway: Send + Sync {
    /// Takes stock for every item in `data`, or none of it.
    async fn remove_stock_bulk(
        &self,
        data: &BTreeMap<String, i64>,
        key: &str,
    ) -> Result<(), ServiceError>;

    /// Returns stock taken earlier under `key`.
    async fn add_stock_bulk(
        &self,
        data: &BTreeMap<String, i64>,
        key: &str,
        compensation: bool,
    ) -> Result<(), ServiceError>;
}

/// [`StockGateway`] over the broker.
#[derive(Clone)]
pub struct RpcStockGateway {
    client: Arc<RpcClient>,
}

impl RpcStockGateway {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StockGateway for RpcStockGateway {
    async fn remove_stock_bulk(
        &self,
        data: &BTreeMap<String, i64>,
        key: &str,
    ) -> Result<(), ServiceError> {
        let command = StockCommand::RemoveStockBulk {
            data: data.clone(),
            key: key.to_string(),
        };
        into_result(self.client.call(STOCK_QUEUE, &command).await?)?;
        Ok(())
    }

    async fn add_stock_bulk(
        &self,
        data: &BTreeMap<String, i64>,
        key: &str,
        compensation: bool,
    ) -> Result<(), ServiceError> {
        let command = StockCommand::AddStockBulk {
            data: data.clone(),
            key: key.to_string(),
            compensation,
        };
        into_result(self.client.call(STOCK_QUEUE, &command).await?)?;
        Ok(())
    }
}
