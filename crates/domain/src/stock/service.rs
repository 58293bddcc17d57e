use std::collections::BTreeMap;

use common::AggregateId;

use super::StockItem;
use crate::error::{DomainError, Result};
use crate::ledger::{Decision, Mutation};
use crate::store::AggregateStore;

/// Stock operations over an [`AggregateStore`].
#[derive(Clone)]
pub struct StockService {
    store: AggregateStore<StockItem>,
}

impl StockService {
    pub fn new(store: AggregateStore<StockItem>) -> Self {
        Self { store }
    }

    /// Creates an item with zero stock and returns its id.
    #[tracing::instrument(skip(self))]
    pub async fn create_item(&self, price: i64) -> Result<String> {
        if price < 0 {
            return Err(DomainError::InvalidAmount(price));
        }
        let item_id = AggregateId::new().into_string();
        self.store.put(&item_id, &StockItem::new(price)).await?;
        tracing::info!(%item_id, price, "item created");
        Ok(item_id)
    }

    pub async fn find_item(&self, item_id: &str) -> Result<StockItem> {
        self.store.read(item_id).await
    }

    /// Adds `amount` units, once per `key`. Returns the new stock level.
    #[tracing::instrument(skip(self))]
    pub async fn add_stock(&self, item_id: &str, amount: i64, key: &str) -> Result<i64> {
        self.store
            .mutate(item_id, amount, &Mutation::add(key))
            .await
    }

    /// Removes `amount` units, once per `key`. Returns the new stock level.
    #[tracing::instrument(skip(self))]
    pub async fn remove_stock(&self, item_id: &str, amount: i64, key: &str) -> Result<i64> {
        self.store
            .mutate(item_id, amount, &Mutation::sub(key))
            .await
    }

    /// Returns stock for several items in one batch.
    #[tracing::instrument(skip(self, data))]
    pub async fn add_stock_bulk(
        &self,
        data: &BTreeMap<String, i64>,
        key: &str,
        compensation: bool,
    ) -> Result<Decision> {
        self.store
            .mutate_bulk(data, &Mutation::add(key).compensating(compensation))
            .await
    }

    /// Takes stock for several items in one batch, all or nothing.
    #[tracing::instrument(skip(self, data))]
    pub async fn remove_stock_bulk(&self, data: &BTreeMap<String, i64>, key: &str) -> Result<Decision> {
        self.store.mutate_bulk(data, &Mutation::sub(key)).await
    }
}
