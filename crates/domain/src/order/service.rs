//! Order service over an aggregate store.

use common::AggregateId;

use super::Order;
use crate::error::Result;
use crate::store::AggregateStore;

/// Service for managing orders.
#[derive(Clone)]
pub struct OrderService {
    store: AggregateStore<Order>,
}

impl OrderService {
    /// Creates a new order service over the given store.
    pub fn new(store: AggregateStore<Order>) -> Self {
        Self { store }
    }

    /// Creates an empty order for a user and returns its id.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, user_id: &str) -> Result<String> {
        let order_id = AggregateId::new().into_string();
        self.store.put(&order_id, &Order::new(user_id)).await?;
        tracing::info!(%order_id, "order created");
        Ok(order_id)
    }

    /// Loads an order by ID.
    pub async fn find_order(&self, order_id: &str) -> Result<Order> {
        self.store.read(order_id).await
    }

    /// Replaces an existing order with `order`.
    #[tracing::instrument(skip(self, order))]
    pub async fn add_item(&self, order_id: &str, order: &Order) -> Result<()> {
        self.store.read(order_id).await?;
        self.store.put(order_id, order).await
    }

    /// Stores the settled order. Writing the same order again is harmless.
    #[tracing::instrument(skip(self, order), fields(paid = order.paid))]
    pub async fn confirm_order(&self, order_id: &str, order: &Order) -> Result<()> {
        self.store.put(order_id, order).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use common::RetryPolicy;
    use store::{InMemoryKeyValueStore, StoreHandle};

    use super::*;
    use crate::error::DomainError;

    fn service() -> OrderService {
        let handle = StoreHandle::new(
            Arc::new(InMemoryKeyValueStore::new()),
            RetryPolicy::bounded(2, Duration::from_millis(1)),
        );
        OrderService::new(AggregateStore::new(handle))
    }

    #[tokio::test]
    async fn test_create_and_find_order() {
        let service = service();
        let order_id = service.create_order("user-1").await.unwrap();

        let order = service.find_order(&order_id).await.unwrap();
        assert_eq!(order, Order::new("user-1"));
    }

    #[tokio::test]
    async fn test_add_item_overwrites_existing_order() {
        let service = service();
        let order_id = service.create_order("user-1").await.unwrap();

        let mut order = service.find_order(&order_id).await.unwrap();
        order.add_line(&order_id, "item-1", 2, 7).unwrap();
        service.add_item(&order_id, &order).await.unwrap();

        let stored = service.find_order(&order_id).await.unwrap();
        assert_eq!(stored.total_cost, 14);
    }

    #[tokio::test]
    async fn test_add_item_to_unknown_order() {
        let result = service().add_item("ghost", &Order::new("u")).await;
        assert!(matches!(result, Err(DomainError::NotFound { kind: "Order", .. })));
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let service = service();
        let order_id = service.create_order("user-1").await.unwrap();
        let paid = service.find_order(&order_id).await.unwrap().as_paid();

        service.confirm_order(&order_id, &paid).await.unwrap();
        service.confirm_order(&order_id, &paid).await.unwrap();

        assert!(service.find_order(&order_id).await.unwrap().paid);
    }
}
