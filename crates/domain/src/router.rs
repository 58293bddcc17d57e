//! Command routers: map broker commands onto the domain services.
//!
//! Each router is a [`RequestHandler`] served by an [`rpc::RpcServer`] on the
//! service's queue. Every command produces a [`Reply`]; domain errors are
//! translated with [`Reply::from_error`] and server-side failures are logged
//! with full detail before the generic reply goes out.

use async_trait::async_trait;
use rpc::{RequestContext, RequestHandler};

use crate::error::Result;
use crate::order::OrderService;
use crate::payment::PaymentService;
use crate::protocol::{OrderCommand, PaymentCommand, Reply, ReplyData, Status, StockCommand};
use crate::stock::StockService;

/// Turns an operation result into a reply and records the outcome.
fn finish(service: &'static str, action: &'static str, result: Result<ReplyData>) -> Reply {
    let reply = match result {
        Ok(data) => Reply::success(data),
        Err(e) => {
            match e.status() {
                Status::ServerError => tracing::error!(service, action, error = %e, "command failed"),
                _ => tracing::debug!(service, action, error = %e, "command rejected"),
            }
            Reply::from_error(&e)
        }
    };

    metrics::counter!(
        "commands_handled_total",
        "service" => service,
        "action" => action,
        "status" => reply.status.as_str()
    )
    .increment(1);

    reply
}

fn reject(service: &'static str, reason: String) -> Reply {
    metrics::counter!(
        "commands_handled_total",
        "service" => service,
        "action" => "unknown",
        "status" => Status::ClientError.as_str()
    )
    .increment(1);
    Reply::client_error(reason)
}

/// Falls back to the correlation id when the caller supplied no key.
fn idempotency_key(key: Option<String>, ctx: &RequestContext) -> String {
    key.unwrap_or_else(|| ctx.correlation_id.to_string())
}

pub struct OrderRouter {
    service: OrderService,
}

impl OrderRouter {
    pub fn new(service: OrderService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl RequestHandler for OrderRouter {
    type Request = OrderCommand;
    type Reply = Reply;

    fn name(&self) -> &'static str {
        "order"
    }

    async fn handle(&self, command: OrderCommand, _ctx: RequestContext) -> Reply {
        let action = command.action();
        let result = match command {
            OrderCommand::CreateOrder { user_id } => {
                self.service.create_order(&user_id).await.map(ReplyData::Id)
            }
            OrderCommand::FindOrder { order_id } => {
                self.service.find_order(&order_id).await.map(ReplyData::Order)
            }
            OrderCommand::AddItem {
                order_id,
                order_entry,
            } => self
                .service
                .add_item(&order_id, &order_entry)
                .await
                .map(|()| ReplyData::Empty),
            OrderCommand::ConfirmOrder {
                order_id,
                order_entry,
            } => self
                .service
                .confirm_order(&order_id, &order_entry)
                .await
                .map(|()| ReplyData::Empty),
        };
        finish(self.name(), action, result)
    }

    fn reject(&self, reason: String) -> Reply {
        reject(self.name(), reason)
    }
}

pub struct StockRouter {
    service: StockService,
}

impl StockRouter {
    pub fn new(service: StockService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl RequestHandler for StockRouter {
    type Request = StockCommand;
    type Reply = Reply;

    fn name(&self) -> &'static str {
        "stock"
    }

    async fn handle(&self, command: StockCommand, ctx: RequestContext) -> Reply {
        let action = command.action();
        let result: Result<ReplyData> = match command {
            StockCommand::CreateItem { price } => {
                self.service.create_item(price).await.map(ReplyData::Id)
            }
            StockCommand::FindItem { item_id } => self
                .service
                .find_item(&item_id)
                .await
                .map(|item| ReplyData::Item(item.view())),
            StockCommand::AddStock {
                item_id,
                amount,
                key,
            } => self
                .service
                .add_stock(&item_id, amount, &idempotency_key(key, &ctx))
                .await
                .map(ReplyData::Quantity),
            StockCommand::RemoveStock {
                item_id,
                amount,
                key,
            } => self
                .service
                .remove_stock(&item_id, amount, &idempotency_key(key, &ctx))
                .await
                .map(ReplyData::Quantity),
            StockCommand::AddStockBulk {
                data,
                key,
                compensation,
            } => self
                .service
                .add_stock_bulk(&data, &key, compensation)
                .await
                .map(|_| ReplyData::Empty),
            StockCommand::RemoveStockBulk { data, key } => self
                .service
                .remove_stock_bulk(&data, &key)
                .await
                .map(|_| ReplyData::Empty),
        };
        finish(self.name(), action, result)
    }

    fn reject(&self, reason: String) -> Reply {
        reject(self.name(), reason)
    }
}

pub struct PaymentRouter {
    service: PaymentService,
}

impl PaymentRouter {
    pub fn new(service: PaymentService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl RequestHandler for PaymentRouter {
    type Request = PaymentCommand;
    type Reply = Reply;

    fn name(&self) -> &'static str {
        "payment"
    }

    async fn handle(&self, command: PaymentCommand, ctx: RequestContext) -> Reply {
        let action = command.action();
        let result: Result<ReplyData> = match command {
            PaymentCommand::CreateUser => self.service.create_user().await.map(ReplyData::Id),
            PaymentCommand::FindUser { user_id } => self
                .service
                .find_user(&user_id)
                .await
                .map(|wallet| ReplyData::Wallet(wallet.view())),
            PaymentCommand::AddFunds {
                user_id,
                amount,
                key,
                compensation,
            } => self
                .service
                .add_funds(&user_id, amount, &idempotency_key(key, &ctx), compensation)
                .await
                .map(ReplyData::Quantity),
            PaymentCommand::RemoveCredit {
                user_id,
                amount,
                key,
            } => self
                .service
                .remove_credit(&user_id, amount, &idempotency_key(key, &ctx))
                .await
                .map(ReplyData::Quantity),
        };
        finish(self.name(), action, result)
    }

    fn reject(&self, reason: String) -> Reply {
        reject(self.name(), reason)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use common::{CorrelationId, RetryPolicy};
    use store::{InMemoryKeyValueStore, StoreHandle};

    use super::*;
    use crate::store::AggregateStore;

    fn ctx() -> RequestContext {
        RequestContext {
            correlation_id: CorrelationId::new(),
        }
    }

    fn handle(backend: &InMemoryKeyValueStore) -> StoreHandle {
        StoreHandle::new(
            Arc::new(backend.clone()),
            RetryPolicy::bounded(2, Duration::from_millis(1)),
        )
    }

    fn stock_router(backend: &InMemoryKeyValueStore) -> StockRouter {
        StockRouter::new(StockService::new(AggregateStore::new(handle(backend))))
    }

    async fn create_item(router: &StockRouter, stock: i64) -> String {
        let reply = router.handle(StockCommand::CreateItem { price: 3 }, ctx()).await;
        let ReplyData::Id(item_id) = reply.data else {
            panic!("expected an id, got {reply:?}");
        };
        router
            .handle(
                StockCommand::AddStock {
                    item_id: item_id.clone(),
                    amount: stock,
                    key: None,
                },
                ctx(),
            )
            .await;
        item_id
    }

    #[tokio::test]
    async fn test_find_item() {
        let router = stock_router(&InMemoryKeyValueStore::new());
        let item_id = create_item(&router, 4).await;

        let reply = router.handle(StockCommand::FindItem { item_id }, ctx()).await;

        assert_eq!(
            reply,
            Reply::success(ReplyData::Item(crate::stock::ItemView { stock: 4, price: 3 }))
        );
    }

    #[tokio::test]
    async fn test_missing_key_uses_correlation_id() {
        let router = stock_router(&InMemoryKeyValueStore::new());
        let item_id = create_item(&router, 10).await;
        let command = StockCommand::RemoveStock {
            item_id: item_id.clone(),
            amount: 3,
            key: None,
        };

        // Redelivery carries the same correlation id.
        let redelivered = ctx();
        router.handle(command.clone(), redelivered).await;
        let reply = router.handle(command.clone(), redelivered).await;
        assert_eq!(reply.data, ReplyData::Quantity(7));

        // A fresh request is a new operation.
        let reply = router.handle(command, ctx()).await;
        assert_eq!(reply.data, ReplyData::Quantity(4));
    }

    #[tokio::test]
    async fn test_rule_violation_is_client_error() {
        let router = stock_router(&InMemoryKeyValueStore::new());
        let item_id = create_item(&router, 1).await;

        let reply = router
            .handle(
                StockCommand::RemoveStockBulk {
                    data: BTreeMap::from([(item_id, 2)]),
                    key: "order-1".into(),
                },
                ctx(),
            )
            .await;

        assert_eq!(reply.status, Status::ClientError);
        assert!(reply.message().unwrap().starts_with("Insufficient stock"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_server_error() {
        let backend = InMemoryKeyValueStore::new();
        let router = stock_router(&backend);
        backend.set_unavailable(true);

        let reply = router
            .handle(StockCommand::FindItem { item_id: "a".into() }, ctx())
            .await;

        assert_eq!(reply, Reply::server_error());
    }

    #[tokio::test]
    async fn test_payment_router_charges_once_per_key() {
        let backend = InMemoryKeyValueStore::new();
        let router = PaymentRouter::new(PaymentService::new(AggregateStore::new(handle(&backend))));

        let ReplyData::Id(user_id) = router.handle(PaymentCommand::CreateUser, ctx()).await.data else {
            panic!("expected an id");
        };
        router
            .handle(
                PaymentCommand::AddFunds {
                    user_id: user_id.clone(),
                    amount: 100,
                    key: None,
                    compensation: false,
                },
                ctx(),
            )
            .await;

        let charge = PaymentCommand::RemoveCredit {
            user_id: user_id.clone(),
            amount: 40,
            key: Some("order-1".into()),
        };
        router.handle(charge.clone(), ctx()).await;
        router.handle(charge, ctx()).await;

        let reply = router.handle(PaymentCommand::FindUser { user_id }, ctx()).await;
        assert_eq!(
            reply.data,
            ReplyData::Wallet(crate::payment::WalletView { credit: 60 })
        );
    }

    #[tokio::test]
    async fn test_order_router_round_trip() {
        let backend = InMemoryKeyValueStore::new();
        let router = OrderRouter::new(OrderService::new(AggregateStore::new(handle(&backend))));

        let ReplyData::Id(order_id) = router
            .handle(
                OrderCommand::CreateOrder {
                    user_id: "user-1".into(),
                },
                ctx(),
            )
            .await
            .data
        else {
            panic!("expected an id");
        };

        let reply = router
            .handle(OrderCommand::FindOrder { order_id }, ctx())
            .await;
        assert_eq!(
            reply,
            Reply::success(ReplyData::Order(crate::order::Order::new("user-1")))
        );
    }

    #[test]
    fn test_reject_is_client_error() {
        let router = stock_router(&InMemoryKeyValueStore::new());
        let reply = RequestHandler::reject(&router, "malformed request".into());
        assert_eq!(reply, Reply::client_error("malformed request"));
    }
}
