//! HTTP façade for the order, stock and payment services.
//!
//! Provides REST endpoints that forward to the domain services over the
//! broker and run checkouts through the saga orchestrator, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::RetryPolicy;
use domain::{
    AggregateStore, ORDER_QUEUE, OrderRouter, OrderService, PAYMENT_QUEUE, PaymentRouter,
    PaymentService, SERVICE_QUEUES, STOCK_QUEUE, StockRouter, StockService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rpc::{Broker, InMemoryBroker, RequestHandler, RpcClient, RpcClientConfig, RpcError, RpcServer};
use saga::{CheckoutOrchestrator, RpcOrderGateway, RpcPaymentGateway, RpcStockGateway};
use sqlx::PgPool;
use store::{InMemoryKeyValueStore, KeyValueStore, PostgresKeyValueStore, StoreHandle};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Orchestrator wired to the services over the broker.
pub type Orchestrator = CheckoutOrchestrator<RpcOrderGateway, RpcStockGateway, RpcPaymentGateway>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub client: Arc<RpcClient>,
    pub orchestrator: Orchestrator,
}

/// Key-value backends of the three domains.
pub struct DomainStores {
    pub orders: Arc<dyn KeyValueStore>,
    pub stock: Arc<dyn KeyValueStore>,
    pub payment: Arc<dyn KeyValueStore>,
}

impl DomainStores {
    pub fn in_memory() -> Self {
        Self {
            orders: Arc::new(InMemoryKeyValueStore::new()),
            stock: Arc::new(InMemoryKeyValueStore::new()),
            payment: Arc::new(InMemoryKeyValueStore::new()),
        }
    }

    /// One table per domain in a shared database.
    pub fn postgres(pool: PgPool) -> store::Result<Self> {
        Ok(Self {
            orders: Arc::new(PostgresKeyValueStore::new(pool.clone(), "orders")?),
            stock: Arc::new(PostgresKeyValueStore::new(pool.clone(), "stock")?),
            payment: Arc::new(PostgresKeyValueStore::new(pool, "payment")?),
        })
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders/create/{user_id}", post(routes::orders::create))
        .route("/orders/find/{order_id}", get(routes::orders::find))
        .route(
            "/orders/addItem/{order_id}/{item_id}/{quantity}",
            post(routes::orders::add_item),
        )
        .route("/orders/checkout/{order_id}", post(routes::orders::checkout))
        .route("/stock/item/create/{price}", post(routes::stock::create_item))
        .route("/stock/find/{item_id}", get(routes::stock::find))
        .route("/stock/add/{item_id}/{amount}", post(routes::stock::add))
        .route("/stock/subtract/{item_id}/{amount}", post(routes::stock::subtract))
        .route("/payment/create_user", post(routes::payment::create_user))
        .route("/payment/find_user/{user_id}", get(routes::payment::find_user))
        .route(
            "/payment/add_funds/{user_id}/{amount}",
            post(routes::payment::add_funds),
        )
        .route("/payment/pay/{user_id}/{amount}", post(routes::payment::pay))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Starts the three command routers on an in-process broker and connects
/// the client and orchestrator used by the handlers.
///
/// Every domain runs as tasks of this process. The domains only share the
/// broker; each keeps its own queue and backend.
pub async fn create_default_state(
    config: &Config,
    stores: DomainStores,
) -> Result<Arc<AppState>, RpcError> {
    let broker = InMemoryBroker::new();
    let retry = config.retry_policy();
    let handle = |backend: Arc<dyn KeyValueStore>| StoreHandle::new(backend, retry);

    serve(
        &broker,
        ORDER_QUEUE,
        OrderRouter::new(OrderService::new(AggregateStore::new(handle(stores.orders)))),
        retry,
    );
    serve(
        &broker,
        STOCK_QUEUE,
        StockRouter::new(StockService::new(AggregateStore::new(handle(stores.stock)))),
        retry,
    );
    serve(
        &broker,
        PAYMENT_QUEUE,
        PaymentRouter::new(PaymentService::new(AggregateStore::new(handle(stores.payment)))),
        retry,
    );

    let client = RpcClient::connect(
        Arc::new(broker) as Arc<dyn Broker>,
        RpcClientConfig::new(SERVICE_QUEUES)
            .with_retry(retry)
            .with_call_timeout(config.rpc_timeout),
    )
    .await?;
    let client = Arc::new(client);

    let orchestrator = CheckoutOrchestrator::new(
        RpcOrderGateway::new(client.clone()),
        RpcStockGateway::new(client.clone()),
        RpcPaymentGateway::new(client.clone()),
    );

    Ok(Arc::new(AppState {
        client,
        orchestrator,
    }))
}

fn serve<H: RequestHandler>(broker: &InMemoryBroker, queue: &'static str, handler: H, retry: RetryPolicy) {
    let server = RpcServer::new(Arc::new(broker.clone()), queue, handler).with_retry(retry);
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(queue, error = %e, "command router stopped");
        }
    });
}
