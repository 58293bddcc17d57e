//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use tower::ServiceExt;

use api::DomainStores;
use api::config::Config;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup() -> Router {
    let config = Config {
        retry_interval: std::time::Duration::from_millis(5),
        ..Config::default()
    };
    let state = api::create_default_state(&config, DomainStores::in_memory())
        .await
        .unwrap();
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn post(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, "POST", uri).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri).await
}

async fn create_user(app: &Router, credit: i64) -> String {
    let (status, json) = post(app, "/payment/create_user").await;
    assert_eq!(status, StatusCode::OK);
    let user_id = json["user_id"].as_str().unwrap().to_string();
    let (status, _) = post(app, &format!("/payment/add_funds/{user_id}/{credit}")).await;
    assert_eq!(status, StatusCode::OK);
    user_id
}

async fn create_item(app: &Router, price: i64, stock: i64) -> String {
    let (status, json) = post(app, &format!("/stock/item/create/{price}")).await;
    assert_eq!(status, StatusCode::OK);
    let item_id = json["item_id"].as_str().unwrap().to_string();
    let (status, _) = post(app, &format!("/stock/add/{item_id}/{stock}")).await;
    assert_eq!(status, StatusCode::OK);
    item_id
}

async fn create_order(app: &Router, user_id: &str) -> String {
    let (status, json) = post(app, &format!("/orders/create/{user_id}")).await;
    assert_eq!(status, StatusCode::OK);
    json["order_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup().await;

    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["pending_calls"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup().await;
    create_user(&app, 1).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("commands_handled_total"));
}

#[tokio::test]
async fn test_stock_endpoints() {
    let app = setup().await;
    let item_id = create_item(&app, 25, 10).await;

    let (status, json) = post(&app, &format!("/stock/subtract/{item_id}/4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stock"], 6);

    let (status, json) = get(&app, &format!("/stock/find/{item_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stock"], 6);
    assert_eq!(json["price"], 25);
}

#[tokio::test]
async fn test_overdraw_is_bad_request() {
    let app = setup().await;
    let item_id = create_item(&app, 25, 1).await;

    let (status, json) = post(&app, &format!("/stock/subtract/{item_id}/2")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], format!("Insufficient stock for item {item_id}"));
}

#[tokio::test]
async fn test_unknown_user_is_bad_request() {
    let app = setup().await;

    let (status, json) = get(&app, "/payment/find_user/nobody").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "User nobody not found");
}

#[tokio::test]
async fn test_non_numeric_amount_is_rejected() {
    let app = setup().await;

    let (status, _) = post(&app, "/payment/add_funds/someone/lots").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_item_merges_lines() {
    let app = setup().await;
    let user_id = create_user(&app, 0).await;
    let item_id = create_item(&app, 7, 10).await;
    let order_id = create_order(&app, &user_id).await;

    post(&app, &format!("/orders/addItem/{order_id}/{item_id}/2")).await;
    let (status, _) = post(&app, &format!("/orders/addItem/{order_id}/{item_id}/1")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, order) = get(&app, &format!("/orders/find/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["paid"], false);
    assert_eq!(order["user_id"], user_id.as_str());
    assert_eq!(order["total_cost"], 21);
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);
}

#[tokio::test]
async fn test_add_unknown_item_is_bad_request() {
    let app = setup().await;
    let order_id = create_order(&app, "user-1").await;

    let (status, json) = post(&app, &format!("/orders/addItem/{order_id}/ghost/1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Item ghost not found");
}

#[tokio::test]
async fn test_overflowing_quantity_is_bad_request() {
    let app = setup().await;
    let item_id = create_item(&app, 3, 1).await;
    let order_id = create_order(&app, "user-1").await;
    let quantity = i64::MAX / 2;

    let (status, json) = post(&app, &format!("/orders/addItem/{order_id}/{item_id}/{quantity}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"],
        format!("Invalid quantity: {quantity} (must be greater than 0 and keep the order total in range)")
    );
    let (_, order) = get(&app, &format!("/orders/find/{order_id}")).await;
    assert_eq!(order["total_cost"], 0);
    assert!(order["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_flow() {
    let app = setup().await;
    let user_id = create_user(&app, 100).await;
    let item_id = create_item(&app, 30, 5).await;
    let order_id = create_order(&app, &user_id).await;
    post(&app, &format!("/orders/addItem/{order_id}/{item_id}/2")).await;

    let (status, json) = post(&app, &format!("/orders/checkout/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "completed");
    assert_eq!(
        json["stages"],
        serde_json::json!(["reserving_stock", "charging_payment", "confirming_order"])
    );

    let (_, user) = get(&app, &format!("/payment/find_user/{user_id}")).await;
    assert_eq!(user["credit"], 40);
    let (_, item) = get(&app, &format!("/stock/find/{item_id}")).await;
    assert_eq!(item["stock"], 3);

    // Checking out again does not charge twice.
    let (status, json) = post(&app, &format!("/orders/checkout/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "already_paid");
    let (_, user) = get(&app, &format!("/payment/find_user/{user_id}")).await;
    assert_eq!(user["credit"], 40);

    // A paid order takes no more items.
    let (status, json) = post(&app, &format!("/orders/addItem/{order_id}/{item_id}/1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], format!("Order {order_id} is already paid"));
}

#[tokio::test]
async fn test_checkout_without_credit_is_bad_request() {
    let app = setup().await;
    let user_id = create_user(&app, 10).await;
    let item_id = create_item(&app, 30, 5).await;
    let order_id = create_order(&app, &user_id).await;
    post(&app, &format!("/orders/addItem/{order_id}/{item_id}/1")).await;

    let (status, json) = post(&app, &format!("/orders/checkout/{order_id}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], format!("Insufficient credit for user {user_id}"));
    let (_, item) = get(&app, &format!("/stock/find/{item_id}")).await;
    assert_eq!(item["stock"], 5);
}

#[tokio::test]
async fn test_checkout_empty_order_is_bad_request() {
    let app = setup().await;
    let order_id = create_order(&app, "user-1").await;

    let (status, json) = post(&app, &format!("/orders/checkout/{order_id}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], format!("Order {order_id} has no items"));
}
