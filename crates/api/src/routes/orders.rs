//! Order endpoints and the checkout trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::{ORDER_QUEUE, Order, OrderCommand, ReplyData, STOCK_QUEUE, StockCommand};
use saga::CheckoutOutcome;
use serde::Serialize;

use super::call;
use crate::AppState;
use crate::error::ApiError;

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub paid: bool,
    pub items: Vec<OrderLineResponse>,
    pub user_id: String,
    pub total_cost: i64,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub item_id: String,
    pub quantity: i64,
}

impl OrderResponse {
    fn new(order_id: String, order: Order) -> Self {
        Self {
            order_id,
            paid: order.paid,
            items: order
                .items
                .into_iter()
                .map(|(item_id, quantity)| OrderLineResponse { item_id, quantity })
                .collect(),
            user_id: order.user_id,
            total_cost: order.total_cost,
        }
    }
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub outcome: &'static str,
    pub stages: Vec<&'static str>,
}

// -- Handlers --

/// POST /orders/create/{user_id}: create an empty order.
#[tracing::instrument(skip(state))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<OrderCreatedResponse>, ApiError> {
    match call(&state, ORDER_QUEUE, OrderCommand::CreateOrder { user_id }).await? {
        ReplyData::Id(order_id) => Ok(Json(OrderCreatedResponse { order_id })),
        _ => Err(ApiError::UnexpectedReply("create_order")),
    }
}

/// GET /orders/find/{order_id}: load an order.
#[tracing::instrument(skip(state))]
pub async fn find(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = find_order(&state, &order_id).await?;
    Ok(Json(OrderResponse::new(order_id, order)))
}

/// POST /orders/addItem/{order_id}/{item_id}/{quantity}: add a line priced
/// at the item's current price.
#[tracing::instrument(skip(state))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path((order_id, item_id, quantity)): Path<(String, String, i64)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let mut order = find_order(&state, &order_id).await?;

    let price = match call(
        &state,
        STOCK_QUEUE,
        StockCommand::FindItem {
            item_id: item_id.clone(),
        },
    )
    .await?
    {
        ReplyData::Item(item) => item.price,
        _ => return Err(ApiError::UnexpectedReply("find_item")),
    };

    order.add_line(&order_id, &item_id, quantity, price)?;
    call(
        &state,
        ORDER_QUEUE,
        OrderCommand::AddItem {
            order_id: order_id.clone(),
            order_entry: order.clone(),
        },
    )
    .await?;

    Ok(Json(OrderResponse::new(order_id, order)))
}

/// POST /orders/checkout/{order_id}: reserve stock, charge the user and mark
/// the order paid.
#[tracing::instrument(skip(state))]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let report = state.orchestrator.checkout(&order_id).await;
    let stages = report.trail.iter().map(|r| r.stage.as_str()).collect();

    let outcome = match report.outcome? {
        CheckoutOutcome::Completed => "completed",
        CheckoutOutcome::AlreadyPaid => "already_paid",
    };

    Ok(Json(CheckoutResponse {
        order_id,
        outcome,
        stages,
    }))
}

async fn find_order(state: &AppState, order_id: &str) -> Result<Order, ApiError> {
    match call(
        state,
        ORDER_QUEUE,
        OrderCommand::FindOrder {
            order_id: order_id.to_string(),
        },
    )
    .await?
    {
        ReplyData::Order(order) => Ok(order),
        _ => Err(ApiError::UnexpectedReply("find_order")),
    }
}
