//! Stock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::{ReplyData, STOCK_QUEUE, StockCommand};
use serde::Serialize;

use super::call;
use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ItemCreatedResponse {
    pub item_id: String,
}

#[derive(Serialize)]
pub struct ItemResponse {
    pub stock: i64,
    pub price: i64,
}

#[derive(Serialize)]
pub struct StockLevelResponse {
    pub item_id: String,
    pub stock: i64,
}

/// POST /stock/item/create/{price}: create an item with no stock.
#[tracing::instrument(skip(state))]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Path(price): Path<i64>,
) -> Result<Json<ItemCreatedResponse>, ApiError> {
    match call(&state, STOCK_QUEUE, StockCommand::CreateItem { price }).await? {
        ReplyData::Id(item_id) => Ok(Json(ItemCreatedResponse { item_id })),
        _ => Err(ApiError::UnexpectedReply("create_item")),
    }
}

/// GET /stock/find/{item_id}
#[tracing::instrument(skip(state))]
pub async fn find(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<String>,
) -> Result<Json<ItemResponse>, ApiError> {
    match call(&state, STOCK_QUEUE, StockCommand::FindItem { item_id }).await? {
        ReplyData::Item(item) => Ok(Json(ItemResponse {
            stock: item.stock,
            price: item.price,
        })),
        _ => Err(ApiError::UnexpectedReply("find_item")),
    }
}

/// POST /stock/add/{item_id}/{amount}
#[tracing::instrument(skip(state))]
pub async fn add(
    State(state): State<Arc<AppState>>,
    Path((item_id, amount)): Path<(String, i64)>,
) -> Result<Json<StockLevelResponse>, ApiError> {
    let command = StockCommand::AddStock {
        item_id: item_id.clone(),
        amount,
        key: None,
    };
    stock_level(&state, item_id, command, "add_stock").await
}

/// POST /stock/subtract/{item_id}/{amount}
#[tracing::instrument(skip(state))]
pub async fn subtract(
    State(state): State<Arc<AppState>>,
    Path((item_id, amount)): Path<(String, i64)>,
) -> Result<Json<StockLevelResponse>, ApiError> {
    let command = StockCommand::RemoveStock {
        item_id: item_id.clone(),
        amount,
        key: None,
    };
    stock_level(&state, item_id, command, "remove_stock").await
}

async fn stock_level(
    state: &AppState,
    item_id: String,
    command: StockCommand,
    action: &'static str,
) -> Result<Json<StockLevelResponse>, ApiError> {
    match call(state, STOCK_QUEUE, command).await? {
        ReplyData::Quantity(stock) => Ok(Json(StockLevelResponse { item_id, stock })),
        _ => Err(ApiError::UnexpectedReply(action)),
    }
}
