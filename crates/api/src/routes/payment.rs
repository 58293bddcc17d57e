//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::{PAYMENT_QUEUE, PaymentCommand, ReplyData};
use serde::Serialize;

use super::call;
use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct UserCreatedResponse {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct CreditResponse {
    pub user_id: String,
    pub credit: i64,
}

/// POST /payment/create_user: create a user with no credit.
#[tracing::instrument(skip(state))]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UserCreatedResponse>, ApiError> {
    match call(&state, PAYMENT_QUEUE, PaymentCommand::CreateUser).await? {
        ReplyData::Id(user_id) => Ok(Json(UserCreatedResponse { user_id })),
        _ => Err(ApiError::UnexpectedReply("create_user")),
    }
}

/// GET /payment/find_user/{user_id}
#[tracing::instrument(skip(state))]
pub async fn find_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<CreditResponse>, ApiError> {
    let command = PaymentCommand::FindUser {
        user_id: user_id.clone(),
    };
    match call(&state, PAYMENT_QUEUE, command).await? {
        ReplyData::Wallet(wallet) => Ok(Json(CreditResponse {
            user_id,
            credit: wallet.credit,
        })),
        _ => Err(ApiError::UnexpectedReply("find_user")),
    }
}

/// POST /payment/add_funds/{user_id}/{amount}
#[tracing::instrument(skip(state))]
pub async fn add_funds(
    State(state): State<Arc<AppState>>,
    Path((user_id, amount)): Path<(String, i64)>,
) -> Result<Json<CreditResponse>, ApiError> {
    let command = PaymentCommand::AddFunds {
        user_id: user_id.clone(),
        amount,
        key: None,
        compensation: false,
    };
    credit(&state, user_id, command, "add_funds").await
}

/// POST /payment/pay/{user_id}/{amount}: charge the user directly.
#[tracing::instrument(skip(state))]
pub async fn pay(
    State(state): State<Arc<AppState>>,
    Path((user_id, amount)): Path<(String, i64)>,
) -> Result<Json<CreditResponse>, ApiError> {
    let command = PaymentCommand::RemoveCredit {
        user_id: user_id.clone(),
        amount,
        key: None,
    };
    credit(&state, user_id, command, "remove_credit").await
}

async fn credit(
    state: &AppState,
    user_id: String,
    command: PaymentCommand,
    action: &'static str,
) -> Result<Json<CreditResponse>, ApiError> {
    match call(state, PAYMENT_QUEUE, command).await? {
        ReplyData::Quantity(credit) => Ok(Json(CreditResponse { user_id, credit })),
        _ => Err(ApiError::UnexpectedReply(action)),
    }
}
