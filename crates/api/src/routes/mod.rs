pub mod health;
pub mod metrics;
pub mod orders;
pub mod payment;
pub mod stock;

use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;
use domain::{Reply, ReplyData};

/// Sends `command` to `queue` and unwraps a successful reply.
async fn call<C: Serialize>(state: &AppState, queue: &str, command: C) -> Result<ReplyData, ApiError> {
    let reply: Reply = state.client.call(queue, &command).await?;
    if reply.is_success() {
        Ok(reply.data)
    } else {
        Err(ApiError::from_reply(reply))
    }
}
