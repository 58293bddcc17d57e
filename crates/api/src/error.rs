//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, Reply, SERVER_ERROR_MESSAGE, Status};
use rpc::RpcError;
use saga::CheckoutError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The service rejected the request; the message is shown to the caller.
    #[error("{0}")]
    BadRequest(String),

    /// Storage or transport failure. Details are logged, never returned.
    #[error("{0}")]
    Internal(String),

    /// A service answered with data the handler did not expect.
    #[error("Unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

impl ApiError {
    /// Converts a non-success reply.
    pub fn from_reply(reply: Reply) -> Self {
        let message = reply.message().unwrap_or(SERVER_ERROR_MESSAGE).to_string();
        match reply.status {
            Status::ClientError => ApiError::BadRequest(message),
            _ => ApiError::Internal(message),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) | ApiError::UnexpectedReply(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::BadRequest(msg) => msg,
            other => {
                tracing::error!(error = %other, "internal server error");
                SERVER_ERROR_MESSAGE.to_string()
            }
        };

        metrics::counter!("http_errors_total", "status" => status.as_u16().to_string())
            .increment(1);

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<RpcError> for ApiError {
    fn from(err: RpcError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err.status() {
            Status::ClientError => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err.status() {
            Status::ClientError => ApiError::BadRequest(err.reason()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
