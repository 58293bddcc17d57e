//! Domain error types.

use common::CodecError;
use store::StoreError;
use thiserror::Error;

use crate::protocol::Status;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The entity does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Removing the requested amount would drive stock below zero.
    #[error("Insufficient stock for item {item_id}")]
    InsufficientStock { item_id: String },

    /// Removing the requested amount would drive credit below zero.
    #[error("Insufficient credit for user {user_id}")]
    InsufficientCredit { user_id: String },

    /// Amounts, prices and quantities must not be negative, and applying
    /// one must not overflow the balance.
    #[error("Invalid amount: {0} (must not be negative or overflow the balance)")]
    InvalidAmount(i64),

    /// Order lines need at least one unit and must keep the total in range.
    #[error("Invalid quantity: {0} (must be greater than 0 and keep the order total in range)")]
    InvalidQuantity(i64),

    /// Paid orders can no longer be changed.
    #[error("Order {0} is already paid")]
    OrderAlreadyPaid(String),

    /// The storage backend failed or stayed unreachable.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored record could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl DomainError {
    /// Classifies the error for the reply sent to a remote caller.
    pub fn status(&self) -> Status {
        match self {
            DomainError::NotFound { .. }
            | DomainError::InsufficientStock { .. }
            | DomainError::InsufficientCredit { .. }
            | DomainError::InvalidAmount(_)
            | DomainError::InvalidQuantity(_)
            | DomainError::OrderAlreadyPaid(_) => Status::ClientError,
            DomainError::Store(_) | DomainError::Codec(_) => Status::ServerError,
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_violations_are_client_errors() {
        let err = DomainError::InsufficientStock {
            item_id: "a".into(),
        };
        assert_eq!(err.status(), Status::ClientError);
        assert_eq!(err.to_string(), "Insufficient stock for item a");

        let err = DomainError::NotFound {
            kind: "Item",
            id: "x".into(),
        };
        assert_eq!(err.status(), Status::ClientError);
        assert_eq!(err.to_string(), "Item x not found");
    }

    #[test]
    fn test_storage_failures_are_server_errors() {
        let err = DomainError::Store(StoreError::Unavailable("down".into()));
        assert_eq!(err.status(), Status::ServerError);
    }
}
