use thiserror::Error;

/// Errors that can occur when interacting with a key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached, or stayed unreachable after retrying.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The configured table name is not a plain identifier.
    #[error("Invalid table name: {0}")]
    InvalidTable(String),
}

impl StoreError {
    /// Returns true if the operation may succeed after reconnecting.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            StoreError::Migration(_) | StoreError::InvalidTable(_) => false,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
