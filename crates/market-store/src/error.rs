use common::UserId;
use thiserror::Error;

/// Errors that can occur when interacting with the market store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record was modified after it was read.
    /// The whole commit was rejected.
    #[error("Concurrency conflict on {entity} {id}: expected version {expected}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: i64,
    },

    /// A uniqueness or referential constraint would be broken.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A balance change would leave a wallet negative.
    #[error("Insufficient balance for user {user_id}")]
    InsufficientBalance { user_id: UserId },

    /// A record addressed by a change set does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored row could not be decoded.
    #[error("Corrupt record: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if re-reading and re-planning the commit may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::InsufficientBalance { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
