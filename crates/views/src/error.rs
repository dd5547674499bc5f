//! View error types.

use common::EventId;
use market_store::StoreError;
use thiserror::Error;

/// Errors that can occur while building a read model.
#[derive(Debug, Error)]
pub enum ViewError {
    /// An error occurred in the market store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(EventId),
}

/// Result type for view operations.
pub type Result<T> = std::result::Result<T, ViewError>;
