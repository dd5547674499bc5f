//! Marketplace error types.

use common::{CartItemId, EventId, Money, TicketId};
use market_store::StoreError;
use thiserror::Error;

/// Errors that can occur during marketplace operations.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The username is already registered.
    #[error("Username already taken: {0}")]
    DuplicateUser(String),

    /// Unknown username or wrong password.
    #[error("Invalid username or password")]
    InvalidCredential,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Username must be 3 to 100 letters, digits, '_', '-' or '.'")]
    InvalidUsername,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// The acting user does not own the ticket.
    #[error("Ticket {0} is not yours")]
    NotOwner(TicketId),

    #[error("Price must be positive")]
    InvalidPrice,

    /// A resale price above the event's cap.
    #[error("Price {price} exceeds the resale cap of {cap}")]
    PriceCapExceeded { price: Money, cap: Money },

    /// The ticket is not listed or available.
    #[error("Ticket {0} is not for sale")]
    NotAvailable(TicketId),

    #[error("Insufficient funds: {needed} needed, {available} available")]
    InsufficientFunds { needed: Money, available: Money },

    #[error("Only {available} tickets available, {requested} requested")]
    InsufficientStock { requested: u32, available: u32 },

    /// A cart line can no longer be filled at its price.
    #[error("Stock changed for {event}: {available} of {requested} still on offer")]
    StockChanged {
        event: String,
        requested: u32,
        available: u32,
    },

    #[error("You cannot buy your own tickets")]
    SelfPurchase,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Quantity must be between 1 and {max}")]
    InvalidQuantity { max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    /// An amount, or a total or balance it produces, is too large.
    #[error("Amount out of range")]
    AmountOutOfRange,

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Cart item not found: {0}")]
    CartItemNotFound(CartItemId),

    /// A uniqueness or reference constraint rejected the change.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Concurrent writers kept invalidating the operation.
    #[error("Too many concurrent updates, please retry")]
    Contention,

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for MarketError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConstraintViolation(message) => MarketError::ConstraintViolation(message),
            other => MarketError::Store(other),
        }
    }
}

/// Result type for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;
