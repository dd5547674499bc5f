//! Shared types for the ticket marketplace.
//!
//! Identifiers, money, wallet addresses and the entity records that flow
//! between the store, the domain services and the HTTP layer.

pub mod model;
pub mod money;
pub mod types;
pub mod wallet;

pub use model::{
    CartItem, Event, Role, Ticket, TicketStatus, Transaction, TransactionKind, UnknownVariant, User,
};
pub use money::Money;
pub use types::{CartItemId, EventId, TicketId, TransactionId, UserId};
pub use wallet::{InvalidWalletAddress, Party, TxHash, WalletAddress};
