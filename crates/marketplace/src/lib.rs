//! Domain services for the ticket marketplace.
//!
//! [`Marketplace`] owns every state-changing operation:
//! - accounts: registration, sign-in, staff hierarchy
//! - issuance: events and minted tickets
//! - listing and trading: resale, wholesale batches, cart checkout
//! - wallet: bank top-ups and withdrawals
//!
//! Each operation validates against freshly read state and commits all of
//! its writes, ledger entries included, as one atomic change set.

pub mod accounts;
pub mod cart;
pub mod commands;
pub mod credentials;
pub mod error;
pub mod issuance;
pub mod listing;
pub mod service;
pub mod trading;
pub mod wallet;

pub use cart::{Cart, CartLine};
pub use commands::{AddToCart, NewEvent, NewStaff};
pub use credentials::MIN_PASSWORD_LEN;
pub use error::{MarketError, Result};
pub use issuance::{MAX_SUPPLY, MAX_TICKET_PRICE};
pub use listing::MAX_BATCH;
pub use service::{MAX_COMMIT_ATTEMPTS, Marketplace};
pub use trading::Receipt;
pub use wallet::MAX_TRANSFER;
