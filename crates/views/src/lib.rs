//! Read models for the marketplace.
//!
//! [`MarketViews`] turns committed store state into documents for display:
//! - role dashboards
//! - seller storefronts, the event catalog and event detail
//! - order history grouped by transaction
//! - the public ledger and per-wallet history

pub mod dashboard;
pub mod error;
pub mod ledger;
pub mod market;
pub mod orders;
pub mod service;

pub use dashboard::{Dashboard, EventStats, Holding, SupplierEvent};
pub use error::{Result, ViewError};
pub use ledger::{PUBLIC_LEDGER_SIZE, WalletHistory};
pub use market::{CatalogEntry, EventDetail, Listing, Offer, Storefront};
pub use orders::Order;
pub use service::MarketViews;
