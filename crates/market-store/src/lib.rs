//! Persistence for the ticket marketplace.
//!
//! One trait, [`MarketStore`], with an in-memory backend for tests and
//! single-process runs and a PostgreSQL backend for production. Every write
//! goes through an atomic [`ChangeSet`] commit.

pub mod changes;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use changes::ChangeSet;
pub use error::{Result, StoreError};
pub use memory::InMemoryMarketStore;
pub use postgres::PostgresMarketStore;
pub use query::{LedgerQuery, TicketQuery, UserQuery};
pub use store::{MarketStore, MarketStoreExt};
