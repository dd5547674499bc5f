use async_trait::async_trait;
use common::{CartItem, Event, EventId, Role, Ticket, TicketId, Transaction, User, UserId, WalletAddress};

use crate::{ChangeSet, LedgerQuery, Result, StoreError, TicketQuery, UserQuery};

/// Core trait for market store implementations.
///
/// All writes go through [`commit`](MarketStore::commit), which applies a
/// [`ChangeSet`] atomically: either every change is stored or none is.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Applies a change set atomically.
    ///
    /// Fails with:
    /// - `ConstraintViolation` on a duplicate username or wallet, or a
    ///   reference to a user, event or ticket that does not exist;
    /// - `ConcurrencyConflict` if an updated user or ticket changed since it
    ///   was read;
    /// - `InsufficientBalance` if a balance would become negative.
    async fn commit(&self, changes: ChangeSet) -> Result<()>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_user_by_wallet(&self, wallet: &WalletAddress) -> Result<Option<User>>;

    /// Lists users matching a query, oldest account first.
    async fn list_users(&self, query: UserQuery) -> Result<Vec<User>>;

    /// Deletes a user without history.
    ///
    /// Fails with `ConstraintViolation` if the user owns tickets, created
    /// events or staff accounts, or appears in the ledger.
    async fn delete_user(&self, id: UserId) -> Result<()>;

    async fn get_event(&self, id: EventId) -> Result<Option<Event>>;

    /// Lists events, optionally restricted to one creator, oldest first.
    async fn list_events(&self, creator: Option<WalletAddress>) -> Result<Vec<Event>>;

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>>;

    async fn list_tickets(&self, query: TicketQuery) -> Result<Vec<Ticket>>;

    /// Lists ledger entries matching a query, newest first.
    async fn list_transactions(&self, query: LedgerQuery) -> Result<Vec<Transaction>>;

    /// Lists a user's cart lines in the order they were added.
    async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartItem>>;
}

/// Extension trait providing convenience methods for market stores.
#[async_trait]
pub trait MarketStoreExt: MarketStore {
    /// Loads a user that must exist.
    async fn require_user(&self, id: UserId) -> Result<User> {
        self.get_user(id).await?.ok_or_else(|| StoreError::NotFound {
            entity: "user",
            id: id.to_string(),
        })
    }

    /// Returns true if at least one admin account exists.
    async fn has_admin(&self) -> Result<bool> {
        Ok(!self
            .list_users(UserQuery::new().role(Role::Admin))
            .await?
            .is_empty())
    }

    async fn count_tickets(&self, query: TicketQuery) -> Result<usize> {
        Ok(self.list_tickets(query).await?.len())
    }
}

// Blanket implementation for all MarketStore implementations
impl<T: MarketStore + ?Sized> MarketStoreExt for T {}
