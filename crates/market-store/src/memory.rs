use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    CartItem, Event, EventId, Ticket, TicketId, Transaction, User, UserId, WalletAddress,
};
use tokio::sync::RwLock;

use crate::{
    ChangeSet, LedgerQuery, Result, StoreError, TicketQuery, UserQuery, store::MarketStore,
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    events: HashMap<EventId, Event>,
    tickets: HashMap<TicketId, Ticket>,
    /// Append order is chronological.
    transactions: Vec<Transaction>,
    cart: Vec<CartItem>,
}

impl Tables {
    fn wallet_known(&self, changes: &ChangeSet, wallet: &WalletAddress) -> bool {
        self.users.values().any(|u| &u.wallet == wallet)
            || changes.new_users.iter().any(|u| &u.wallet == wallet)
    }

    fn user_known(&self, changes: &ChangeSet, id: UserId) -> bool {
        self.users.contains_key(&id) || changes.new_users.iter().any(|u| u.id == id)
    }

    fn event_known(&self, changes: &ChangeSet, id: EventId) -> bool {
        self.events.contains_key(&id) || changes.new_events.iter().any(|e| e.id == id)
    }

    fn ticket_known(&self, changes: &ChangeSet, id: TicketId) -> bool {
        self.tickets.contains_key(&id) || changes.new_tickets.iter().any(|t| t.id == id)
    }

    /// Checks every change against the current tables without mutating them.
    fn validate(&self, changes: &ChangeSet) -> Result<()> {
        let mut usernames = HashSet::new();
        let mut wallets = HashSet::new();
        for user in &changes.new_users {
            if self.users.contains_key(&user.id) {
                return Err(StoreError::ConstraintViolation(format!(
                    "user {} already exists",
                    user.id
                )));
            }
            if !usernames.insert(user.username.as_str())
                || self.users.values().any(|u| u.username == user.username)
            {
                return Err(StoreError::ConstraintViolation(format!(
                    "username '{}' is already taken",
                    user.username
                )));
            }
            if !wallets.insert(&user.wallet) || self.users.values().any(|u| u.wallet == user.wallet)
            {
                return Err(StoreError::ConstraintViolation(format!(
                    "wallet {} is already registered",
                    user.wallet
                )));
            }
            if let Some(ref parent) = user.parent
                && !self.wallet_known(changes, parent)
            {
                return Err(StoreError::ConstraintViolation(format!(
                    "parent wallet {parent} does not exist"
                )));
            }
        }

        for user in &changes.user_updates {
            let current = self.users.get(&user.id).ok_or_else(|| StoreError::NotFound {
                entity: "user",
                id: user.id.to_string(),
            })?;
            if current.version != user.version {
                return Err(StoreError::ConcurrencyConflict {
                    entity: "user",
                    id: user.id.to_string(),
                    expected: user.version,
                });
            }
        }

        for (&user_id, &delta) in &changes.balance_changes {
            let balance = self
                .users
                .get(&user_id)
                .or_else(|| changes.new_users.iter().find(|u| u.id == user_id))
                .map(|u| u.balance)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "user",
                    id: user_id.to_string(),
                })?;
            let updated = balance.checked_add(delta).ok_or_else(|| {
                StoreError::ConstraintViolation(format!("balance of user {user_id} out of range"))
            })?;
            if updated.is_negative() {
                return Err(StoreError::InsufficientBalance { user_id });
            }
        }

        for event in &changes.new_events {
            if self.events.contains_key(&event.id) {
                return Err(StoreError::ConstraintViolation(format!(
                    "event {} already exists",
                    event.id
                )));
            }
            if !self.wallet_known(changes, &event.creator) {
                return Err(StoreError::ConstraintViolation(format!(
                    "event creator {} does not exist",
                    event.creator
                )));
            }
        }

        for ticket in &changes.new_tickets {
            if self.tickets.contains_key(&ticket.id) {
                return Err(StoreError::ConstraintViolation(format!(
                    "ticket {} already exists",
                    ticket.id
                )));
            }
            if !self.event_known(changes, ticket.event_id) {
                return Err(StoreError::ConstraintViolation(format!(
                    "event {} does not exist",
                    ticket.event_id
                )));
            }
            if !self.wallet_known(changes, &ticket.owner) {
                return Err(StoreError::ConstraintViolation(format!(
                    "ticket owner {} does not exist",
                    ticket.owner
                )));
            }
        }

        if let Some(id) = changes.repeated_ticket_update() {
            return Err(StoreError::ConstraintViolation(format!(
                "ticket {id} is updated twice in one commit"
            )));
        }
        for ticket in &changes.ticket_updates {
            let current = self
                .tickets
                .get(&ticket.id)
                .ok_or_else(|| StoreError::NotFound {
                    entity: "ticket",
                    id: ticket.id.to_string(),
                })?;
            if current.version != ticket.version {
                return Err(StoreError::ConcurrencyConflict {
                    entity: "ticket",
                    id: ticket.id.to_string(),
                    expected: ticket.version,
                });
            }
            if !self.wallet_known(changes, &ticket.owner) {
                return Err(StoreError::ConstraintViolation(format!(
                    "ticket owner {} does not exist",
                    ticket.owner
                )));
            }
        }

        for tx in &changes.transactions {
            for party in [&tx.from, &tx.to] {
                if let Some(wallet) = party.wallet()
                    && !self.wallet_known(changes, wallet)
                {
                    return Err(StoreError::ConstraintViolation(format!(
                        "ledger party {wallet} does not exist"
                    )));
                }
            }
            if let Some(ticket_id) = tx.ticket_id
                && !self.ticket_known(changes, ticket_id)
            {
                return Err(StoreError::ConstraintViolation(format!(
                    "ledger ticket {ticket_id} does not exist"
                )));
            }
        }

        for (i, item) in changes.new_cart_items.iter().enumerate() {
            if self.cart.iter().any(|c| c.id == item.id) {
                return Err(StoreError::ConstraintViolation(format!(
                    "cart item {} already exists",
                    item.id
                )));
            }
            let line_taken = self.cart.iter().any(|c| c.same_line(item))
                || changes.new_cart_items[..i].iter().any(|c| c.same_line(item));
            if line_taken {
                return Err(StoreError::ConcurrencyConflict {
                    entity: "cart item",
                    id: item.id.to_string(),
                    expected: 0,
                });
            }
            if !self.user_known(changes, item.user_id) {
                return Err(StoreError::ConstraintViolation(format!(
                    "cart owner {} does not exist",
                    item.user_id
                )));
            }
            if !self.event_known(changes, item.event_id) {
                return Err(StoreError::ConstraintViolation(format!(
                    "event {} does not exist",
                    item.event_id
                )));
            }
            if !self.wallet_known(changes, &item.reseller) {
                return Err(StoreError::ConstraintViolation(format!(
                    "reseller {} does not exist",
                    item.reseller
                )));
            }
        }

        for item in &changes.cart_updates {
            // A line that was checked out or removed since it was read counts
            // as changed.
            let current_version = self
                .cart
                .iter()
                .find(|c| c.id == item.id && c.user_id == item.user_id)
                .map(|c| c.version);
            if current_version != Some(item.version) {
                return Err(StoreError::ConcurrencyConflict {
                    entity: "cart item",
                    id: item.id.to_string(),
                    expected: item.version,
                });
            }
        }

        Ok(())
    }

    fn apply(&mut self, changes: ChangeSet) {
        for user in changes.new_users {
            self.users.insert(user.id, user);
        }
        for update in changes.user_updates {
            if let Some(current) = self.users.get_mut(&update.id) {
                current.password_hash = update.password_hash;
                current.active = update.active;
                current.version += 1;
            }
        }
        for (user_id, delta) in changes.balance_changes {
            if let Some(user) = self.users.get_mut(&user_id) {
                user.balance += delta;
            }
        }
        for event in changes.new_events {
            self.events.insert(event.id, event);
        }
        for ticket in changes.new_tickets {
            self.tickets.insert(ticket.id, ticket);
        }
        for ticket in changes.ticket_updates {
            let version = ticket.version + 1;
            self.tickets.insert(ticket.id, Ticket { version, ..ticket });
        }
        self.transactions.extend(changes.transactions);
        self.cart.extend(changes.new_cart_items);
        for update in changes.cart_updates {
            if let Some(current) = self.cart.iter_mut().find(|c| c.id == update.id) {
                current.quantity = update.quantity;
                current.version += 1;
            }
        }
        for (user_id, item_id) in changes.cart_removals {
            self.cart
                .retain(|c| !(c.user_id == user_id && c.id == item_id));
        }
        for user_id in changes.cart_clears {
            self.cart.retain(|c| c.user_id != user_id);
        }
    }
}

/// In-memory market store.
///
/// Used by tests and by the server when no database is configured. A single
/// lock guards all tables, so a commit is validated and applied as one step.
#[derive(Clone, Default)]
pub struct InMemoryMarketStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryMarketStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of ledger entries.
    pub async fn transaction_count(&self) -> usize {
        self.tables.read().await.transactions.len()
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Err(e) = tables.validate(&changes) {
            tracing::debug!(error = %e, "commit rejected");
            return Err(e);
        }
        tables.apply(changes);
        metrics::counter!("market_store_commits_total", "backend" => "memory").increment(1);
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_wallet(&self, wallet: &WalletAddress) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| &u.wallet == wallet).cloned())
    }

    async fn list_users(&self, query: UserQuery) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<_> = tables
            .users
            .values()
            .filter(|u| query.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(users)
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get(&id).ok_or_else(|| StoreError::NotFound {
            entity: "user",
            id: id.to_string(),
        })?;
        let wallet = &user.wallet;

        let has_history = tables.tickets.values().any(|t| &t.owner == wallet)
            || tables.events.values().any(|e| &e.creator == wallet)
            || tables.transactions.iter().any(|tx| tx.involves(wallet))
            || tables.users.values().any(|u| u.parent.as_ref() == Some(wallet))
            || tables.cart.iter().any(|c| &c.reseller == wallet);
        if has_history {
            return Err(StoreError::ConstraintViolation(format!(
                "user {id} has ledger history"
            )));
        }

        tables.users.remove(&id);
        tables.cart.retain(|c| c.user_id != id);
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn list_events(&self, creator: Option<WalletAddress>) -> Result<Vec<Event>> {
        let tables = self.tables.read().await;
        let mut events: Vec<_> = tables
            .events
            .values()
            .filter(|e| creator.as_ref().is_none_or(|c| &e.creator == c))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(events)
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        Ok(self.tables.read().await.tickets.get(&id).cloned())
    }

    async fn list_tickets(&self, query: TicketQuery) -> Result<Vec<Ticket>> {
        let tables = self.tables.read().await;
        let mut tickets: Vec<_> = tables
            .tickets
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| a.event_id.cmp(&b.event_id).then(a.serial.cmp(&b.serial)));
        if let Some(limit) = query.limit {
            tickets.truncate(limit);
        }
        Ok(tickets)
    }

    async fn list_transactions(&self, query: LedgerQuery) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        let matching = tables
            .transactions
            .iter()
            .rev()
            .filter(|tx| query.matches(tx))
            .cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let tables = self.tables.read().await;
        Ok(tables
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }
}
