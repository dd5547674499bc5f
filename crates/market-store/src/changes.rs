use std::collections::{BTreeMap, HashSet};

use common::{CartItem, CartItemId, Event, Money, Ticket, TicketId, Transaction, User, UserId};

/// A batch of writes committed atomically by [`MarketStore::commit`].
///
/// Updated users, tickets and cart lines carry the `version` they were read
/// at; the commit fails with `ConcurrencyConflict` if any of them changed
/// since. A ticket may be updated at most once per set.
/// Balance changes are relative and coalesced per user, so two commits that
/// only touch the same wallet never conflict with each other.
///
/// [`MarketStore::commit`]: crate::MarketStore::commit
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub new_users: Vec<User>,
    pub user_updates: Vec<User>,
    pub balance_changes: BTreeMap<UserId, Money>,
    pub new_events: Vec<Event>,
    pub new_tickets: Vec<Ticket>,
    pub ticket_updates: Vec<Ticket>,
    pub transactions: Vec<Transaction>,
    pub new_cart_items: Vec<CartItem>,
    pub cart_updates: Vec<CartItem>,
    pub cart_removals: Vec<(UserId, CartItemId)>,
    pub cart_clears: Vec<UserId>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&mut self, user: User) -> &mut Self {
        self.new_users.push(user);
        self
    }

    /// Saves profile fields (password hash, active flag) of an existing user.
    ///
    /// The balance is never written through this path; use [`credit`] and
    /// [`debit`].
    ///
    /// [`credit`]: ChangeSet::credit
    /// [`debit`]: ChangeSet::debit
    pub fn update_user(&mut self, user: User) -> &mut Self {
        self.user_updates.push(user);
        self
    }

    pub fn credit(&mut self, user_id: UserId, amount: Money) -> &mut Self {
        *self.balance_changes.entry(user_id).or_default() += amount;
        self
    }

    pub fn debit(&mut self, user_id: UserId, amount: Money) -> &mut Self {
        *self.balance_changes.entry(user_id).or_default() -= amount;
        self
    }

    pub fn insert_event(&mut self, event: Event) -> &mut Self {
        self.new_events.push(event);
        self
    }

    pub fn insert_tickets(&mut self, tickets: impl IntoIterator<Item = Ticket>) -> &mut Self {
        self.new_tickets.extend(tickets);
        self
    }

    pub fn update_ticket(&mut self, ticket: Ticket) -> &mut Self {
        self.ticket_updates.push(ticket);
        self
    }

    /// Appends an entry to the ledger.
    pub fn record(&mut self, transaction: Transaction) -> &mut Self {
        self.transactions.push(transaction);
        self
    }

    /// Adds a cart line. A user holds at most one line per event, seller and
    /// price; inserting a second one is reported as a concurrency conflict.
    pub fn insert_cart_item(&mut self, item: CartItem) -> &mut Self {
        self.new_cart_items.push(item);
        self
    }

    /// Saves the quantity of an existing cart line.
    pub fn update_cart_item(&mut self, item: CartItem) -> &mut Self {
        self.cart_updates.push(item);
        self
    }

    pub fn remove_cart_item(&mut self, user_id: UserId, item_id: CartItemId) -> &mut Self {
        self.cart_removals.push((user_id, item_id));
        self
    }

    pub fn clear_cart(&mut self, user_id: UserId) -> &mut Self {
        self.cart_clears.push(user_id);
        self
    }

    /// Returns the net balance change for a user within this set.
    pub fn balance_delta(&self, user_id: UserId) -> Money {
        self.balance_changes
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Returns the first ticket that is updated more than once.
    pub fn repeated_ticket_update(&self) -> Option<TicketId> {
        let mut seen = HashSet::new();
        self.ticket_updates
            .iter()
            .map(|ticket| ticket.id)
            .find(|id| !seen.insert(*id))
    }

    pub fn is_empty(&self) -> bool {
        self.new_users.is_empty()
            && self.user_updates.is_empty()
            && self.balance_changes.is_empty()
            && self.new_events.is_empty()
            && self.new_tickets.is_empty()
            && self.ticket_updates.is_empty()
            && self.transactions.is_empty()
            && self.new_cart_items.is_empty()
            && self.cart_updates.is_empty()
            && self.cart_removals.is_empty()
            && self.cart_clears.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use common::{EventId, WalletAddress};

    use super::*;

    #[test]
    fn balance_changes_coalesce_per_user() {
        let alice = UserId::new();
        let bob = UserId::new();
        let mut changes = ChangeSet::new();
        changes
            .credit(alice, Money::from_cents(500))
            .debit(alice, Money::from_cents(200))
            .debit(bob, Money::from_cents(50));

        assert_eq!(changes.balance_delta(alice), Money::from_cents(300));
        assert_eq!(changes.balance_delta(bob), Money::from_cents(-50));
        assert_eq!(changes.balance_delta(UserId::new()), Money::zero());
        assert_eq!(changes.balance_changes.len(), 2);
    }

    #[test]
    fn finds_tickets_updated_twice() {
        let owner = WalletAddress::generate();
        let event_id = EventId::new();
        let ticket = Ticket::mint(event_id, 1, owner.clone(), Money::from_cents(100));
        let other = Ticket::mint(event_id, 2, owner, Money::from_cents(100));

        let mut changes = ChangeSet::new();
        changes.update_ticket(ticket.clone()).update_ticket(other);
        assert_eq!(changes.repeated_ticket_update(), None);

        changes.update_ticket(ticket.clone());
        assert_eq!(changes.repeated_ticket_update(), Some(ticket.id));
    }

    #[test]
    fn empty_until_something_is_added() {
        let mut changes = ChangeSet::new();
        assert!(changes.is_empty());
        changes.clear_cart(UserId::new());
        assert!(!changes.is_empty());
    }
}
