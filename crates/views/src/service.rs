//! Entry point for all read models.

use std::collections::HashMap;

use common::{Event, EventId, TicketId, User, UserId, WalletAddress};
use market_store::MarketStore;

use crate::error::{Result, ViewError};

/// Builds read models straight from the market store.
///
/// Nothing is cached between calls; every view reflects committed state at
/// the time it is built.
#[derive(Clone)]
pub struct MarketViews<S: MarketStore> {
    store: S,
}

impl<S: MarketStore> MarketViews<S> {
    /// Creates a new view builder over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) async fn user(&self, id: UserId) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| ViewError::UserNotFound(id.to_string()))
    }

    pub(crate) async fn user_by_wallet(&self, wallet: &WalletAddress) -> Result<User> {
        self.store
            .find_user_by_wallet(wallet)
            .await?
            .ok_or_else(|| ViewError::UserNotFound(wallet.to_string()))
    }

    pub(crate) async fn event(&self, id: EventId) -> Result<Event> {
        self.store
            .get_event(id)
            .await?
            .ok_or(ViewError::EventNotFound(id))
    }
}

/// Memoises event lookups while a view walks many tickets.
pub(crate) struct EventCache<'a, S: MarketStore> {
    store: &'a S,
    events: HashMap<EventId, Option<Event>>,
    ticket_events: HashMap<TicketId, Option<EventId>>,
}

impl<'a, S: MarketStore> EventCache<'a, S> {
    pub(crate) fn new(store: &'a S) -> Self {
        Self {
            store,
            events: HashMap::new(),
            ticket_events: HashMap::new(),
        }
    }

    pub(crate) async fn event(&mut self, id: EventId) -> Result<Option<Event>> {
        if let Some(cached) = self.events.get(&id) {
            return Ok(cached.clone());
        }
        let event = self.store.get_event(id).await?;
        self.events.insert(id, event.clone());
        Ok(event)
    }

    /// Resolves the event a ticket belongs to.
    pub(crate) async fn event_of_ticket(&mut self, ticket_id: TicketId) -> Result<Option<Event>> {
        let event_id = match self.ticket_events.get(&ticket_id) {
            Some(cached) => *cached,
            None => {
                let event_id = self
                    .store
                    .get_ticket(ticket_id)
                    .await?
                    .map(|ticket| ticket.event_id);
                self.ticket_events.insert(ticket_id, event_id);
                event_id
            }
        };

        match event_id {
            Some(id) => self.event(id).await,
            None => Ok(None),
        }
    }
}
