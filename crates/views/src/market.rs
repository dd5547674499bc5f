//! Seller storefronts and the event catalog.

use std::collections::BTreeMap;

use common::{Event, EventId, Money, Role, Ticket, WalletAddress};
use market_store::{MarketStore, TicketQuery};
use serde::Serialize;

use crate::error::Result;
use crate::service::{EventCache, MarketViews};

/// Tickets of one event offered at one price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub event_id: EventId,
    pub event_name: String,
    pub symbol: String,
    pub price: Money,
    pub count: usize,
}

/// Everything a seller currently offers.
#[derive(Debug, Clone, Serialize)]
pub struct Storefront {
    pub seller: String,
    pub wallet: WalletAddress,
    pub role: Role,
    pub listings: Vec<Listing>,
}

/// Tickets of one event offered by one seller at one price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Offer {
    pub seller: WalletAddress,
    pub seller_name: String,
    pub price: Money,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub event: Event,
    pub on_sale: usize,
    pub lowest_price: Option<Money>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    pub event: Event,
    pub total: usize,
    pub on_sale: usize,
    /// Cheapest first.
    pub offers: Vec<Offer>,
}

impl<S: MarketStore> MarketViews<S> {
    /// Lists what a seller offers, grouped by event and price.
    #[tracing::instrument(skip(self))]
    pub async fn storefront(&self, wallet: &WalletAddress) -> Result<Storefront> {
        let seller = self.user_by_wallet(wallet).await?;
        let tickets = self
            .store()
            .list_tickets(TicketQuery::owned_by(wallet.clone()).for_sale())
            .await?;

        let mut groups: BTreeMap<(EventId, Money), usize> = BTreeMap::new();
        for ticket in &tickets {
            if let Some(price) = ticket.asking_price() {
                *groups.entry((ticket.event_id, price)).or_default() += 1;
            }
        }

        let mut cache = EventCache::new(self.store());
        let mut listings = Vec::with_capacity(groups.len());
        for ((event_id, price), count) in groups {
            let Some(event) = cache.event(event_id).await? else {
                continue;
            };
            listings.push(Listing {
                event_id,
                event_name: event.name,
                symbol: event.symbol,
                price,
                count,
            });
        }

        Ok(Storefront {
            seller: seller.username,
            wallet: seller.wallet,
            role: seller.role,
            listings,
        })
    }

    /// Lists every event with how many tickets are on offer.
    #[tracing::instrument(skip(self))]
    pub async fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        let events = self.store().list_events(None).await?;

        let mut entries = Vec::with_capacity(events.len());
        for event in events {
            let on_offer = self
                .store()
                .list_tickets(TicketQuery::for_event(event.id).for_sale())
                .await?;
            entries.push(CatalogEntry {
                on_sale: on_offer.len(),
                lowest_price: on_offer.iter().filter_map(|t| t.asking_price()).min(),
                event,
            });
        }
        Ok(entries)
    }

    /// Shows one event with its offers grouped by seller and price.
    #[tracing::instrument(skip(self))]
    pub async fn event_detail(&self, event_id: EventId) -> Result<EventDetail> {
        let event = self.event(event_id).await?;
        let tickets = self
            .store()
            .list_tickets(TicketQuery::for_event(event_id))
            .await?;

        let mut groups: BTreeMap<(Money, WalletAddress), usize> = BTreeMap::new();
        for ticket in &tickets {
            if let Some(price) = ticket.asking_price() {
                *groups.entry((price, ticket.owner.clone())).or_default() += 1;
            }
        }

        let mut offers = Vec::with_capacity(groups.len());
        for ((price, seller), count) in groups {
            let seller_name = self.user_by_wallet(&seller).await?.username;
            offers.push(Offer {
                seller,
                seller_name,
                price,
                count,
            });
        }

        Ok(EventDetail {
            total: tickets.len(),
            on_sale: offers.iter().map(|o| o.count).sum(),
            offers,
            event,
        })
    }

    /// Tickets of an event a buyer can purchase right now, by serial.
    #[tracing::instrument(skip(self))]
    pub async fn tickets_on_offer(&self, event_id: EventId) -> Result<Vec<Ticket>> {
        self.event(event_id).await?;
        Ok(self
            .store()
            .list_tickets(TicketQuery::for_event(event_id).for_sale())
            .await?)
    }
}
