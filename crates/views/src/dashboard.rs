//! Per-role dashboards.

use common::{Event, EventId, Role, TicketStatus, User, UserId, WalletAddress};
use market_store::{MarketStore, TicketQuery, UserQuery};
use serde::Serialize;

use crate::error::Result;
use crate::service::{EventCache, MarketViews};

/// Issuance progress of one event.
#[derive(Debug, Clone, Serialize)]
pub struct EventStats {
    #[serde(flatten)]
    pub event: Event,
    pub total: usize,
    /// Tickets no longer held by the organizer.
    pub sold: usize,
    pub unsold: usize,
}

/// What a user holds of one event.
#[derive(Debug, Clone, Serialize)]
pub struct Holding {
    pub event: Event,
    pub owned: usize,
    pub listed: usize,
    pub unlisted: usize,
}

/// An event a reseller can buy wholesale from its organizer.
#[derive(Debug, Clone, Serialize)]
pub struct SupplierEvent {
    #[serde(flatten)]
    pub event: Event,
    pub wholesale_available: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Admin {
        account: User,
        organizers: Vec<User>,
    },
    Organizer {
        account: User,
        events: Vec<EventStats>,
        resellers: Vec<User>,
    },
    Reseller {
        account: User,
        holdings: Vec<Holding>,
        supplier_events: Vec<SupplierEvent>,
    },
    Customer {
        account: User,
        holdings: Vec<Holding>,
    },
}

impl Dashboard {
    pub fn account(&self) -> &User {
        match self {
            Dashboard::Admin { account, .. }
            | Dashboard::Organizer { account, .. }
            | Dashboard::Reseller { account, .. }
            | Dashboard::Customer { account, .. } => account,
        }
    }
}

impl<S: MarketStore> MarketViews<S> {
    /// Builds the dashboard matching the user's role.
    #[tracing::instrument(skip(self))]
    pub async fn dashboard(&self, user_id: UserId) -> Result<Dashboard> {
        let account = self.user(user_id).await?;

        let dashboard = match account.role {
            Role::Admin => {
                let organizers = self
                    .store()
                    .list_users(
                        UserQuery::new()
                            .role(Role::Organizer)
                            .parent(account.wallet.clone()),
                    )
                    .await?;
                Dashboard::Admin {
                    account,
                    organizers,
                }
            }
            Role::Organizer => {
                let events = self.event_stats(&account.wallet).await?;
                let resellers = self
                    .store()
                    .list_users(
                        UserQuery::new()
                            .role(Role::Reseller)
                            .parent(account.wallet.clone()),
                    )
                    .await?;
                Dashboard::Organizer {
                    account,
                    events,
                    resellers,
                }
            }
            Role::Reseller => {
                let holdings = self.holdings(&account.wallet).await?;
                let supplier_events = match &account.parent {
                    Some(organizer) => self.supplier_events(organizer).await?,
                    None => Vec::new(),
                };
                Dashboard::Reseller {
                    account,
                    holdings,
                    supplier_events,
                }
            }
            Role::Customer => {
                let holdings = self.holdings(&account.wallet).await?;
                Dashboard::Customer { account, holdings }
            }
        };

        Ok(dashboard)
    }

    async fn event_stats(&self, creator: &WalletAddress) -> Result<Vec<EventStats>> {
        let events = self.store().list_events(Some(creator.clone())).await?;

        let mut stats = Vec::with_capacity(events.len());
        for event in events {
            let tickets = self
                .store()
                .list_tickets(TicketQuery::for_event(event.id))
                .await?;
            let unsold = tickets.iter().filter(|t| &t.owner == creator).count();
            stats.push(EventStats {
                total: tickets.len(),
                sold: tickets.len() - unsold,
                unsold,
                event,
            });
        }
        Ok(stats)
    }

    /// Groups a wallet's tickets by event, in event order.
    pub(crate) async fn holdings(&self, wallet: &WalletAddress) -> Result<Vec<Holding>> {
        let tickets = self
            .store()
            .list_tickets(TicketQuery::owned_by(wallet.clone()))
            .await?;

        let mut groups: Vec<(EventId, usize, usize)> = Vec::new();
        for ticket in &tickets {
            let listed = usize::from(ticket.status.is_for_sale());
            match groups.last_mut() {
                Some((event_id, owned, for_sale)) if *event_id == ticket.event_id => {
                    *owned += 1;
                    *for_sale += listed;
                }
                _ => groups.push((ticket.event_id, 1, listed)),
            }
        }

        let mut cache = EventCache::new(self.store());
        let mut holdings = Vec::with_capacity(groups.len());
        for (event_id, owned, listed) in groups {
            let Some(event) = cache.event(event_id).await? else {
                continue;
            };
            holdings.push(Holding {
                event,
                owned,
                listed,
                unlisted: owned - listed,
            });
        }
        Ok(holdings)
    }

    async fn supplier_events(&self, organizer: &WalletAddress) -> Result<Vec<SupplierEvent>> {
        let events = self.store().list_events(Some(organizer.clone())).await?;

        let mut supplier_events = Vec::with_capacity(events.len());
        for event in events {
            let wholesale_available = self
                .store()
                .list_tickets(
                    TicketQuery::owned_by(organizer.clone())
                        .event(event.id)
                        .status(TicketStatus::Available),
                )
                .await?
                .len();
            supplier_events.push(SupplierEvent {
                event,
                wholesale_available,
            });
        }
        Ok(supplier_events)
    }
}
