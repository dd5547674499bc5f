//! Putting held tickets up for resale.

use common::{Event, EventId, Money, Ticket, TicketId, TicketStatus, UserId};
use market_store::{ChangeSet, MarketStore, TicketQuery};

use crate::error::{MarketError, Result};
use crate::service::{Marketplace, stage_ticket};

/// Largest number of tickets one bulk operation may touch.
pub const MAX_BATCH: u32 = 1_000;

fn check_price(event: &Event, price: Money) -> Result<()> {
    if !price.is_positive() {
        return Err(MarketError::InvalidPrice);
    }
    if price > event.max_resale_price {
        return Err(MarketError::PriceCapExceeded {
            price,
            cap: event.max_resale_price,
        });
    }
    Ok(())
}

impl<S: MarketStore> Marketplace<S> {
    /// Lists a ticket for resale at `price`.
    ///
    /// The owner may re-price a ticket that is already on offer.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_resale(
        &self,
        ticket_id: TicketId,
        owner_id: UserId,
        price: Money,
    ) -> Result<Ticket> {
        let listed = self
            .commit_with_retry("list_for_resale", move || async move {
                let mut ticket = self.ticket(ticket_id).await?;
                let owner = self.user(owner_id).await?;
                if ticket.owner != owner.wallet {
                    return Err(MarketError::NotOwner(ticket_id));
                }

                let event = self.event(ticket.event_id).await?;
                check_price(&event, price)?;

                ticket.list_at(price);
                let mut changes = ChangeSet::new();
                let stored = stage_ticket(&mut changes, ticket);
                Ok((changes, stored))
            })
            .await?;

        metrics::counter!("marketplace_listings_total").increment(1);
        tracing::info!(%ticket_id, %price, "ticket listed");
        Ok(listed)
    }

    /// Lists `quantity` of the user's held tickets for an event at `price`.
    ///
    /// Lower serial numbers go first.
    #[tracing::instrument(skip(self))]
    pub async fn bulk_list(
        &self,
        user_id: UserId,
        event_id: EventId,
        quantity: u32,
        price: Money,
    ) -> Result<Vec<Ticket>> {
        if !(1..=MAX_BATCH).contains(&quantity) {
            return Err(MarketError::InvalidQuantity { max: MAX_BATCH });
        }

        let listed = self
            .commit_with_retry("bulk_list", move || async move {
                let user = self.user(user_id).await?;
                let event = self.event(event_id).await?;
                check_price(&event, price)?;

                let held = self
                    .store()
                    .list_tickets(
                        TicketQuery::owned_by(user.wallet)
                            .event(event_id)
                            .status(TicketStatus::Sold),
                    )
                    .await?;
                if held.len() < quantity as usize {
                    return Err(MarketError::InsufficientStock {
                        requested: quantity,
                        available: held.len() as u32,
                    });
                }

                let mut changes = ChangeSet::new();
                let stored = held
                    .into_iter()
                    .take(quantity as usize)
                    .map(|mut ticket| {
                        ticket.list_at(price);
                        stage_ticket(&mut changes, ticket)
                    })
                    .collect::<Vec<_>>();
                Ok((changes, stored))
            })
            .await?;

        metrics::counter!("marketplace_listings_total").increment(listed.len() as u64);
        tracing::info!(%event_id, quantity, %price, "tickets listed in bulk");
        Ok(listed)
    }
}
