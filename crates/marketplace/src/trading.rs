//! Ticket purchases: single resale, wholesale batches and cart checkout.

use std::collections::HashSet;
use std::time::Instant;

use common::{
    EventId, Money, Role, Ticket, TicketId, TicketStatus, Transaction, TransactionKind, TxHash,
    User, UserId,
};
use market_store::{ChangeSet, MarketStore, TicketQuery};
use serde::Serialize;

use crate::error::{MarketError, Result};
use crate::listing::MAX_BATCH;
use crate::service::Marketplace;

/// Outcome of a multi-ticket purchase.
///
/// All entries share one transaction hash.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub entries: Vec<Transaction>,
    pub total: Money,
}

impl Receipt {
    pub fn ticket_count(&self) -> usize {
        self.entries.len()
    }
}

fn ensure_funds(buyer: &User, needed: Money) -> Result<()> {
    if buyer.balance < needed {
        return Err(MarketError::InsufficientFunds {
            needed,
            available: buyer.balance,
        });
    }
    Ok(())
}

/// Moves a ticket to `buyer` and records the matching ledger entry.
fn stage_transfer(
    changes: &mut ChangeSet,
    mut ticket: Ticket,
    seller: &User,
    buyer: &User,
    price: Money,
    kind: TransactionKind,
    tx_hash: &TxHash,
) -> Transaction {
    let entry = Transaction::new(
        tx_hash.clone(),
        kind,
        seller.wallet.clone(),
        buyer.wallet.clone(),
        price,
    )
    .for_ticket(ticket.id);

    ticket.transfer_to(buyer.wallet.clone());
    changes
        .update_ticket(ticket)
        .debit(buyer.id, price)
        .credit(seller.id, price)
        .record(entry.clone());
    entry
}

impl<S: MarketStore> Marketplace<S> {
    /// Buys a ticket that is on offer.
    ///
    /// Debits the buyer, credits the seller, hands over the ticket and
    /// appends one `PURCHASE` entry, all in one commit. When two buyers race
    /// for the same ticket exactly one succeeds; the other sees
    /// [`MarketError::NotAvailable`].
    #[tracing::instrument(skip(self))]
    pub async fn purchase(&self, ticket_id: TicketId, buyer_id: UserId) -> Result<Transaction> {
        let start = Instant::now();

        let result = self
            .commit_with_retry("purchase", move || async move {
                let ticket = self.ticket(ticket_id).await?;
                let buyer = self.user(buyer_id).await?;
                let price = ticket
                    .asking_price()
                    .ok_or(MarketError::NotAvailable(ticket_id))?;
                if ticket.owner == buyer.wallet {
                    return Err(MarketError::SelfPurchase);
                }
                ensure_funds(&buyer, price)?;

                let seller = self.user_by_wallet(&ticket.owner).await?;
                let mut changes = ChangeSet::new();
                let entry = stage_transfer(
                    &mut changes,
                    ticket,
                    &seller,
                    &buyer,
                    price,
                    TransactionKind::Purchase,
                    &TxHash::generate(),
                );
                Ok((changes, entry))
            })
            .await;

        metrics::histogram!("marketplace_purchase_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        match &result {
            Ok(entry) => {
                metrics::counter!("marketplace_purchases_total", "outcome" => "completed")
                    .increment(1);
                tracing::info!(%ticket_id, tx_hash = %entry.tx_hash, amount = %entry.amount, "ticket purchased");
            }
            Err(e) => {
                metrics::counter!("marketplace_purchases_total", "outcome" => "rejected")
                    .increment(1);
                tracing::debug!(%ticket_id, error = %e, "purchase rejected");
            }
        }
        result
    }

    /// Buys `quantity` freshly minted tickets at wholesale.
    ///
    /// Only a reseller may do this, and only for events issued by the
    /// organizer that created it.
    #[tracing::instrument(skip(self))]
    pub async fn bulk_acquire(
        &self,
        reseller_id: UserId,
        event_id: EventId,
        quantity: u32,
    ) -> Result<Receipt> {
        if !(1..=MAX_BATCH).contains(&quantity) {
            return Err(MarketError::InvalidQuantity { max: MAX_BATCH });
        }

        let receipt = self
            .commit_with_retry("bulk_acquire", move || async move {
                let reseller = self.user(reseller_id).await?;
                if reseller.role != Role::Reseller {
                    return Err(MarketError::PermissionDenied(
                        "only resellers buy wholesale".to_string(),
                    ));
                }

                let event = self.event(event_id).await?;
                if reseller.parent.as_ref() != Some(&event.creator) {
                    return Err(MarketError::PermissionDenied(format!(
                        "{} is not issued by your organizer",
                        event.name
                    )));
                }

                let stock = self
                    .store()
                    .list_tickets(
                        TicketQuery::owned_by(event.creator.clone())
                            .event(event_id)
                            .status(TicketStatus::Available)
                            .limit(quantity as usize),
                    )
                    .await?;
                if stock.len() < quantity as usize {
                    return Err(MarketError::InsufficientStock {
                        requested: quantity,
                        available: stock.len() as u32,
                    });
                }

                let total = event
                    .wholesale_price
                    .checked_mul(quantity)
                    .ok_or(MarketError::AmountOutOfRange)?;
                ensure_funds(&reseller, total)?;

                let organizer = self.user_by_wallet(&event.creator).await?;
                let tx_hash = TxHash::generate();
                let mut changes = ChangeSet::new();
                let entries = stock
                    .into_iter()
                    .map(|ticket| {
                        stage_transfer(
                            &mut changes,
                            ticket,
                            &organizer,
                            &reseller,
                            event.wholesale_price,
                            TransactionKind::Wholesale,
                            &tx_hash,
                        )
                    })
                    .collect::<Vec<_>>();
                Ok((
                    changes,
                    Receipt {
                        tx_hash,
                        entries,
                        total,
                    },
                ))
            })
            .await?;

        metrics::counter!("marketplace_wholesale_tickets_total").increment(quantity as u64);
        tracing::info!(%event_id, quantity, tx_hash = %receipt.tx_hash, total = %receipt.total, "wholesale batch acquired");
        Ok(receipt)
    }

    /// Buys every line in the user's cart in one commit and empties the cart.
    ///
    /// Each line must still be fillable from its seller at its price;
    /// otherwise nothing is bought and [`MarketError::StockChanged`] names
    /// the event.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<Receipt> {
        let start = Instant::now();

        let receipt = self
            .commit_with_retry("checkout", move || async move {
                let lines = self.store().list_cart(user_id).await?;
                if lines.is_empty() {
                    return Err(MarketError::EmptyCart);
                }
                let buyer = self.user(user_id).await?;

                // Lines that share a seller, event and price draw from the
                // same tickets; each ticket is sold once.
                let mut taken: HashSet<TicketId> = HashSet::new();
                let mut batches = Vec::with_capacity(lines.len());
                for line in &lines {
                    if line.reseller == buyer.wallet {
                        return Err(MarketError::SelfPurchase);
                    }
                    let offered: Vec<Ticket> = self
                        .store()
                        .list_tickets(
                            TicketQuery::owned_by(line.reseller.clone())
                                .event(line.event_id)
                                .for_sale()
                                .price(line.unit_price)
                                .limit(line.quantity as usize + taken.len()),
                        )
                        .await?
                        .into_iter()
                        .filter(|ticket| !taken.contains(&ticket.id))
                        .take(line.quantity as usize)
                        .collect();
                    if offered.len() < line.quantity as usize {
                        let event = self.event(line.event_id).await?;
                        return Err(MarketError::StockChanged {
                            event: event.name,
                            requested: line.quantity,
                            available: offered.len() as u32,
                        });
                    }
                    taken.extend(offered.iter().map(|ticket| ticket.id));
                    let seller = self.user_by_wallet(&line.reseller).await?;
                    batches.push((seller, line.unit_price, offered));
                }

                let total = lines
                    .iter()
                    .try_fold(Money::zero(), |acc, line| {
                        line.subtotal().and_then(|subtotal| acc.checked_add(subtotal))
                    })
                    .ok_or(MarketError::AmountOutOfRange)?;
                ensure_funds(&buyer, total)?;

                let tx_hash = TxHash::generate();
                let mut changes = ChangeSet::new();
                let mut entries = Vec::new();
                for (seller, price, tickets) in batches {
                    for ticket in tickets {
                        entries.push(stage_transfer(
                            &mut changes,
                            ticket,
                            &seller,
                            &buyer,
                            price,
                            TransactionKind::Purchase,
                            &tx_hash,
                        ));
                    }
                }
                changes.clear_cart(user_id);

                Ok((
                    changes,
                    Receipt {
                        tx_hash,
                        entries,
                        total,
                    },
                ))
            })
            .await?;

        metrics::histogram!("marketplace_checkout_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        metrics::counter!("marketplace_purchases_total", "outcome" => "completed")
            .increment(receipt.ticket_count() as u64);
        tracing::info!(tx_hash = %receipt.tx_hash, tickets = receipt.ticket_count(), total = %receipt.total, "checkout completed");
        Ok(receipt)
    }
}
