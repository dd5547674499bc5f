//! Order history: purchases grouped by transaction hash.

use chrono::{DateTime, Utc};
use common::{Money, TransactionKind, TxHash, WalletAddress};
use market_store::{LedgerQuery, MarketStore};
use serde::Serialize;

use crate::error::Result;
use crate::service::{EventCache, MarketViews};

/// One checkout, wholesale batch or single purchase.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub tx_hash: TxHash,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
    /// Distinct event names, in first-seen order.
    pub events: Vec<String>,
    pub ticket_count: usize,
    pub total: Money,
}

impl<S: MarketStore> MarketViews<S> {
    /// Lists the tickets a wallet bought, newest order first.
    #[tracing::instrument(skip(self))]
    pub async fn orders(&self, wallet: &WalletAddress) -> Result<Vec<Order>> {
        let entries = self
            .store()
            .list_transactions(LedgerQuery::new().received_by(wallet.clone()))
            .await?;

        let mut cache = EventCache::new(self.store());
        let mut orders: Vec<Order> = Vec::new();
        for entry in entries {
            if !matches!(
                entry.kind,
                TransactionKind::Purchase | TransactionKind::Wholesale
            ) {
                continue;
            }

            let event_name = match entry.ticket_id {
                Some(ticket_id) => cache.event_of_ticket(ticket_id).await?.map(|e| e.name),
                None => None,
            };

            let index = match orders.iter().position(|o| o.tx_hash == entry.tx_hash) {
                Some(index) => index,
                None => {
                    orders.push(Order {
                        tx_hash: entry.tx_hash.clone(),
                        kind: entry.kind,
                        timestamp: entry.timestamp,
                        events: Vec::new(),
                        ticket_count: 0,
                        total: Money::zero(),
                    });
                    orders.len() - 1
                }
            };

            let order = &mut orders[index];
            order.ticket_count += 1;
            order.total += entry.amount;
            if let Some(name) = event_name
                && !order.events.contains(&name)
            {
                order.events.push(name);
            }
        }

        Ok(orders)
    }
}
