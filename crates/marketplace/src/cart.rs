//! Shopping carts.

use common::{CartItem, CartItemId, Money, UserId};
use market_store::{ChangeSet, MarketStore, TicketQuery};
use serde::Serialize;

use crate::commands::AddToCart;
use crate::error::{MarketError, Result};
use crate::listing::MAX_BATCH;
use crate::service::Marketplace;

/// A cart line with the details needed to show it.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub event_name: String,
    pub subtotal: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
    pub total: Money,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl<S: MarketStore> Marketplace<S> {
    /// Adds tickets offered by a seller to the cart.
    ///
    /// A line for the same event, seller and price is topped up instead of
    /// duplicated. The seller must currently offer enough tickets.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(&self, user_id: UserId, cmd: AddToCart) -> Result<CartItem> {
        if !(1..=MAX_BATCH).contains(&cmd.quantity) {
            return Err(MarketError::InvalidQuantity { max: MAX_BATCH });
        }
        if !cmd.unit_price.is_positive() {
            return Err(MarketError::InvalidPrice);
        }

        let buyer = self.user(user_id).await?;
        if cmd.reseller == buyer.wallet {
            return Err(MarketError::SelfPurchase);
        }
        self.event(cmd.event_id).await?;
        self.user_by_wallet(&cmd.reseller).await?;

        let cmd = &cmd;
        let item = self
            .commit_with_retry("add_to_cart", move || async move {
                let existing = self
                    .store()
                    .list_cart(user_id)
                    .await?
                    .into_iter()
                    .find(|item| {
                        item.event_id == cmd.event_id
                            && item.reseller == cmd.reseller
                            && item.unit_price == cmd.unit_price
                    });

                let mut changes = ChangeSet::new();
                let item = match existing {
                    Some(line) => {
                        let quantity = line
                            .quantity
                            .checked_add(cmd.quantity)
                            .ok_or(MarketError::InvalidQuantity { max: MAX_BATCH })?;
                        changes.update_cart_item(CartItem {
                            quantity,
                            ..line.clone()
                        });
                        CartItem {
                            quantity,
                            version: line.version + 1,
                            ..line
                        }
                    }
                    None => {
                        let line = CartItem::new(
                            user_id,
                            cmd.event_id,
                            cmd.reseller.clone(),
                            cmd.quantity,
                            cmd.unit_price,
                        );
                        changes.insert_cart_item(line.clone());
                        line
                    }
                };

                let offered = self
                    .store()
                    .list_tickets(
                        TicketQuery::owned_by(cmd.reseller.clone())
                            .event(cmd.event_id)
                            .for_sale()
                            .price(cmd.unit_price)
                            .limit(item.quantity as usize),
                    )
                    .await?;
                if offered.len() < item.quantity as usize {
                    return Err(MarketError::InsufficientStock {
                        requested: item.quantity,
                        available: offered.len() as u32,
                    });
                }

                Ok((changes, item))
            })
            .await?;

        tracing::debug!(cart_item_id = %item.id, quantity = item.quantity, "cart updated");
        Ok(item)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_from_cart(&self, user_id: UserId, item_id: CartItemId) -> Result<()> {
        let lines = self.store().list_cart(user_id).await?;
        if !lines.iter().any(|item| item.id == item_id) {
            return Err(MarketError::CartItemNotFound(item_id));
        }

        let mut changes = ChangeSet::new();
        changes.remove_cart_item(user_id, item_id);
        self.store().commit(changes).await?;
        Ok(())
    }

    /// Loads a user's cart with subtotals and the grand total.
    #[tracing::instrument(skip(self))]
    pub async fn cart(&self, user_id: UserId) -> Result<Cart> {
        let items = self.store().list_cart(user_id).await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let event_name = match self.store().get_event(item.event_id).await? {
                Some(event) => event.name,
                None => item.event_id.to_string(),
            };
            lines.push(CartLine {
                subtotal: item.subtotal().ok_or(MarketError::AmountOutOfRange)?,
                item,
                event_name,
            });
        }

        let total = Money::checked_sum(lines.iter().map(|line| line.subtotal))
            .ok_or(MarketError::AmountOutOfRange)?;
        Ok(Cart { lines, total })
    }
}
