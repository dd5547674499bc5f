//! Event creation and ticket minting.

use common::{
    Event, EventId, Money, Party, Role, Ticket, Transaction, TransactionKind, TxHash, UserId,
};
use market_store::{ChangeSet, MarketStore};

use crate::commands::NewEvent;
use crate::error::{MarketError, Result};
use crate::service::Marketplace;

/// Largest number of tickets one event may mint.
pub const MAX_SUPPLY: u32 = 10_000;

/// Highest wholesale price or resale cap an event may set.
pub const MAX_TICKET_PRICE: Money = Money::from_units(1_000_000);

const MAX_NAME_LEN: usize = 150;
const MAX_SYMBOL_LEN: usize = 10;
const MAX_DATE_LEN: usize = 50;

impl<S: MarketStore> Marketplace<S> {
    /// Issues an event and mints its whole supply to the organizer.
    ///
    /// Every ticket starts `available` at the wholesale price. One `MINT`
    /// ledger entry from `SYSTEM` records the issuance.
    #[tracing::instrument(skip(self))]
    pub async fn create_event(&self, organizer_id: UserId, cmd: NewEvent) -> Result<Event> {
        let organizer = self.user(organizer_id).await?;
        if organizer.role != Role::Organizer {
            return Err(MarketError::PermissionDenied(
                "only organizers can issue events".to_string(),
            ));
        }

        let (name, symbol) = validate_event(&cmd)?;
        let event = Event {
            id: EventId::new(),
            creator: organizer.wallet.clone(),
            name,
            symbol,
            date: cmd.date.trim().to_string(),
            wholesale_price: cmd.wholesale_price,
            max_resale_price: cmd.max_resale_price,
            created_at: chrono::Utc::now(),
        };

        let tickets = (1..=cmd.supply).map(|serial| {
            Ticket::mint(
                event.id,
                serial,
                organizer.wallet.clone(),
                event.wholesale_price,
            )
        });
        let mint = Transaction::new(
            TxHash::generate(),
            TransactionKind::Mint,
            Party::System,
            organizer.wallet.clone(),
            Money::zero(),
        )
        .with_memo(format!("MINT {}x {}", cmd.supply, event.symbol));

        let mut changes = ChangeSet::new();
        changes
            .insert_event(event.clone())
            .insert_tickets(tickets)
            .record(mint);
        self.store().commit(changes).await?;

        metrics::counter!("marketplace_events_created_total").increment(1);
        metrics::counter!("marketplace_tickets_minted_total").increment(u64::from(cmd.supply));
        tracing::info!(event_id = %event.id, symbol = %event.symbol, supply = cmd.supply, "event issued");
        Ok(event)
    }
}

/// Returns the trimmed name and normalised symbol.
fn validate_event(cmd: &NewEvent) -> Result<(String, String)> {
    let name = cmd.name.trim();
    if name.is_empty() {
        return Err(MarketError::InvalidEvent("name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(MarketError::InvalidEvent(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if cmd.date.chars().count() > MAX_DATE_LEN {
        return Err(MarketError::InvalidEvent(format!(
            "date must be at most {MAX_DATE_LEN} characters"
        )));
    }

    let symbol = cmd.symbol.trim().to_uppercase();
    if symbol.is_empty()
        || symbol.chars().count() > MAX_SYMBOL_LEN
        || !symbol.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(MarketError::InvalidEvent(format!(
            "symbol must be 1 to {MAX_SYMBOL_LEN} letters or digits"
        )));
    }

    if !cmd.wholesale_price.is_positive() {
        return Err(MarketError::InvalidPrice);
    }
    if cmd.max_resale_price < cmd.wholesale_price {
        return Err(MarketError::InvalidEvent(
            "resale cap cannot be below the wholesale price".to_string(),
        ));
    }
    if cmd.max_resale_price > MAX_TICKET_PRICE {
        return Err(MarketError::AmountOutOfRange);
    }
    if !(1..=MAX_SUPPLY).contains(&cmd.supply) {
        return Err(MarketError::InvalidQuantity { max: MAX_SUPPLY });
    }

    Ok((name.to_string(), symbol))
}
