//! Command payloads for multi-field marketplace operations.

use common::{EventId, Money, Role, WalletAddress};

/// Command to issue an event and mint its tickets.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,

    /// Ticker-style symbol, stored upper-cased.
    pub symbol: String,

    /// Free-form date text shown to buyers.
    pub date: String,

    /// Price of every freshly minted ticket.
    pub wholesale_price: Money,

    /// Highest price any holder may list a ticket at.
    pub max_resale_price: Money,

    /// Number of tickets to mint.
    pub supply: u32,
}

impl NewEvent {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        date: impl Into<String>,
        wholesale_price: Money,
        max_resale_price: Money,
        supply: u32,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            date: date.into(),
            wholesale_price,
            max_resale_price,
            supply,
        }
    }
}

/// Command to create an organizer or reseller account.
#[derive(Clone)]
pub struct NewStaff {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl NewStaff {
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role,
        }
    }
}

impl std::fmt::Debug for NewStaff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewStaff")
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Command to put tickets offered by a seller into a cart.
#[derive(Debug, Clone)]
pub struct AddToCart {
    pub event_id: EventId,

    /// Wallet of the account offering the tickets.
    pub reseller: WalletAddress,

    pub unit_price: Money,
    pub quantity: u32,
}

impl AddToCart {
    pub fn new(event_id: EventId, reseller: WalletAddress, unit_price: Money, quantity: u32) -> Self {
        Self {
            event_id,
            reseller,
            unit_price,
            quantity,
        }
    }
}
