//! Entity records shared by the store, the domain services and the views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CartItemId, EventId, Money, Party, TicketId, TransactionId, TxHash, UserId, WalletAddress};

/// Error returned when a stored enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Account role. Determines which operations a user may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Organizer,
    Reseller,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Organizer => "organizer",
            Role::Reseller => "reseller",
            Role::Customer => "customer",
        }
    }

    /// Returns true if a user with this role may create staff with `target`.
    ///
    /// Admins create organizers; organizers create resellers.
    pub fn can_create(&self, target: Role) -> bool {
        matches!(
            (self, target),
            (Role::Admin, Role::Organizer) | (Role::Organizer, Role::Reseller)
        )
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "organizer" => Ok(Role::Organizer),
            "reseller" => Ok(Role::Reseller),
            "customer" => Ok(Role::Customer),
            other => Err(UnknownVariant {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// A user account with its wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub wallet: WalletAddress,
    pub balance: Money,
    pub role: Role,
    /// Wallet of the staff member that created this account.
    pub parent: Option<WalletAddress>,
    pub active: bool,
    /// Optimistic concurrency version of the profile fields.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates an active account with an empty wallet.
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
        parent: Option<WalletAddress>,
    ) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            password_hash: password_hash.into(),
            wallet: WalletAddress::generate(),
            balance: Money::zero(),
            role,
            parent,
            active: true,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Returns true if this user may deactivate or delete `target`.
    ///
    /// Admins manage organizers; organizers manage the resellers they created.
    pub fn can_manage(&self, target: &User) -> bool {
        match (self.role, target.role) {
            (Role::Admin, Role::Organizer) => true,
            (Role::Organizer, Role::Reseller) => target.parent.as_ref() == Some(&self.wallet),
            _ => false,
        }
    }
}

/// An issued event whose tickets are traded on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub creator: WalletAddress,
    pub name: String,
    pub symbol: String,
    pub date: String,
    pub wholesale_price: Money,
    pub max_resale_price: Money,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a ticket.
///
/// ```text
/// Available ──purchase──► Sold ──list──► Listed ──purchase──► Sold ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Primary stock held by the issuer, for sale at the wholesale price.
    Available,
    /// Listed for resale by its holder.
    Listed,
    /// Held by its owner and not for sale.
    Sold,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Available => "available",
            TicketStatus::Listed => "listed",
            TicketStatus::Sold => "sold",
        }
    }

    pub fn is_for_sale(&self) -> bool {
        matches!(self, TicketStatus::Available | TicketStatus::Listed)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(TicketStatus::Available),
            "listed" => Ok(TicketStatus::Listed),
            "sold" => Ok(TicketStatus::Sold),
            other => Err(UnknownVariant {
                kind: "ticket status",
                value: other.to_string(),
            }),
        }
    }
}

/// A single ticket. `price` is set exactly when the ticket is for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub event_id: EventId,
    /// Position within the event's minted supply, starting at 1.
    pub serial: u32,
    pub owner: WalletAddress,
    pub status: TicketStatus,
    pub price: Option<Money>,
    pub version: i64,
}

impl Ticket {
    /// Mints a ticket held by the issuer and offered at `price`.
    pub fn mint(event_id: EventId, serial: u32, owner: WalletAddress, price: Money) -> Self {
        Self {
            id: TicketId::new(),
            event_id,
            serial,
            owner,
            status: TicketStatus::Available,
            price: Some(price),
            version: 0,
        }
    }

    /// Returns the price a buyer pays, if the ticket is for sale.
    pub fn asking_price(&self) -> Option<Money> {
        if self.status.is_for_sale() {
            self.price
        } else {
            None
        }
    }

    /// Offers the ticket for resale at `price`.
    pub fn list_at(&mut self, price: Money) {
        self.status = TicketStatus::Listed;
        self.price = Some(price);
    }

    /// Hands the ticket to a new owner, taking it off the market.
    pub fn transfer_to(&mut self, owner: WalletAddress) {
        self.owner = owner;
        self.status = TicketStatus::Sold;
        self.price = None;
    }
}

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Mint,
    TopUp,
    Purchase,
    Wholesale,
    Withdraw,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Mint => "MINT",
            TransactionKind::TopUp => "TOPUP",
            TransactionKind::Purchase => "PURCHASE",
            TransactionKind::Wholesale => "WHOLESALE",
            TransactionKind::Withdraw => "WITHDRAW",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MINT" => Ok(TransactionKind::Mint),
            "TOPUP" => Ok(TransactionKind::TopUp),
            "PURCHASE" => Ok(TransactionKind::Purchase),
            "WHOLESALE" => Ok(TransactionKind::Wholesale),
            "WITHDRAW" => Ok(TransactionKind::Withdraw),
            other => Err(UnknownVariant {
                kind: "transaction kind",
                value: other.to_string(),
            }),
        }
    }
}

/// An immutable ledger entry.
///
/// For ticket transfers `from` is the previous owner and `to` the new one;
/// the amount moves in the opposite direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub tx_hash: TxHash,
    pub ticket_id: Option<TicketId>,
    /// Human readable label, usually the event name.
    pub memo: Option<String>,
    pub from: Party,
    pub to: Party,
    pub amount: Money,
    pub kind: TransactionKind,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        tx_hash: TxHash,
        kind: TransactionKind,
        from: impl Into<Party>,
        to: impl Into<Party>,
        amount: Money,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            tx_hash,
            ticket_id: None,
            memo: None,
            from: from.into(),
            to: to.into(),
            amount,
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn for_ticket(mut self, ticket_id: TicketId) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Returns true if `address` sent or received this entry.
    pub fn involves(&self, address: &WalletAddress) -> bool {
        self.from.is_wallet(address) || self.to.is_wallet(address)
    }
}

/// A line in a user's shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub reseller: WalletAddress,
    pub quantity: u32,
    pub unit_price: Money,
    pub version: i64,
}

impl CartItem {
    /// Starts a new line at version 1.
    pub fn new(
        user_id: UserId,
        event_id: EventId,
        reseller: WalletAddress,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            id: CartItemId::new(),
            user_id,
            event_id,
            reseller,
            quantity,
            unit_price,
            version: 1,
        }
    }

    /// Price times quantity, or `None` if it does not fit in [`Money`].
    pub fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }

    /// Returns true if `other` is for the same event, seller and price.
    pub fn same_line(&self, other: &CartItem) -> bool {
        self.user_id == other.user_id
            && self.event_id == other.event_id
            && self.reseller == other.reseller
            && self.unit_price == other.unit_price
    }
}
