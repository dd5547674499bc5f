use common::{EventId, Money, Role, TicketStatus, Transaction, TransactionKind, User, WalletAddress, Ticket};

/// Filter for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub parent: Option<WalletAddress>,
}

impl UserQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Only accounts created by the staff member owning `parent`.
    pub fn parent(mut self, parent: WalletAddress) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn matches(&self, user: &User) -> bool {
        if let Some(role) = self.role
            && user.role != role
        {
            return false;
        }
        if let Some(ref parent) = self.parent
            && user.parent.as_ref() != Some(parent)
        {
            return false;
        }
        true
    }
}

/// Builder for ticket queries.
///
/// Results are ordered by event, then by serial number.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    pub owner: Option<WalletAddress>,
    pub event_id: Option<EventId>,
    /// Any of these statuses.
    pub statuses: Option<Vec<TicketStatus>>,
    pub price: Option<Money>,
    pub limit: Option<usize>,
}

impl TicketQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owned_by(owner: WalletAddress) -> Self {
        Self {
            owner: Some(owner),
            ..Default::default()
        }
    }

    pub fn for_event(event_id: EventId) -> Self {
        Self {
            event_id: Some(event_id),
            ..Default::default()
        }
    }

    pub fn owner(mut self, owner: WalletAddress) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn event(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn status(mut self, status: TicketStatus) -> Self {
        self.statuses = Some(vec![status]);
        self
    }

    /// Tickets a buyer can purchase: primary stock and resale listings.
    pub fn for_sale(mut self) -> Self {
        self.statuses = Some(vec![TicketStatus::Available, TicketStatus::Listed]);
        self
    }

    /// Filters by asking price.
    pub fn price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(ref owner) = self.owner
            && &ticket.owner != owner
        {
            return false;
        }
        if let Some(event_id) = self.event_id
            && ticket.event_id != event_id
        {
            return false;
        }
        if let Some(ref statuses) = self.statuses
            && !statuses.contains(&ticket.status)
        {
            return false;
        }
        if let Some(price) = self.price
            && ticket.price != Some(price)
        {
            return false;
        }
        true
    }
}

/// Builder for ledger queries. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    /// Entries where this wallet is sender or receiver.
    pub involving: Option<WalletAddress>,
    /// Entries received by this wallet.
    pub received_by: Option<WalletAddress>,
    pub kind: Option<TransactionKind>,
    pub limit: Option<usize>,
}

impl LedgerQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent `limit` entries of the whole ledger.
    pub fn latest(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn involving(mut self, wallet: WalletAddress) -> Self {
        self.involving = Some(wallet);
        self
    }

    pub fn received_by(mut self, wallet: WalletAddress) -> Self {
        self.received_by = Some(wallet);
        self
    }

    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(ref wallet) = self.involving
            && !tx.involves(wallet)
        {
            return false;
        }
        if let Some(ref wallet) = self.received_by
            && !tx.to.is_wallet(wallet)
        {
            return false;
        }
        if let Some(kind) = self.kind
            && tx.kind != kind
        {
            return false;
        }
        true
    }
}
