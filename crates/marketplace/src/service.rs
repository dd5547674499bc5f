//! The marketplace service and its commit loop.

use common::{Event, EventId, Ticket, TicketId, User, UserId, WalletAddress};
use market_store::{ChangeSet, MarketStore};

use crate::error::{MarketError, Result};

/// How many times an operation is re-planned after losing a commit race.
pub const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Service for every state-changing marketplace operation.
///
/// Operations read current state from the store, validate it, and stage
/// their writes in a single [`ChangeSet`]. A commit rejected because a read
/// went stale is planned again from fresh reads, so validation always runs
/// against the state that is actually committed.
#[derive(Clone)]
pub struct Marketplace<S: MarketStore> {
    store: S,
}

impl<S: MarketStore> Marketplace<S> {
    /// Creates a new marketplace over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn user(&self, id: UserId) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| MarketError::UserNotFound(id.to_string()))
    }

    pub async fn user_by_wallet(&self, wallet: &WalletAddress) -> Result<User> {
        self.store
            .find_user_by_wallet(wallet)
            .await?
            .ok_or_else(|| MarketError::UserNotFound(wallet.to_string()))
    }

    pub async fn event(&self, id: EventId) -> Result<Event> {
        self.store
            .get_event(id)
            .await?
            .ok_or(MarketError::EventNotFound(id))
    }

    pub async fn ticket(&self, id: TicketId) -> Result<Ticket> {
        self.store
            .get_ticket(id)
            .await?
            .ok_or(MarketError::TicketNotFound(id))
    }

    /// Plans and commits an operation, re-planning on a lost race.
    ///
    /// `plan` reads whatever it needs, validates, and returns the staged
    /// changes together with the value to hand back once they are stored.
    pub(crate) async fn commit_with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut plan: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(ChangeSet, T)>>,
    {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let (changes, outcome) = plan().await?;
            match self.store.commit(changes).await {
                Ok(()) => return Ok(outcome),
                Err(e) if e.is_retryable() => {
                    metrics::counter!("marketplace_commit_conflicts_total", "operation" => operation)
                        .increment(1);
                    tracing::debug!(operation, attempt, error = %e, "commit lost a race, re-planning");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(operation, "giving up after repeated commit conflicts");
        Err(MarketError::Contention)
    }
}

/// Stages an updated ticket and returns it as it will read once committed.
pub(crate) fn stage_ticket(changes: &mut ChangeSet, ticket: Ticket) -> Ticket {
    let mut stored = ticket.clone();
    stored.version += 1;
    changes.update_ticket(ticket);
    stored
}

/// Stages an updated profile and returns it as it will read once committed.
pub(crate) fn stage_user(changes: &mut ChangeSet, user: User) -> User {
    let mut stored = user.clone();
    stored.version += 1;
    changes.update_user(user);
    stored
}
