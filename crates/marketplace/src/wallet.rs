//! Moving money between the bank and user wallets.

use common::{Money, Party, Role, Transaction, TransactionKind, TxHash, UserId};
use market_store::{ChangeSet, MarketStore};

use crate::error::{MarketError, Result};
use crate::service::Marketplace;

/// Largest amount one top-up or withdrawal may move.
pub const MAX_TRANSFER: Money = Money::from_units(10_000_000);

fn check_amount(amount: Money) -> Result<()> {
    if !amount.is_positive() {
        return Err(MarketError::InvalidAmount);
    }
    if amount > MAX_TRANSFER {
        return Err(MarketError::AmountOutOfRange);
    }
    Ok(())
}

impl<S: MarketStore> Marketplace<S> {
    /// Credits a wallet from the bank.
    #[tracing::instrument(skip(self))]
    pub async fn top_up(&self, user_id: UserId, amount: Money) -> Result<Transaction> {
        check_amount(amount)?;

        let entry = self
            .commit_with_retry("top_up", move || async move {
                let user = self.user(user_id).await?;
                if user.balance.checked_add(amount).is_none() {
                    return Err(MarketError::AmountOutOfRange);
                }
                let entry = Transaction::new(
                    TxHash::generate(),
                    TransactionKind::TopUp,
                    Party::Bank,
                    user.wallet,
                    amount,
                );

                let mut changes = ChangeSet::new();
                changes.credit(user_id, amount).record(entry.clone());
                Ok::<_, MarketError>((changes, entry))
            })
            .await?;

        metrics::counter!("marketplace_wallet_volume_cents_total", "direction" => "in")
            .increment(amount.cents().unsigned_abs());
        tracing::info!(%user_id, %amount, "wallet topped up");
        Ok(entry)
    }

    /// Pays an organizer's earnings out to the bank.
    #[tracing::instrument(skip(self))]
    pub async fn withdraw(&self, user_id: UserId, amount: Money) -> Result<Transaction> {
        check_amount(amount)?;

        let entry = self
            .commit_with_retry("withdraw", move || async move {
                let user = self.user(user_id).await?;
                if user.role != Role::Organizer {
                    return Err(MarketError::PermissionDenied(
                        "only organizers can withdraw".to_string(),
                    ));
                }
                if user.balance < amount {
                    return Err(MarketError::InsufficientFunds {
                        needed: amount,
                        available: user.balance,
                    });
                }

                let entry = Transaction::new(
                    TxHash::generate(),
                    TransactionKind::Withdraw,
                    user.wallet,
                    Party::Bank,
                    amount,
                );
                let mut changes = ChangeSet::new();
                changes.debit(user_id, amount).record(entry.clone());
                Ok((changes, entry))
            })
            .await?;

        metrics::counter!("marketplace_wallet_volume_cents_total", "direction" => "out")
            .increment(amount.cents().unsigned_abs());
        tracing::info!(%user_id, %amount, "funds withdrawn");
        Ok(entry)
    }
}
