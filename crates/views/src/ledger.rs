//! Public ledger and per-wallet history.

use common::{Money, Transaction, WalletAddress};
use market_store::{LedgerQuery, MarketStore};
use serde::Serialize;

use crate::error::Result;
use crate::service::MarketViews;

/// Number of entries shown on the public ledger.
pub const PUBLIC_LEDGER_SIZE: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct WalletHistory {
    pub wallet: WalletAddress,
    pub balance: Money,
    /// Newest first.
    pub entries: Vec<Transaction>,
}

impl<S: MarketStore> MarketViews<S> {
    /// The most recent ledger entries across all wallets.
    #[tracing::instrument(skip(self))]
    pub async fn public_ledger(&self) -> Result<Vec<Transaction>> {
        Ok(self
            .store()
            .list_transactions(LedgerQuery::latest(PUBLIC_LEDGER_SIZE))
            .await?)
    }

    /// Every entry a wallet sent or received.
    #[tracing::instrument(skip(self))]
    pub async fn wallet_history(&self, wallet: &WalletAddress) -> Result<WalletHistory> {
        let owner = self.user_by_wallet(wallet).await?;
        let entries = self
            .store()
            .list_transactions(LedgerQuery::new().involving(wallet.clone()))
            .await?;

        Ok(WalletHistory {
            wallet: owner.wallet,
            balance: owner.balance,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use common::{Party, TransactionKind};
    use market_store::InMemoryMarketStore;
    use marketplace::Marketplace;

    use super::*;

    #[tokio::test]
    async fn public_ledger_is_capped_and_newest_first() {
        let store = InMemoryMarketStore::new();
        let market = Marketplace::new(store.clone());
        let views = MarketViews::new(store);
        let user = market.register("alice", "alicepw").await.unwrap();

        for cents in 1..=(PUBLIC_LEDGER_SIZE as i64 + 5) {
            market.top_up(user.id, Money::from_cents(cents)).await.unwrap();
        }

        let ledger = views.public_ledger().await.unwrap();
        assert_eq!(ledger.len(), PUBLIC_LEDGER_SIZE);
        assert_eq!(ledger[0].amount, Money::from_cents(PUBLIC_LEDGER_SIZE as i64 + 5));
    }

    #[tokio::test]
    async fn wallet_history_only_includes_own_entries() {
        let store = InMemoryMarketStore::new();
        let market = Marketplace::new(store.clone());
        let views = MarketViews::new(store);
        let alice = market.register("alice", "alicepw").await.unwrap();
        let bob = market.register("bob", "bobpass").await.unwrap();
        market.top_up(alice.id, Money::from_units(5)).await.unwrap();
        market.top_up(bob.id, Money::from_units(7)).await.unwrap();

        let history = views.wallet_history(&alice.wallet).await.unwrap();
        assert_eq!(history.balance, Money::from_units(5));
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.entries[0].from, Party::Bank);
        assert_eq!(history.entries[0].kind, TransactionKind::TopUp);
    }
}
