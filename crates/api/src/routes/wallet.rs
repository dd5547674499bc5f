//! Wallet balance, top-up and withdrawal endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::{Money, Transaction};
use market_store::MarketStore;
use serde::Deserialize;
use views::WalletHistory;

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

#[derive(Deserialize)]
pub struct AmountRequest {
    pub amount_cents: i64,
}

/// GET /wallet: balance and every entry touching the wallet.
#[tracing::instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn history<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
) -> Result<Json<WalletHistory>, ApiError> {
    Ok(Json(state.views.wallet_history(&current.user.wallet).await?))
}

/// POST /wallet/top-up
#[tracing::instrument(skip_all, fields(user_id = %current.user.id, amount_cents = req.amount_cents))]
pub async fn top_up<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Json(req): Json<AmountRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let entry = state
        .market
        .top_up(current.user.id, Money::from_cents(req.amount_cents))
        .await?;
    Ok(Json(entry))
}

/// POST /wallet/withdraw: organizers cash out to the bank.
#[tracing::instrument(skip_all, fields(user_id = %current.user.id, amount_cents = req.amount_cents))]
pub async fn withdraw<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Json(req): Json<AmountRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let entry = state
        .market
        .withdraw(current.user.id, Money::from_cents(req.amount_cents))
        .await?;
    Ok(Json(entry))
}
