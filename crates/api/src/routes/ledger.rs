//! Public ledger endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use common::Transaction;
use market_store::MarketStore;

use crate::AppState;
use crate::error::ApiError;

/// GET /ledger: the most recent entries across all wallets.
#[tracing::instrument(skip(state))]
pub async fn public<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.views.public_ledger().await?))
}
