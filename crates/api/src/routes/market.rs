//! Seller storefront endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::WalletAddress;
use market_store::MarketStore;
use views::Storefront;

use super::parse_param;
use crate::AppState;
use crate::error::ApiError;

/// GET /market/:wallet: what a seller currently offers.
#[tracing::instrument(skip(state))]
pub async fn storefront<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(wallet): Path<String>,
) -> Result<Json<Storefront>, ApiError> {
    let wallet: WalletAddress = parse_param(&wallet, "wallet address")?;
    Ok(Json(state.views.storefront(&wallet).await?))
}
