//! Shopping cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CartItem, CartItemId, EventId, Money, WalletAddress};
use market_store::MarketStore;
use marketplace::{AddToCart, Cart, Receipt};
use serde::Deserialize;

use super::parse_param;
use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub event_id: EventId,
    /// Wallet of the seller offering the tickets.
    pub seller: WalletAddress,
    pub unit_price_cents: i64,
    pub quantity: u32,
}

/// GET /cart
#[tracing::instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn get<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.market.cart(current.user.id).await?))
}

/// POST /cart
#[tracing::instrument(skip_all, fields(user_id = %current.user.id, event_id = %req.event_id))]
pub async fn add<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartItem>), ApiError> {
    let cmd = AddToCart::new(
        req.event_id,
        req.seller,
        Money::from_cents(req.unit_price_cents),
        req.quantity,
    );
    let item = state.market.add_to_cart(current.user.id, cmd).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /cart/:id
#[tracing::instrument(skip(state, current))]
pub async fn remove<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let item_id: CartItemId = parse_param(&id, "cart item id")?;
    state.market.remove_from_cart(current.user.id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/checkout: buy every line in one transaction.
#[tracing::instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn checkout<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
) -> Result<Json<Receipt>, ApiError> {
    Ok(Json(state.market.checkout(current.user.id).await?))
}
