//! Order history endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use market_store::MarketStore;
use views::Order;

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

/// GET /orders: the signed-in user's purchases, newest first.
#[tracing::instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.views.orders(&current.user.wallet).await?))
}
