//! Role dashboard endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use market_store::MarketStore;
use views::Dashboard;

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

/// GET /dashboard: the signed-in user's dashboard, shaped by role.
#[tracing::instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn get<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.views.dashboard(current.user.id).await?))
}
