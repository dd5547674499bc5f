//! Event catalog and issuance endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Event, EventId, Money, Ticket};
use market_store::MarketStore;
use marketplace::NewEvent;
use serde::Deserialize;
use views::{CatalogEntry, EventDetail};

use super::parse_param;
use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub symbol: String,
    pub date: String,
    pub wholesale_price_cents: i64,
    pub max_resale_price_cents: i64,
    pub supply: u32,
}

/// GET /events: every event with its current offer.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<CatalogEntry>>, ApiError> {
    Ok(Json(state.views.catalog().await?))
}

/// POST /events: issue an event and mint its tickets.
#[tracing::instrument(skip_all, fields(organizer = %current.user.id, symbol = %req.symbol))]
pub async fn create<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let cmd = NewEvent::new(
        req.name,
        req.symbol,
        req.date,
        Money::from_cents(req.wholesale_price_cents),
        Money::from_cents(req.max_resale_price_cents),
        req.supply,
    );
    let event = state.market.create_event(current.user.id, cmd).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /events/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<EventDetail>, ApiError> {
    let event_id: EventId = parse_param(&id, "event id")?;
    Ok(Json(state.views.event_detail(event_id).await?))
}

/// GET /events/:id/tickets: tickets that can be bought right now.
#[tracing::instrument(skip(state))]
pub async fn tickets<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let event_id: EventId = parse_param(&id, "event id")?;
    Ok(Json(state.views.tickets_on_offer(event_id).await?))
}
