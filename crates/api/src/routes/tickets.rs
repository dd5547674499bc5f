//! Ticket listing and trading endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{EventId, Money, Ticket, TicketId, Transaction};
use market_store::MarketStore;
use marketplace::Receipt;
use serde::Deserialize;

use super::parse_param;
use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

// -- Request types --

#[derive(Deserialize)]
pub struct ListTicketRequest {
    pub price_cents: i64,
}

#[derive(Deserialize)]
pub struct BulkListRequest {
    pub event_id: EventId,
    pub quantity: u32,
    pub price_cents: i64,
}

#[derive(Deserialize)]
pub struct BulkAcquireRequest {
    pub event_id: EventId,
    pub quantity: u32,
}

// -- Handlers --

/// GET /tickets/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket_id: TicketId = parse_param(&id, "ticket id")?;
    Ok(Json(state.market.ticket(ticket_id).await?))
}

/// POST /tickets/:id/list: offer a held ticket for resale.
#[tracing::instrument(skip(state, current, req), fields(price_cents = req.price_cents))]
pub async fn list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ListTicketRequest>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket_id: TicketId = parse_param(&id, "ticket id")?;
    let ticket = state
        .market
        .list_for_resale(ticket_id, current.user.id, Money::from_cents(req.price_cents))
        .await?;
    Ok(Json(ticket))
}

/// POST /tickets/:id/purchase
#[tracing::instrument(skip(state, current))]
pub async fn purchase<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let ticket_id: TicketId = parse_param(&id, "ticket id")?;
    Ok(Json(state.market.purchase(ticket_id, current.user.id).await?))
}

/// POST /tickets/bulk-list
#[tracing::instrument(skip_all, fields(event_id = %req.event_id, quantity = req.quantity))]
pub async fn bulk_list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Json(req): Json<BulkListRequest>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    let tickets = state
        .market
        .bulk_list(
            current.user.id,
            req.event_id,
            req.quantity,
            Money::from_cents(req.price_cents),
        )
        .await?;
    Ok(Json(tickets))
}

/// POST /tickets/bulk-acquire: a reseller buys wholesale from its organizer.
#[tracing::instrument(skip_all, fields(event_id = %req.event_id, quantity = req.quantity))]
pub async fn bulk_acquire<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Json(req): Json<BulkAcquireRequest>,
) -> Result<Json<Receipt>, ApiError> {
    let receipt = state
        .market
        .bulk_acquire(current.user.id, req.event_id, req.quantity)
        .await?;
    Ok(Json(receipt))
}
