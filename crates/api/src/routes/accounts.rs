//! Registration, login and staff management endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Role, User, UserId};
use market_store::MarketStore;
use marketplace::NewStaff;
use serde::{Deserialize, Serialize};

use super::parse_param;
use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

// -- Request types --

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateStaffRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

// -- Response types --

#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

// -- Handlers --

/// POST /register: create a customer account and start a session.
#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn register<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let user = state.market.register(&req.username, &req.password).await?;
    let token = state.sessions.issue(user.id).await;
    Ok((StatusCode::CREATED, Json(SessionResponse { token, user })))
}

/// POST /login: exchange credentials for a bearer token.
#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn login<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = state
        .market
        .authenticate(&req.username, &req.password)
        .await?;
    let token = state.sessions.issue(user.id).await;
    Ok(Json(SessionResponse { token, user }))
}

/// POST /logout: end the current session.
#[tracing::instrument(skip_all)]
pub async fn logout<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
) -> StatusCode {
    state.sessions.revoke(&current.token).await;
    StatusCode::NO_CONTENT
}

/// POST /account/password
#[tracing::instrument(skip_all, fields(user_id = %current.user.id))]
pub async fn change_password<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .market
        .change_password(current.user.id, &req.password)
        .await?;
    Ok(Json(user))
}

/// POST /staff: admins create organizers, organizers create resellers.
#[tracing::instrument(skip_all, fields(actor = %current.user.id, role = %req.role))]
pub async fn create_staff<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Json(req): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .market
        .create_staff(
            current.user.id,
            NewStaff::new(req.username, req.password, req.role),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /users/:id/toggle: enable or disable a managed account.
#[tracing::instrument(skip(state, current))]
pub async fn toggle_active<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let target_id: UserId = parse_param(&id, "user id")?;
    let user = state
        .market
        .toggle_active(current.user.id, target_id)
        .await?;
    if !user.active {
        state.sessions.revoke_user(user.id).await;
    }
    Ok(Json(user))
}

/// DELETE /users/:id
#[tracing::instrument(skip(state, current))]
pub async fn delete_user<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let target_id: UserId = parse_param(&id, "user id")?;
    state.market.delete_user(current.user.id, target_id).await?;
    state.sessions.revoke_user(target_id).await;
    Ok(StatusCode::NO_CONTENT)
}
