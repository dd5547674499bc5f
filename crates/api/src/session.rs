//! Bearer-token sessions.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::{User, UserId};
use market_store::MarketStore;
use marketplace::MarketError;
use rand::RngCore;
use tokio::sync::RwLock;

use crate::AppState;
use crate::error::ApiError;

const TOKEN_BYTES: usize = 32;

/// Maps opaque tokens to the account they were issued for.
///
/// Sessions live in process memory and do not survive a restart.
#[derive(Debug, Default)]
pub struct SessionStore {
    tokens: RwLock<HashMap<String, UserId>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh token for a user.
    pub async fn issue(&self, user_id: UserId) -> String {
        let token = generate_token();
        self.tokens.write().await.insert(token.clone(), user_id);
        metrics::gauge!("api_active_sessions").increment(1.0);
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.read().await.get(token).copied()
    }

    /// Returns `false` if the token was not active.
    pub async fn revoke(&self, token: &str) -> bool {
        let removed = self.tokens.write().await.remove(token).is_some();
        if removed {
            metrics::gauge!("api_active_sessions").decrement(1.0);
        }
        removed
    }

    /// Ends every session of a user.
    pub async fn revoke_user(&self, user_id: UserId) {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, owner| *owner != user_id);
        let removed = before - tokens.len();
        if removed > 0 {
            metrics::gauge!("api_active_sessions").decrement(removed as f64);
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The active account behind the request's bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl<S> FromRequestParts<Arc<AppState<S>>> for CurrentUser
where
    S: MarketStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?
            .to_string();

        let user_id = state
            .sessions
            .resolve(&token)
            .await
            .ok_or_else(|| ApiError::Unauthorized("Unknown or expired session".to_string()))?;

        let user = match state.market.user(user_id).await {
            Ok(user) => user,
            Err(MarketError::UserNotFound(_)) => {
                state.sessions.revoke(&token).await;
                return Err(ApiError::Unauthorized("Account no longer exists".to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        if !user.active {
            state.sessions.revoke_user(user.id).await;
            return Err(ApiError::Unauthorized("Account is disabled".to_string()));
        }

        Ok(CurrentUser { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_tokens_resolve_until_revoked() {
        let sessions = SessionStore::new();
        let user_id = UserId::new();

        let first = sessions.issue(user_id).await;
        let second = sessions.issue(user_id).await;
        assert_ne!(first, second);
        assert_eq!(sessions.resolve(&first).await, Some(user_id));

        assert!(sessions.revoke(&first).await);
        assert!(!sessions.revoke(&first).await);
        assert_eq!(sessions.resolve(&first).await, None);

        sessions.revoke_user(user_id).await;
        assert_eq!(sessions.resolve(&second).await, None);
    }

    #[test]
    fn tokens_are_url_safe() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
