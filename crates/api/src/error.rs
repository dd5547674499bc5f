//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use marketplace::MarketError;
use views::ViewError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing, unknown or revoked session.
    Unauthorized(String),
    /// Marketplace operation error.
    Market(MarketError),
    /// Read model error.
    View(ViewError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Market(err) => market_error_to_response(err),
            ApiError::View(err) => view_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn market_error_to_response(err: MarketError) -> (StatusCode, String) {
    let status = match &err {
        MarketError::UserNotFound(_)
        | MarketError::TicketNotFound(_)
        | MarketError::EventNotFound(_)
        | MarketError::CartItemNotFound(_) => StatusCode::NOT_FOUND,
        MarketError::InvalidUsername
        | MarketError::PasswordTooShort { .. }
        | MarketError::InvalidPrice
        | MarketError::PriceCapExceeded { .. }
        | MarketError::SelfPurchase
        | MarketError::EmptyCart
        | MarketError::InvalidQuantity { .. }
        | MarketError::InvalidAmount
        | MarketError::AmountOutOfRange
        | MarketError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
        MarketError::InvalidCredential => StatusCode::UNAUTHORIZED,
        MarketError::AccountDisabled
        | MarketError::NotOwner(_)
        | MarketError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        MarketError::DuplicateUser(_)
        | MarketError::NotAvailable(_)
        | MarketError::StockChanged { .. }
        | MarketError::ConstraintViolation(_)
        | MarketError::Contention => StatusCode::CONFLICT,
        MarketError::InsufficientFunds { .. } | MarketError::InsufficientStock { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MarketError::Hashing(_) | MarketError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn view_error_to_response(err: ViewError) -> (StatusCode, String) {
    match &err {
        ViewError::UserNotFound(_) | ViewError::EventNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        ViewError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        ApiError::Market(err)
    }
}

impl From<ViewError> for ApiError {
    fn from(err: ViewError) -> Self {
        ApiError::View(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, TicketId};

    use super::*;

    fn status_of(err: MarketError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn market_errors_map_to_statuses() {
        assert_eq!(
            status_of(MarketError::DuplicateUser("bob".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(MarketError::NotAvailable(TicketId::new())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(MarketError::InsufficientFunds {
                needed: Money::from_units(2),
                available: Money::from_units(1),
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(MarketError::PermissionDenied("no".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(MarketError::InvalidCredential),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(MarketError::TicketNotFound(TicketId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(MarketError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(MarketError::AmountOutOfRange),
            StatusCode::BAD_REQUEST
        );
    }
}
