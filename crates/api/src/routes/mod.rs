//! HTTP route handlers.

pub mod accounts;
pub mod cart;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod ledger;
pub mod market;
pub mod metrics;
pub mod orders;
pub mod tickets;
pub mod wallet;

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path segment, naming the parameter in the error.
pub(crate) fn parse_param<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))
}
