//! Password hashing with Argon2id.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{MarketError, Result};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 4;

/// Hashes a password into a PHC string with a fresh salt.
///
/// Argon2 is CPU-bound, so the work runs on the blocking thread pool.
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| MarketError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| MarketError::Hashing(format!("hashing task failed: {e}")))?
}

/// Checks a password against a stored PHC string.
///
/// A malformed stored hash never verifies.
pub async fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let password = password.to_owned();
    let stored = stored.to_owned();
    tokio::task::spawn_blocking(move || {
        PasswordHash::new(&stored)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await
    .map_err(|e| MarketError::Hashing(format!("verification task failed: {e}")))
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(MarketError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<()> {
    let length_ok = (3..=100).contains(&username.chars().count());
    let charset_ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if length_ok && charset_ok {
        Ok(())
    } else {
        Err(MarketError::InvalidUsername)
    }
}
