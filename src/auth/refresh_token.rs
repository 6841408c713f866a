//! Refresh Token Hashing
//!
//! Only a salted hash of the latest refresh token is stored on the user
//! record. The token is first reduced to its SHA-256 hex digest so the
//! bcrypt input stays under bcrypt's 72-byte limit regardless of how long
//! the JWT is; the digest is then hashed with a random bcrypt salt.

use sha2::{Digest, Sha256};

use crate::error::{AppError, UpstreamError};

fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Salted hash of a refresh token, suitable for storage.
pub fn hash_refresh_token(token: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(digest(token), cost).map_err(|e| {
        AppError::upstream("hash_refresh_token", UpstreamError::Hashing(e.to_string()))
    })
}

/// Whether `token` is the one `stored` was computed from.
///
/// No stored hash (the user never logged in) never matches.
pub fn refresh_token_matches(token: &str, stored: Option<&str>) -> bool {
    let Some(stored) = stored else {
        return false;
    };
    match bcrypt::verify(digest(token), stored) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!(error = %e, "Stored refresh token hash could not be verified");
            false
        }
    }
}
