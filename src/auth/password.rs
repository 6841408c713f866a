//! Password Hashing and Verification
//!
//! bcrypt hashing for seeding records, and the constant-time comparison
//! used by the authenticator.

use bcrypt::{hash, verify};

use crate::error::{AppError, UpstreamError};

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if bcrypt rejects the cost or the input
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost)
        .map_err(|e| AppError::upstream("hash_password", UpstreamError::Hashing(e.to_string())))
}

/// Verify a password against its bcrypt hash
///
/// A malformed stored hash counts as a mismatch; it is logged rather than
/// surfaced so that callers only ever see "match" or "no match".
pub fn verify_password(password: &str, hash: &str) -> bool {
    match verify(password, hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be verified");
            false
        }
    }
}
