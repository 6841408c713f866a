//! Input validators - request shape checks run before any store access
//! Features:
//! 1. Required fields are present
//! 2. DoS Protection: Input length limits (bcrypt work and token parsing stay bounded)

use crate::error::ValidationError;

const MAX_USERNAME_LENGTH: usize = 256;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_TOKEN_LENGTH: usize = 4096;

fn require(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong(field, max));
    }
    Ok(())
}

/// Validates a username. Not trimmed or case-folded: lookups are exact.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    require("username", username, MAX_USERNAME_LENGTH)
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    require("password", password, MAX_PASSWORD_LENGTH)
}

pub fn validate_refresh_token(token: &str) -> Result<(), ValidationError> {
    require("refresh_token", token, MAX_TOKEN_LENGTH)
}
