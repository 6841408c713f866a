//! JWT Token Generation and Verification
//!
//! HS256 signing of access and refresh tokens with the configured shared
//! secret, and signature verification of presented tokens.

use chrono::{DateTime, Months, TimeDelta, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;

use crate::auth::claims::{AccessClaims, RawClaims, RefreshClaims};
use crate::configuration::JwtSettings;
use crate::domain::Identity;
use crate::error::{AppError, AuthError, UpstreamError};

/// Refresh tokens are invalidated by rotation, not by time.
const REFRESH_TOKEN_LIFETIME_MONTHS: u32 = 12 * 1000;

fn sign<T: Serialize>(
    operation: &'static str,
    claims: &T,
    config: &JwtSettings,
) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.signing_key.as_bytes()),
    )
    .map_err(|e| AppError::upstream(operation, UpstreamError::Signing(e.to_string())))
}

/// Generate an access token for `identity`.
///
/// Returns the token and its expiry, `now + access_token_expiry_minutes`
/// truncated to whole seconds (the resolution of the `exp` claim).
pub fn generate_access_token(
    identity: &impl Identity,
    now: DateTime<Utc>,
    config: &JwtSettings,
) -> Result<(String, DateTime<Utc>), AppError> {
    let exp = TimeDelta::try_minutes(config.access_token_expiry_minutes)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            AppError::Internal(format!(
                "access token expiry out of range: {} minutes",
                config.access_token_expiry_minutes
            ))
        })?
        .timestamp();
    let expires_at = Utc
        .timestamp_opt(exp, 0)
        .single()
        .ok_or_else(|| AppError::Internal(format!("access token expiry out of range: {exp}")))?;

    let claims = AccessClaims::new(identity.id(), identity.username(), exp);
    let token = sign("sign_access_token", &claims, config)?;
    Ok((token, expires_at))
}

/// Generate a refresh token for `identity`, valid for 1000 years.
pub fn generate_refresh_token(
    identity: &impl Identity,
    now: DateTime<Utc>,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let exp = now
        .checked_add_months(Months::new(REFRESH_TOKEN_LIFETIME_MONTHS))
        .ok_or_else(|| AppError::Internal("refresh token expiry out of range".to_string()))?
        .timestamp();

    let claims = RefreshClaims::new(identity.id(), exp);
    sign("sign_refresh_token", &claims, config)
}

/// Verify a token's HS256 signature and expiry and return its claims.
///
/// # Errors
/// `AuthError::InvalidToken` for anything malformed, tampered with,
/// signed with another key or past its `exp`.
pub fn decode_claims(token: &str, config: &JwtSettings) -> Result<RawClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp"]);

    decode::<RawClaims>(
        token,
        &DecodingKey::from_secret(config.signing_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!(error = %e, "JWT verification failed");
        AuthError::InvalidToken.into()
    })
}
