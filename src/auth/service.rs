//! Authentication service: login and refresh-token rotation.
//!
//! `login` runs the authenticator then the token issuer; `refresh` verifies
//! a presented refresh token against the stored hash and rotates it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::claims::TokenType;
use crate::auth::{jwt, password, refresh_token};
use crate::configuration::JwtSettings;
use crate::context::RequestContext;
use crate::domain::{Identity, UpdateUser, User};
use crate::error::{AppError, AuthError};
use crate::repository::UserRepository;
use crate::validators::{validate_password, validate_refresh_token, validate_username};

/// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        Ok(())
    }
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl RefreshRequest {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_refresh_token(&self.refresh_token)?;
        Ok(())
    }
}

/// Freshly issued credentials.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: String,
}

/// Wire shape of a successful login or refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// RFC 3339, whole seconds, UTC
    pub expires_at: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            expires_at: pair.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            refresh_token: pair.refresh_token,
        }
    }
}

/// Check a plaintext password against an identity.
///
/// The username must match the record exactly and the password must verify
/// against the stored hash. Only after both pass is the active flag
/// consulted, so `AccountInactive` never reveals an account to someone who
/// does not know its password.
pub fn verify_credentials(
    identity: &impl Identity,
    username: &str,
    plain_password: &str,
) -> Result<(), AuthError> {
    if identity.username() != username
        || !password::verify_password(plain_password, identity.password_hash())
    {
        return Err(AuthError::InvalidCredentials);
    }
    if !identity.is_active() {
        return Err(AuthError::AccountInactive);
    }
    Ok(())
}

/// Authentication service.
///
/// Generic over the identity store so the core has no dependency on a
/// particular database. Holds no mutable state of its own.
pub struct AuthService<R: UserRepository> {
    users: R,
    config: JwtSettings,
    /// Verified against when the username is unknown, so both rejection
    /// paths pay for one bcrypt comparison.
    decoy_hash: Option<String>,
}

impl<R: UserRepository> AuthService<R> {
    pub fn new(users: R, config: JwtSettings) -> Self {
        let decoy_secret = uuid::Uuid::new_v4().to_string();
        let decoy_hash = match password::hash_password(&decoy_secret, config.refresh_token_hash_cost) {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(error = %e, "Could not prepare decoy password hash");
                None
            }
        };
        Self {
            users,
            config,
            decoy_hash,
        }
    }

    pub fn users(&self) -> &R {
        &self.users
    }

    pub fn config(&self) -> &JwtSettings {
        &self.config
    }

    /// Authenticate with username + password and issue a token pair.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        req: &LoginRequest,
    ) -> Result<TokenPair, AppError> {
        req.validate()?;

        let user = self.authenticate(ctx, &req.username, &req.password).await?;
        let tokens = self.issue(ctx, &user).await?;

        tracing::info!(
            request_id = %ctx.request_id(),
            user_id = %user.id,
            "User logged in successfully"
        );
        Ok(tokens)
    }

    /// Resolve `username` and check `plain_password` against it.
    ///
    /// A store "not found" is translated to `InvalidCredentials` here and
    /// only here, so an unknown username is indistinguishable from a wrong
    /// password. Every other store failure propagates.
    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        username: &str,
        plain_password: &str,
    ) -> Result<User, AppError> {
        let user = match ctx
            .run("get_by_username", self.users.get_by_username(username))
            .await
        {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                if let Some(decoy) = &self.decoy_hash {
                    password::verify_password(plain_password, decoy);
                }
                tracing::warn!(request_id = %ctx.request_id(), "Login for unknown username");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = verify_credentials(&user, username, plain_password) {
            tracing::warn!(
                request_id = %ctx.request_id(),
                user_id = %user.id,
                error = %e,
                "Login rejected"
            );
            return Err(e.into());
        }
        Ok(user)
    }

    /// Issue a new token pair for `identity`, replacing any stored
    /// refresh-token hash unconditionally.
    pub async fn issue(
        &self,
        ctx: &RequestContext,
        identity: &impl Identity,
    ) -> Result<TokenPair, AppError> {
        self.issue_with_guard(ctx, identity, None).await
    }

    /// Sign both tokens, then persist the hash of the refresh token.
    ///
    /// With `expected` set, the store only accepts the new hash while the
    /// current one is still `expected`. Nothing is returned unless the
    /// store write succeeded: the stored hash is what makes a refresh token
    /// valid.
    async fn issue_with_guard(
        &self,
        ctx: &RequestContext,
        identity: &impl Identity,
        expected: Option<Option<String>>,
    ) -> Result<TokenPair, AppError> {
        ctx.ensure_active("issue_tokens")?;

        let now = Utc::now();
        let (access_token, expires_at) = jwt::generate_access_token(identity, now, &self.config)?;
        let refresh_token = jwt::generate_refresh_token(identity, now, &self.config)?;
        let refresh_hash =
            refresh_token::hash_refresh_token(&refresh_token, self.config.refresh_token_hash_cost)?;

        let mut update = UpdateUser::set_refresh_token_hash(refresh_hash);
        if let Some(current) = expected {
            update = update.expecting(current);
        }
        ctx.run(
            "update_refresh_token_hash",
            self.users.update(identity.id(), update),
        )
        .await?;

        Ok(TokenPair {
            access_token,
            expires_at,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// The presented token must carry a valid signature, be of type
    /// `refresh`, and match the hash stored for its identity. On success the
    /// stored hash is swapped for the new token's, so the presented token
    /// can never be used again.
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        req: &RefreshRequest,
    ) -> Result<TokenPair, AppError> {
        req.validate()?;

        let claims = jwt::decode_claims(&req.refresh_token, &self.config)?;
        if claims.token_type() != Some(TokenType::Refresh) {
            tracing::warn!(
                request_id = %ctx.request_id(),
                token_type = ?claims.str_claim("token_type"),
                "Non-refresh token presented for refresh"
            );
            return Err(AuthError::InvalidToken.into());
        }

        let user = ctx
            .run("get_by_id", self.users.get_by_id(claims.id()))
            .await?;

        let stored = user.refresh_token_hash.clone();
        if !refresh_token::refresh_token_matches(&req.refresh_token, stored.as_deref()) {
            tracing::warn!(
                request_id = %ctx.request_id(),
                user_id = %user.id,
                "Superseded or unknown refresh token presented"
            );
            return Err(AuthError::TokenExpiredOrInvalidated.into());
        }

        let tokens = match self.issue_with_guard(ctx, &user, Some(stored)).await {
            Ok(tokens) => tokens,
            // Another rotation committed between our read and our write.
            Err(e) if e.is_conflict() => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    user_id = %user.id,
                    "Refresh token rotated concurrently"
                );
                return Err(AuthError::TokenExpiredOrInvalidated.into());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            request_id = %ctx.request_id(),
            user_id = %user.id,
            "Token refreshed successfully"
        );
        Ok(tokens)
    }
}
