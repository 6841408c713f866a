//! JWT Claims
//!
//! Typed claim sets used when signing, and a loosely-typed view used when
//! reading a presented token back.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminates access tokens from refresh tokens (`token_type` claim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }

    pub fn from_claim(value: &str) -> Option<Self> {
        match value {
            "access" => Some(TokenType::Access),
            "refresh" => Some(TokenType::Refresh),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// User ID
    pub id: String,
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub token_type: TokenType,
    /// Unique token ID
    pub jti: String,
}

impl AccessClaims {
    pub fn new(id: &str, username: &str, exp: i64) -> Self {
        Self {
            id: id.to_string(),
            username: username.to_string(),
            exp,
            token_type: TokenType::Access,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Claims carried by a refresh token. No username: a refresh token only
/// names the identity it re-enters the service as.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub id: String,
    pub exp: i64,
    pub token_type: TokenType,
    pub jti: String,
}

impl RefreshClaims {
    pub fn new(id: &str, exp: i64) -> Self {
        Self {
            id: id.to_string(),
            exp,
            token_type: TokenType::Refresh,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Verified but untyped claim map of a presented token.
///
/// Accessors never panic: a missing claim or one of the wrong JSON type
/// reads as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RawClaims(HashMap<String, Value>);

impl RawClaims {
    pub fn str_claim(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn i64_claim(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    pub fn token_type(&self) -> Option<TokenType> {
        self.str_claim("token_type").and_then(TokenType::from_claim)
    }

    /// The `id` claim, or `""` when absent.
    pub fn id(&self) -> &str {
        self.str_claim("id").unwrap_or_default()
    }

    pub fn username(&self) -> &str {
        self.str_claim("username").unwrap_or_default()
    }

    pub fn exp(&self) -> Option<i64> {
        self.i64_claim("exp")
    }
}
