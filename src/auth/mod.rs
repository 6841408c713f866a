//! Authentication module
//!
//! Handles JWT token generation/validation, password hashing,
//! refresh token storage hashing and the login/refresh service built on them.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod service;

pub use claims::{AccessClaims, RawClaims, RefreshClaims, TokenType};
pub use jwt::{decode_claims, generate_access_token, generate_refresh_token};
pub use password::{hash_password, verify_password};
pub use refresh_token::{hash_refresh_token, refresh_token_matches};
pub use service::{
    verify_credentials, AuthService, LoginRequest, RefreshRequest, TokenPair, TokenResponse,
};
