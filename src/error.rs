//! Error Handling Module
//!
//! Unified error handling for the authentication service.
//! It covers:
//! 1. Domain-specific error types (validation, storage, auth, config)
//! 2. The unified `AppError` used for control flow
//! 3. HTTP response mapping with structured logging

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(&'static str),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(&'static str, usize),
}

/// Identity store errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),
    /// A conditional update found a different value than the one it expected.
    #[error("Conflicting update: {0}")]
    Conflict(String),
    #[error("Query error: {0}")]
    QueryExecution(String),
    #[error("Database connection error: {0}")]
    ConnectionPool(String),
    #[error("Database error: {0}")]
    UnexpectedError(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config: {0}")]
    MissingRequired(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

/// Authentication errors
///
/// Terminal, caller-facing outcomes. `InvalidCredentials` deliberately covers
/// both an unknown username and a wrong password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account is not active")]
    AccountInactive,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired or was invalidated")]
    TokenExpiredOrInvalidated,
}

/// Infrastructure failures behind the core (store, signer, hasher)
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("hashing failed: {0}")]
    Hashing(String),
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{operation}: {source}")]
    Upstream {
        operation: &'static str,
        #[source]
        source: UpstreamError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Request cancelled during {operation}")]
    Cancelled { operation: &'static str },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap an infrastructure failure with the operation it interrupted.
    pub fn upstream(operation: &'static str, source: impl Into<UpstreamError>) -> Self {
        AppError::Upstream {
            operation,
            source: source.into(),
        }
    }

    /// The domain outcome, if this is one.
    pub fn auth_error(&self) -> Option<AuthError> {
        match self {
            AppError::Auth(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::Upstream {
                source: UpstreamError::Database(DatabaseError::NotFound(_)),
                ..
            }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AppError::Upstream {
                source: UpstreamError::Database(DatabaseError::Conflict(_)),
                ..
            }
        )
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            sqlx::Error::Database(_) => DatabaseError::QueryExecution(err.to_string()),
            other => DatabaseError::UnexpectedError(other.to_string()),
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    e.to_string(),
                ),
                AuthError::AccountInactive => {
                    (StatusCode::FORBIDDEN, "ACCOUNT_INACTIVE", e.to_string())
                }
                AuthError::InvalidToken => {
                    (StatusCode::UNAUTHORIZED, "TOKEN_INVALID", e.to_string())
                }
                AuthError::TokenExpiredOrInvalidated => {
                    (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", e.to_string())
                }
            },

            AppError::Upstream {
                source: UpstreamError::Database(e),
                ..
            } => match e {
                DatabaseError::NotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "Account not found".to_string(),
                ),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                ),
            },

            AppError::Upstream { .. } | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Server configuration error".to_string(),
            ),

            AppError::Cancelled { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "REQUEST_CANCELLED",
                "Request was cancelled before it completed".to_string(),
            ),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.classify();
        let response =
            ErrorResponse::new(request_id.to_string(), message, code.to_string(), status.as_u16());
        (status, response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, error = %self, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Upstream { operation, source } => {
                tracing::error!(
                    request_id = request_id,
                    operation = operation,
                    error = %source,
                    "Upstream failure"
                );
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Cancelled { operation } => {
                tracing::warn!(request_id = request_id, operation = operation, "Request cancelled");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}
