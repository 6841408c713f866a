//! Request-scoped context: correlation id and an optional deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AppError, DatabaseError};

#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            deadline: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail with `Cancelled` once the deadline has passed.
    pub fn ensure_active(&self, operation: &'static str) -> Result<(), AppError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = operation,
                    "Deadline exceeded"
                );
                Err(AppError::Cancelled { operation })
            }
            _ => Ok(()),
        }
    }

    /// Run a store call under this context.
    ///
    /// Store failures are wrapped with `operation`; a call still pending at
    /// the deadline is dropped and reported as `Cancelled`.
    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, DatabaseError>>,
    {
        self.ensure_active(operation)?;

        let result = match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call).await.map_err(|_| {
                tracing::warn!(
                    request_id = %self.request_id,
                    operation = operation,
                    "Store call timed out"
                );
                AppError::Cancelled { operation }
            })?,
            None => call.await,
        };

        result.map_err(|source| AppError::upstream(operation, source))
    }
}
