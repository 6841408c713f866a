//! Identity store abstraction.
//!
//! The core never talks to a database directly; it goes through
//! [`UserRepository`]. Two adapters ship with the crate: an in-memory map
//! used by tests and local runs, and a Postgres-backed one.

use std::future::Future;

use crate::domain::{UpdateUser, User};
use crate::error::DatabaseError;

mod memory;
mod postgres;

pub use memory::InMemoryUserRepository;
pub use postgres::PgUserRepository;

pub trait UserRepository: Send + Sync {
    /// Exact, case-sensitive username lookup.
    fn get_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<User, DatabaseError>> + Send;

    fn get_by_id(&self, id: &str) -> impl Future<Output = Result<User, DatabaseError>> + Send;

    /// Apply a partial update.
    ///
    /// Must be atomic with respect to `input.expected_refresh_token_hash`:
    /// when the guard no longer holds, nothing is written and
    /// `DatabaseError::Conflict` is returned.
    fn update(
        &self,
        id: &str,
        input: UpdateUser,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;
}
