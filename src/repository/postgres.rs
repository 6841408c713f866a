use sqlx::PgPool;

use super::UserRepository;
use crate::domain::{UpdateUser, User};
use crate::error::DatabaseError;

type UserRow = (String, String, String, bool, Option<String>);

/// Postgres-backed identity store over the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, query: &str, value: &str, what: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, UserRow>(query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(into_user)
            .ok_or_else(|| DatabaseError::NotFound(format!("user with {what} {value}")))
    }
}

fn into_user((id, username, password_hash, is_active, refresh_token_hash): UserRow) -> User {
    User {
        id,
        username,
        password_hash,
        is_active,
        refresh_token_hash,
    }
}

impl UserRepository for PgUserRepository {
    async fn get_by_username(&self, username: &str) -> Result<User, DatabaseError> {
        self.fetch_one_by(
            r#"
            SELECT id, username, password_hash, is_active, refresh_token_hash
            FROM users
            WHERE username = $1
            "#,
            username,
            "username",
        )
        .await
    }

    async fn get_by_id(&self, id: &str) -> Result<User, DatabaseError> {
        self.fetch_one_by(
            r#"
            SELECT id, username, password_hash, is_active, refresh_token_hash
            FROM users
            WHERE id = $1
            "#,
            id,
            "id",
        )
        .await
    }

    async fn update(&self, id: &str, input: UpdateUser) -> Result<(), DatabaseError> {
        let Some(hash) = input.refresh_token_hash else {
            // Nothing writable requested; still report a missing record.
            return self.get_by_id(id).await.map(|_| ());
        };

        let rows = match input.expected_refresh_token_hash {
            None => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET refresh_token_hash = $1, updated_at = now()
                    WHERE id = $2
                    "#,
                )
                .bind(&hash)
                .bind(id)
                .execute(&self.pool)
                .await?
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET refresh_token_hash = $1, updated_at = now()
                    WHERE id = $2 AND refresh_token_hash IS NOT DISTINCT FROM $3
                    "#,
                )
                .bind(&hash)
                .bind(id)
                .bind(expected)
                .execute(&self.pool)
                .await?
            }
        }
        .rows_affected();

        if rows > 0 {
            return Ok(());
        }

        // Zero rows: either the user is gone or the guard failed.
        self.get_by_id(id).await?;
        tracing::warn!(user_id = %id, "Refresh token hash changed concurrently");
        Err(DatabaseError::Conflict(format!(
            "refresh token hash for user {id} changed"
        )))
    }
}
