//! Login and refresh behaviour of the authentication service, driven
//! through the in-memory identity store and a few misbehaving stores.

use std::sync::Arc;
use std::time::Duration;

use authgate::auth::{
    decode_claims, generate_refresh_token, hash_password, AuthService, LoginRequest,
    RefreshRequest, TokenType,
};
use authgate::configuration::JwtSettings;
use authgate::context::RequestContext;
use authgate::domain::{UpdateUser, User};
use authgate::error::{AppError, AuthError, DatabaseError};
use authgate::repository::{InMemoryUserRepository, UserRepository};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tokio::sync::Barrier;

const SIGNING_KEY: &str = "test-secret-key-at-least-32-characters-long";

fn jwt_settings() -> JwtSettings {
    JwtSettings {
        signing_key: SIGNING_KEY.to_string(),
        access_token_expiry_minutes: 15,
        refresh_token_hash_cost: 4,
    }
}

fn alice() -> User {
    User::new("u1", "alice", hash_password("secret", 4).unwrap())
}

async fn seeded_store() -> InMemoryUserRepository {
    let store = InMemoryUserRepository::new();
    store.insert(alice()).await;
    store
}

async fn service() -> AuthService<InMemoryUserRepository> {
    AuthService::new(seeded_store().await, jwt_settings())
}

fn ctx() -> RequestContext {
    RequestContext::new()
}

fn assert_auth_error<T: std::fmt::Debug>(result: Result<T, AppError>, expected: AuthError) {
    match result {
        Err(e) => assert_eq!(e.auth_error(), Some(expected), "got {e:?}"),
        Ok(v) => panic!("expected {expected:?}, got Ok({v:?})"),
    }
}

// --- Login ---

#[tokio::test]
async fn login_issues_token_pair_and_stores_refresh_hash() {
    let service = service().await;
    let before = Utc::now();

    let tokens = service
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap();

    let access = decode_claims(&tokens.access_token, service.config()).unwrap();
    assert_eq!(access.id(), "u1");
    assert_eq!(access.username(), "alice");
    assert_eq!(access.token_type(), Some(TokenType::Access));
    assert_eq!(access.exp(), Some(tokens.expires_at.timestamp()));

    let ttl = (tokens.expires_at - before).num_seconds();
    assert!((14 * 60..=15 * 60).contains(&ttl), "unexpected ttl: {ttl}s");

    let refresh = decode_claims(&tokens.refresh_token, service.config()).unwrap();
    assert_eq!(refresh.id(), "u1");
    assert_eq!(refresh.token_type(), Some(TokenType::Refresh));

    let stored = service.users().find("u1").await.unwrap();
    let hash = stored.refresh_token_hash.expect("refresh hash stored");
    assert_ne!(hash, tokens.refresh_token);
}

#[tokio::test]
async fn unknown_user_and_wrong_password_are_indistinguishable() {
    let service = service().await;

    assert_auth_error(
        service.login(&ctx(), &LoginRequest::new("bob", "secret")).await,
        AuthError::InvalidCredentials,
    );
    assert_auth_error(
        service.login(&ctx(), &LoginRequest::new("alice", "wrong")).await,
        AuthError::InvalidCredentials,
    );
    assert_auth_error(
        service.login(&ctx(), &LoginRequest::new("Alice", "secret")).await,
        AuthError::InvalidCredentials,
    );
}

#[tokio::test]
async fn inactive_account_is_rejected_without_storing_a_token() {
    let store = InMemoryUserRepository::new();
    store.insert(alice().deactivated()).await;
    let service = AuthService::new(store, jwt_settings());

    assert_auth_error(
        service.login(&ctx(), &LoginRequest::new("alice", "secret")).await,
        AuthError::AccountInactive,
    );
    assert!(service
        .users()
        .find("u1")
        .await
        .unwrap()
        .refresh_token_hash
        .is_none());
}

#[tokio::test]
async fn out_of_range_ttl_fails_login_without_storing_a_token() {
    let service = AuthService::new(
        seeded_store().await,
        JwtSettings {
            access_token_expiry_minutes: i64::MAX / 1000,
            ..jwt_settings()
        },
    );

    let err = service
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)), "got {err:?}");
    assert!(service
        .users()
        .find("u1")
        .await
        .unwrap()
        .refresh_token_hash
        .is_none());
}

#[tokio::test]
async fn empty_fields_fail_validation() {
    let service = service().await;

    let result = service.login(&ctx(), &LoginRequest::new("", "secret")).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = service.refresh(&ctx(), &RefreshRequest::new("")).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn second_login_invalidates_previous_refresh_token() {
    let service = service().await;
    let first = service
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap();
    let second = service
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap();

    assert_ne!(first.refresh_token, second.refresh_token);
    assert_auth_error(
        service
            .refresh(&ctx(), &RefreshRequest::new(first.refresh_token))
            .await,
        AuthError::TokenExpiredOrInvalidated,
    );
    assert!(service
        .refresh(&ctx(), &RefreshRequest::new(second.refresh_token))
        .await
        .is_ok());
}

// --- Refresh ---

#[tokio::test]
async fn refresh_rotates_and_old_token_cannot_be_reused() {
    let service = service().await;
    let login = service
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap();

    let rotated = service
        .refresh(&ctx(), &RefreshRequest::new(login.refresh_token.clone()))
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, login.refresh_token);

    let access = decode_claims(&rotated.access_token, service.config()).unwrap();
    assert_eq!(access.username(), "alice");

    assert_auth_error(
        service
            .refresh(&ctx(), &RefreshRequest::new(login.refresh_token))
            .await,
        AuthError::TokenExpiredOrInvalidated,
    );

    // The chain continues from the newest token.
    assert!(service
        .refresh(&ctx(), &RefreshRequest::new(rotated.refresh_token))
        .await
        .is_ok());
}

#[tokio::test]
async fn access_token_is_not_accepted_for_refresh() {
    let service = service().await;
    let login = service
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap();

    assert_auth_error(
        service
            .refresh(&ctx(), &RefreshRequest::new(login.access_token))
            .await,
        AuthError::InvalidToken,
    );
}

#[tokio::test]
async fn token_without_type_claim_is_invalid() {
    let service = service().await;
    let exp = Utc::now().timestamp() + 3600;
    let token = encode(
        &Header::default(),
        &json!({ "id": "u1", "exp": exp }),
        &EncodingKey::from_secret(SIGNING_KEY.as_bytes()),
    )
    .unwrap();

    assert_auth_error(
        service.refresh(&ctx(), &RefreshRequest::new(token)).await,
        AuthError::InvalidToken,
    );
}

#[tokio::test]
async fn token_signed_with_another_key_is_invalid() {
    let service = service().await;
    let exp = Utc::now().timestamp() + 3600;
    let token = encode(
        &Header::default(),
        &json!({ "id": "u1", "exp": exp, "token_type": "refresh" }),
        &EncodingKey::from_secret(b"some-other-signing-key-entirely"),
    )
    .unwrap();

    assert_auth_error(
        service.refresh(&ctx(), &RefreshRequest::new(token)).await,
        AuthError::InvalidToken,
    );
    assert_auth_error(
        service
            .refresh(&ctx(), &RefreshRequest::new("not-a-jwt"))
            .await,
        AuthError::InvalidToken,
    );
}

#[tokio::test]
async fn refresh_before_any_login_is_rejected() {
    let service = service().await;
    let token = generate_refresh_token(&alice(), Utc::now(), service.config()).unwrap();

    assert_auth_error(
        service.refresh(&ctx(), &RefreshRequest::new(token)).await,
        AuthError::TokenExpiredOrInvalidated,
    );
}

#[tokio::test]
async fn refresh_for_deleted_identity_reports_not_found() {
    let service = service().await;
    let ghost = User::new("ghost", "ghost", "unused");
    let token = generate_refresh_token(&ghost, Utc::now(), service.config()).unwrap();

    let err = service
        .refresh(&ctx(), &RefreshRequest::new(token))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn refresh_does_not_recheck_active_flag() {
    let store = seeded_store().await;
    let service = AuthService::new(store.clone(), jwt_settings());
    let login = service
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap();

    let mut user = store.find("u1").await.unwrap();
    user.is_active = false;
    store.insert(user).await;

    assert!(service
        .refresh(&ctx(), &RefreshRequest::new(login.refresh_token))
        .await
        .is_ok());
}

#[tokio::test]
async fn concurrent_refreshes_with_one_token_succeed_once() {
    let service = service().await;
    let login = service
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap();

    let req = RefreshRequest::new(login.refresh_token);
    let (ctx_a, ctx_b) = (ctx(), ctx());
    let (a, b) = tokio::join!(service.refresh(&ctx_a, &req), service.refresh(&ctx_b, &req));

    let outcomes = [a.map(|_| ()), b.map(|_| ())];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let failure = outcomes.into_iter().find_map(Result::err).unwrap();
    assert_eq!(
        failure.auth_error(),
        Some(AuthError::TokenExpiredOrInvalidated)
    );
}

/// Holds every `get_by_id` until `parties` callers have read, so that
/// concurrent refreshes all observe the same stored hash.
struct InterleavingRepository {
    inner: InMemoryUserRepository,
    barrier: Arc<Barrier>,
}

impl UserRepository for InterleavingRepository {
    async fn get_by_username(&self, username: &str) -> Result<User, DatabaseError> {
        self.inner.get_by_username(username).await
    }

    async fn get_by_id(&self, id: &str) -> Result<User, DatabaseError> {
        let user = self.inner.get_by_id(id).await;
        self.barrier.wait().await;
        user
    }

    async fn update(&self, id: &str, input: UpdateUser) -> Result<(), DatabaseError> {
        self.inner.update(id, input).await
    }
}

#[tokio::test]
async fn interleaved_refreshes_lose_the_compare_and_swap() {
    let store = seeded_store().await;
    let login = AuthService::new(store.clone(), jwt_settings())
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap();

    let service = AuthService::new(
        InterleavingRepository {
            inner: store.clone(),
            barrier: Arc::new(Barrier::new(2)),
        },
        jwt_settings(),
    );

    let req = RefreshRequest::new(login.refresh_token);
    let (ctx_a, ctx_b) = (ctx(), ctx());
    let (a, b) = tokio::join!(service.refresh(&ctx_a, &req), service.refresh(&ctx_b, &req));

    let winner = match (a, b) {
        (Ok(tokens), Err(e)) | (Err(e), Ok(tokens)) => {
            assert_eq!(e.auth_error(), Some(AuthError::TokenExpiredOrInvalidated));
            tokens
        }
        other => panic!("expected exactly one success, got {other:?}"),
    };

    // Only the winner's token is stored.
    let stored = store.find("u1").await.unwrap().refresh_token_hash;
    assert!(authgate::auth::refresh_token_matches(
        &winner.refresh_token,
        stored.as_deref()
    ));
}

// --- Store failures and cancellation ---

/// Reads succeed, writes fail.
struct ReadOnlyRepository {
    inner: InMemoryUserRepository,
}

impl UserRepository for ReadOnlyRepository {
    async fn get_by_username(&self, username: &str) -> Result<User, DatabaseError> {
        self.inner.get_by_username(username).await
    }

    async fn get_by_id(&self, id: &str) -> Result<User, DatabaseError> {
        self.inner.get_by_id(id).await
    }

    async fn update(&self, _id: &str, _input: UpdateUser) -> Result<(), DatabaseError> {
        Err(DatabaseError::ConnectionPool("store is read-only".into()))
    }
}

#[tokio::test]
async fn failed_hash_write_returns_no_tokens() {
    let store = seeded_store().await;
    let service = AuthService::new(
        ReadOnlyRepository {
            inner: store.clone(),
        },
        jwt_settings(),
    );

    let err = service
        .login(&ctx(), &LoginRequest::new("alice", "secret"))
        .await
        .unwrap_err();
    match err {
        AppError::Upstream { operation, .. } => assert_eq!(operation, "update_refresh_token_hash"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.find("u1").await.unwrap().refresh_token_hash.is_none());
}

/// Every call takes longer than any sensible request deadline.
struct SlowRepository {
    inner: InMemoryUserRepository,
    delay: Duration,
}

impl UserRepository for SlowRepository {
    async fn get_by_username(&self, username: &str) -> Result<User, DatabaseError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_by_username(username).await
    }

    async fn get_by_id(&self, id: &str) -> Result<User, DatabaseError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_by_id(id).await
    }

    async fn update(&self, id: &str, input: UpdateUser) -> Result<(), DatabaseError> {
        tokio::time::sleep(self.delay).await;
        self.inner.update(id, input).await
    }
}

#[tokio::test]
async fn store_call_past_deadline_is_cancelled() {
    let service = AuthService::new(
        SlowRepository {
            inner: seeded_store().await,
            delay: Duration::from_millis(500),
        },
        jwt_settings(),
    );
    let ctx = RequestContext::new().with_timeout(Duration::from_millis(20));

    let err = service
        .login(&ctx, &LoginRequest::new("alice", "secret"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, AppError::Cancelled { operation: "get_by_username" }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn expired_context_never_reaches_the_store() {
    let store = seeded_store().await;
    let service = AuthService::new(store.clone(), jwt_settings());
    let ctx = RequestContext::new().with_deadline(tokio::time::Instant::now());

    let err = service
        .login(&ctx, &LoginRequest::new("alice", "secret"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Cancelled { .. }), "got {err:?}");
    assert!(store.find("u1").await.unwrap().refresh_token_hash.is_none());
}
