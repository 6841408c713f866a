//! Authentication Routes
//!
//! Thin HTTP adapters over [`AuthService`]: login with username and
//! password, and refresh-token rotation.

use actix_web::{web, HttpResponse};

use crate::auth::{AuthService, LoginRequest, RefreshRequest, TokenPair, TokenResponse};
use crate::configuration::ApplicationSettings;
use crate::context::RequestContext;
use crate::error::{AppError, ErrorHandler};
use crate::repository::UserRepository;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn request_context(settings: &ApplicationSettings) -> RequestContext {
    RequestContext::new().with_timeout(settings.request_timeout())
}

/// Render the outcome under the context's request id, so the `error_id` a
/// client reports is the id on the service's log events.
fn respond(ctx: &RequestContext, result: Result<TokenPair, AppError>) -> HttpResponse {
    match result {
        Ok(tokens) => HttpResponse::Ok()
            .insert_header((REQUEST_ID_HEADER, ctx.request_id()))
            .json(TokenResponse::from(tokens)),
        Err(e) => {
            e.log_error(ctx.request_id());
            let (status, body) = ErrorHandler::error_response(&e, ctx.request_id());
            HttpResponse::build(status)
                .insert_header((REQUEST_ID_HEADER, ctx.request_id()))
                .json(body)
        }
    }
}

/// POST /auth/login
///
/// Authenticate with username and password.
/// Returns an access token, its expiry and a refresh token on success.
///
/// # Errors
/// - 400: Empty or oversized fields
/// - 401: Unknown username or wrong password (indistinguishable)
/// - 403: Account is inactive
/// - 503: Store unavailable or request deadline exceeded
pub async fn login<R: UserRepository + 'static>(
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService<R>>,
    settings: web::Data<ApplicationSettings>,
) -> HttpResponse {
    let ctx = request_context(&settings);
    tracing::info!(request_id = %ctx.request_id(), "Login requested");

    let result = service.login(&ctx, &form).await;
    respond(&ctx, result)
}

/// POST /auth/refresh
///
/// Exchange the latest refresh token for a new token pair. The presented
/// token stops working once this succeeds.
///
/// # Errors
/// - 400: Missing or oversized token
/// - 401: Bad signature, wrong token type, or a superseded token
/// - 404: The token's identity no longer exists
pub async fn refresh<R: UserRepository + 'static>(
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService<R>>,
    settings: web::Data<ApplicationSettings>,
) -> HttpResponse {
    let ctx = request_context(&settings);
    tracing::info!(request_id = %ctx.request_id(), "Token refresh requested");

    let result = service.refresh(&ctx, &form).await;
    respond(&ctx, result)
}
