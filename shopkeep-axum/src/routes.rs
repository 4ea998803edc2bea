use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use chrono::{SecondsFormat, Utc};
use shopkeep::{
    LoginOutcome, LoginRequest, RateLimitDecision, RegisterRequest, RepositoryProvider, Shopkeep,
};
use shopkeep_core::error::FieldError;

use crate::{
    error::{ApiError, Result},
    extractors::AuthUser,
    middleware::require_auth,
    types::*,
};

pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared state for every route.
pub struct AppState<R: RepositoryProvider> {
    pub shopkeep: Arc<Shopkeep<R>>,
    pub cookie_config: CookieConfig,
    pub environment: Environment,
}

impl<R: RepositoryProvider> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            shopkeep: self.shopkeep.clone(),
            cookie_config: self.cookie_config.clone(),
            environment: self.environment,
        }
    }
}

pub fn create_router<R>(
    shopkeep: Arc<Shopkeep<R>>,
    cookie_config: CookieConfig,
    environment: Environment,
) -> Router
where
    R: RepositoryProvider + 'static,
{
    let state = AppState {
        shopkeep,
        cookie_config,
        environment,
    };

    let protected_routes = Router::new()
        .route("/api/auth/me", get(me_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth::<R>,
        ));

    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/health", get(health_handler))
        .merge(protected_routes)
        .fallback(not_found_handler)
        .with_state(state)
}

/// `X-RateLimit-*` headers for a limiter decision, plus `Retry-After` when blocked.
fn rate_limit_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining()));

    let reset = decision
        .reset_at()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(X_RATELIMIT_RESET, value);
    }

    if let Some(seconds) = decision.retry_after_seconds() {
        headers.insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    }

    headers
}

fn body_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(vec![FieldError::new("body", rejection.body_text())])
}

async fn login_handler<R>(
    State(state): State<AppState<R>>,
    jar: CookieJar,
    connection_info: ConnectionInfo,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Response
where
    R: RepositoryProvider,
{
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return body_rejection(rejection).into_response(),
    };

    let result = state
        .shopkeep
        .login(request, &connection_info.into())
        .await;
    let headers = rate_limit_headers(&result.rate_limit);

    match result.outcome {
        Ok(LoginOutcome::Success { user, session }) => {
            let jar = jar.add(state.cookie_config.session_cookie(&session.token));
            (
                headers,
                jar,
                Json(LoginResponse {
                    success: true,
                    user: UserSummary::from(&user),
                }),
            )
                .into_response()
        }
        Ok(LoginOutcome::Blocked) => {
            let retry_after_minutes = result.rate_limit.retry_after_minutes().unwrap_or(1);
            (headers, ApiError::TooManyAttempts { retry_after_minutes }).into_response()
        }
        Ok(LoginOutcome::InvalidCredentials) => {
            (headers, ApiError::InvalidCredentials).into_response()
        }
        Ok(LoginOutcome::Inactive) => (headers, ApiError::AccountInactive).into_response(),
        Err(e) => (
            headers,
            ApiError::from_error(e, "Server error during authentication", state.environment),
        )
            .into_response(),
    }
}

async fn register_handler<R>(
    State(state): State<AppState<R>>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse>
where
    R: RepositoryProvider,
{
    let Json(request) = payload.map_err(body_rejection)?;

    let (user, session) = state
        .shopkeep
        .register(request)
        .await
        .map_err(|e| ApiError::from_error(e, "Server error during registration", state.environment))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Admin registered successfully".to_string(),
            data: RegisterData {
                user,
                token: session.token,
            },
        }),
    ))
}

async fn me_handler(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        data: UserData { user },
    })
}

async fn logout_handler<R>(State(state): State<AppState<R>>, jar: CookieJar) -> impl IntoResponse
where
    R: RepositoryProvider,
{
    let jar = jar.remove(state.cookie_config.removal_cookie());

    (jar, Json(MessageResponse::ok("Logged out successfully")))
}

async fn health_handler<R>(State(state): State<AppState<R>>) -> impl IntoResponse
where
    R: RepositoryProvider,
{
    let (status, success, message) = match state.shopkeep.health_check().await {
        Ok(()) => (StatusCode::OK, true, "Server is running"),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, false, "Database unavailable")
        }
    };

    (
        status,
        Json(HealthResponse {
            success,
            message: message.to_string(),
            timestamp: Utc::now(),
            environment: state.environment,
        }),
    )
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}
