use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use shopkeep::RepositoryProvider;

use crate::{error::ApiError, extractors::SessionTokenFromRequest, routes::AppState};

/// Reject the request unless it carries a valid session for an active user.
///
/// On success the [`User`](shopkeep::User) is inserted into request extensions for
/// [`AuthUser`](crate::AuthUser).
pub async fn require_auth<R>(
    State(state): State<AppState<R>>,
    SessionTokenFromRequest(session_token): SessionTokenFromRequest,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    R: RepositoryProvider,
{
    let session_token = session_token.ok_or(ApiError::NoToken)?;

    let user = state
        .shopkeep
        .current_user(&session_token)
        .await
        .map_err(|e| ApiError::from_error(e, "Server error", state.environment))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
