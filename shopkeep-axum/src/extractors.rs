use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
};

use axum::{
    Extension, RequestPartsExt,
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use axum_extra::extract::CookieJar;
use shopkeep::{RepositoryProvider, SessionToken, User};

use crate::{error::ApiError, routes::AppState, types::ConnectionInfo};

const UNKNOWN_IP: &str = "unknown";

/// Resolve the client address: the first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    match forwarded.or_else(real_ip) {
        Some(ip) => canonical_ip(ip),
        None => peer
            .map(|addr| addr.ip().to_canonical().to_string())
            .unwrap_or_else(|| UNKNOWN_IP.to_string()),
    }
}

/// The raw `User-Agent`, decoded lossily. Clients send arbitrary bytes here and the value
/// is only ever stored, so it is never a reason to reject the request.
fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// `::ffff:10.0.0.5` and `10.0.0.5` are the same client.
fn canonical_ip(ip: &str) -> String {
    ip.parse::<IpAddr>()
        .map(|addr| addr.to_canonical().to_string())
        .unwrap_or_else(|_| ip.to_string())
}

impl<S> FromRequestParts<S> for ConnectionInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = user_agent(&parts.headers);

        let peer = parts
            .extract::<ConnectInfo<SocketAddr>>()
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr);

        Ok(ConnectionInfo {
            ip: client_ip(&parts.headers, peer),
            user_agent,
        })
    }
}

/// The authenticated user, placed in request extensions by
/// [`require_auth`](crate::require_auth).
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Extension(user): Extension<User> =
            parts.extract().await.map_err(|_| ApiError::NoToken)?;

        Ok(AuthUser(user))
    }
}

/// Session token from `Authorization: Bearer`, falling back to the session cookie.
pub struct SessionTokenFromRequest(pub Option<SessionToken>);

impl<R> FromRequestParts<AppState<R>> for SessionTokenFromRequest
where
    R: RepositoryProvider,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<R>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(token) = parts
            .headers
            .get("Authorization")
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            return Ok(SessionTokenFromRequest(Some(SessionToken::new(token))));
        }

        let jar = parts
            .extract::<CookieJar>()
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid cookie header"))?;

        let session_token = jar
            .get(&state.cookie_config.name)
            .map(|cookie| cookie.value())
            .filter(|value| !value.is_empty())
            .map(SessionToken::new);

        Ok(SessionTokenFromRequest(session_token))
    }
}
