use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shopkeep_core::{
    Error,
    error::{AuthError, FieldError, SessionError},
};

use crate::types::{Environment, ErrorResponse};

pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";
pub const ACCOUNT_INACTIVE_MESSAGE: &str = "Account is deactivated. Please contact support.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Too many login attempts")]
    TooManyAttempts { retry_after_minutes: u64 },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("User already exists with this email")]
    UserAlreadyExists,

    #[error("No token, authorization denied")]
    NoToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Route not found")]
    NotFound,

    /// An infrastructure failure. `detail` is only rendered in development.
    #[error("{message}")]
    Internal {
        message: &'static str,
        detail: Option<String>,
    },
}

impl ApiError {
    /// Map a service error to its HTTP form.
    ///
    /// `context` is the generic message used for infrastructure failures on this route.
    pub fn from_error(err: Error, context: &'static str, environment: Environment) -> Self {
        match err {
            Error::Validation(e) => ApiError::Validation(e.field_errors()),
            Error::Auth(AuthError::UserAlreadyExists) => ApiError::UserAlreadyExists,
            Error::Session(SessionError::Expired) => ApiError::TokenExpired,
            Error::Session(SessionError::InvalidToken(reason)) => {
                tracing::debug!(reason = %reason, "Rejected session token");
                ApiError::InvalidToken
            }
            err @ (Error::Storage(_) | Error::Crypto(_)) => {
                tracing::error!(error = %err, "{context}");
                ApiError::Internal {
                    message: context,
                    detail: environment.is_development().then(|| err.to_string()),
                }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::UserAlreadyExists => StatusCode::BAD_REQUEST,
            ApiError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidCredentials
            | ApiError::NoToken
            | ApiError::InvalidToken
            | ApiError::TokenExpired => StatusCode::UNAUTHORIZED,
            ApiError::AccountInactive => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Validation(errors) => ErrorResponse {
                success: false,
                message: "Validation failed".to_string(),
                errors: Some(errors),
                error: None,
            },
            ApiError::TooManyAttempts {
                retry_after_minutes,
            } => ErrorResponse {
                success: false,
                message: format!(
                    "Too many login attempts. Please try again in {retry_after_minutes} minutes."
                ),
                errors: None,
                error: None,
            },
            ApiError::InvalidCredentials => ErrorResponse {
                success: false,
                message: INVALID_CREDENTIALS_MESSAGE.to_string(),
                errors: None,
                error: None,
            },
            ApiError::AccountInactive => ErrorResponse {
                success: false,
                message: ACCOUNT_INACTIVE_MESSAGE.to_string(),
                errors: None,
                error: None,
            },
            ApiError::Internal { message, detail } => ErrorResponse {
                success: false,
                message: message.to_string(),
                errors: None,
                error: detail,
            },
            other => ErrorResponse {
                success: false,
                message: other.to_string(),
                errors: None,
                error: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shopkeep_core::error::{StorageError, ValidationError};

    #[test]
    fn test_internal_detail_only_in_development() {
        let dev = ApiError::from_error(
            StorageError::Database("disk I/O error".to_string()).into(),
            "Server error during authentication",
            Environment::Development,
        );
        assert!(matches!(
            dev,
            ApiError::Internal { detail: Some(ref d), .. } if d.contains("disk I/O error")
        ));

        let prod = ApiError::from_error(
            StorageError::Database("disk I/O error".to_string()).into(),
            "Server error during authentication",
            Environment::Production,
        );
        assert!(matches!(prod, ApiError::Internal { detail: None, .. }));
        assert_eq!(prod.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_mapping() {
        let env = Environment::Production;
        let cases = [
            (
                Error::from(ValidationError::MissingField("email".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (AuthError::UserAlreadyExists.into(), StatusCode::BAD_REQUEST),
            (SessionError::Expired.into(), StatusCode::UNAUTHORIZED),
            (
                SessionError::InvalidToken("bad signature".to_string()).into(),
                StatusCode::UNAUTHORIZED,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from_error(err, "Server error", env).status(), status);
        }
    }
}
