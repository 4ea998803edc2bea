//! Login orchestration.
//!
//! One call to [`AuthService::login`] walks a single request through:
//!
//! 1. **Rate check** against the [`LoginRateLimiter`]. A block ends the request with no
//!    database work and no audit record.
//! 2. **Validation** of the request body.
//! 3. **Lookup** by normalized email.
//! 4. **Password verification.**
//! 5. **Active check.**
//! 6. **Session issue.**
//!
//! Steps 3 through 6 each write exactly one audit record before returning. Unknown email and
//! wrong password produce the same [`LoginOutcome::InvalidCredentials`] so callers cannot
//! tell them apart.

use std::sync::Arc;

use serde::Deserialize;

use crate::{
    Error, NewUser, Role, Session, SessionIssuer, SessionToken, User,
    error::SessionError,
    login_attempt::{FailureReason, NewLoginAttempt},
    repositories::{LoginAttemptRepository, PasswordRepository, UserRepository},
    services::{
        LoginAttemptService, LoginRateLimiter, PasswordService, RateLimitDecision, UserService,
    },
    validation::{normalize_email, validate_login, validate_registration},
};

/// Login request body.
///
/// Fields are optional so that missing fields surface as validation errors rather than
/// deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }
}

/// Registration request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(ip_address: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent,
        }
    }
}

/// Terminal state of a login request that did not hit an error.
#[derive(Debug)]
pub enum LoginOutcome {
    /// The rate limiter refused the request.
    Blocked,
    /// Unknown email or wrong password.
    InvalidCredentials,
    /// Correct credentials for a deactivated account.
    Inactive,
    Success { user: User, session: Session },
}

/// Everything a login request produced.
///
/// The rate limit decision is reported even when `outcome` is an error so that every
/// response can carry the limiter's headers.
#[derive(Debug)]
pub struct LoginResult {
    pub rate_limit: RateLimitDecision,
    pub outcome: Result<LoginOutcome, Error>,
}

/// Orchestrates login, registration and session resolution.
pub struct AuthService<U, P, A>
where
    U: UserRepository,
    P: PasswordRepository,
    A: LoginAttemptRepository,
{
    user_service: Arc<UserService<U>>,
    password_service: Arc<PasswordService<U, P>>,
    attempt_service: Arc<LoginAttemptService<A>>,
    rate_limiter: LoginRateLimiter,
    sessions: SessionIssuer,
}

impl<U, P, A> AuthService<U, P, A>
where
    U: UserRepository,
    P: PasswordRepository,
    A: LoginAttemptRepository,
{
    pub fn new(
        user_service: Arc<UserService<U>>,
        password_service: Arc<PasswordService<U, P>>,
        attempt_service: Arc<LoginAttemptService<A>>,
        rate_limiter: LoginRateLimiter,
        sessions: SessionIssuer,
    ) -> Self {
        Self {
            user_service,
            password_service,
            attempt_service,
            rate_limiter,
            sessions,
        }
    }

    pub fn rate_limiter(&self) -> &LoginRateLimiter {
        &self.rate_limiter
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Run one login request to completion.
    pub async fn login(&self, request: LoginRequest, client: &ClientInfo) -> LoginResult {
        let rate_limit = self.rate_limiter.check_and_record(&client.ip_address);
        if !rate_limit.is_allowed() {
            tracing::warn!(ip = %client.ip_address, "Login blocked by rate limiter");
            return LoginResult {
                rate_limit,
                outcome: Ok(LoginOutcome::Blocked),
            };
        }

        let outcome = self.authenticate(request, client).await;
        LoginResult {
            rate_limit,
            outcome,
        }
    }

    async fn authenticate(
        &self,
        request: LoginRequest,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, Error> {
        validate_login(request.email.as_deref(), request.password.as_deref())?;

        let email = normalize_email(request.email.as_deref().unwrap_or_default());
        let password = request.password.unwrap_or_default();
        let user_agent = client.user_agent.as_deref();

        let Some(user) = self.user_service.get_user_by_email(&email).await? else {
            tracing::info!(email = %email, ip = %client.ip_address, "Login failed: unknown email");
            self.attempt_service
                .log_attempt(NewLoginAttempt::failure(
                    &email,
                    &client.ip_address,
                    user_agent,
                    FailureReason::InvalidCredentials,
                    None,
                )?)
                .await
                .ignore();
            return Ok(LoginOutcome::InvalidCredentials);
        };

        if !self
            .password_service
            .verify_credentials(&user.id, &password)
            .await?
        {
            tracing::info!(
                user_id = %user.id,
                ip = %client.ip_address,
                "Login failed: wrong password"
            );
            self.attempt_service
                .log_attempt(NewLoginAttempt::failure(
                    &user.email,
                    &client.ip_address,
                    user_agent,
                    FailureReason::InvalidCredentials,
                    Some(user.id.clone()),
                )?)
                .await
                .ignore();
            return Ok(LoginOutcome::InvalidCredentials);
        }

        if !user.is_active {
            tracing::info!(
                user_id = %user.id,
                ip = %client.ip_address,
                "Login failed: account inactive"
            );
            self.attempt_service
                .log_attempt(NewLoginAttempt::failure(
                    &user.email,
                    &client.ip_address,
                    user_agent,
                    FailureReason::AccountInactive,
                    Some(user.id.clone()),
                )?)
                .await
                .ignore();
            return Ok(LoginOutcome::Inactive);
        }

        let session = self.sessions.issue(&user.id)?;

        self.attempt_service
            .log_attempt(NewLoginAttempt::success(
                &user.email,
                &client.ip_address,
                user_agent,
                user.id.clone(),
            )?)
            .await
            .ignore();

        tracing::info!(user_id = %user.id, ip = %client.ip_address, "Login succeeded");

        Ok(LoginOutcome::Success { user, session })
    }

    /// Register a new admin and sign them in.
    pub async fn register(&self, request: RegisterRequest) -> Result<(User, Session), Error> {
        validate_registration(
            request.email.as_deref(),
            request.password.as_deref(),
            request.first_name.as_deref(),
            request.last_name.as_deref(),
        )?;

        let new_user = NewUser::builder()
            .email(request.email.unwrap_or_default())
            .first_name(request.first_name.unwrap_or_default())
            .last_name(request.last_name.unwrap_or_default())
            .role(Role::Admin)
            .build()?;

        let user = self
            .password_service
            .register_user(new_user, request.password.as_deref().unwrap_or_default())
            .await?;
        let session = self.sessions.issue(&user.id)?;

        Ok((user, session))
    }

    /// Resolve a session token to its active user.
    pub async fn current_user(&self, token: &SessionToken) -> Result<User, Error> {
        let session = self.sessions.verify(token)?;

        match self.user_service.get_user(&session.user_id).await? {
            Some(user) if user.is_active => Ok(user),
            Some(_) => Err(SessionError::InvalidToken("account is deactivated".to_string()).into()),
            None => Err(SessionError::InvalidToken("user no longer exists".to_string()).into()),
        }
    }
}
