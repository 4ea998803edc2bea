//! # Shopkeep
//!
//! Shopkeep is the admin login service for the shopkeep storefront. It owns the path from a
//! login form to a signed session cookie:
//!
//! - a per-IP sliding-window rate limiter evaluated before any database work
//! - an append-only login attempt audit log with a 30 day retention sweep
//! - password verification against argon2 hashes
//! - stateless HS256 JWT sessions with a 7 day lifetime
//!
//! ## Storage Support
//!
//! Shopkeep currently supports the following storage backends:
//! - SQLite
//!
//! ## Example
//!
//! ```rust,no_run
//! use shopkeep::{ClientInfo, JwtConfig, LoginRequest, ShopkeepBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shopkeep = ShopkeepBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256(b"change-me".to_vec()))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let client = ClientInfo::new("127.0.0.1", None);
//!     let result = shopkeep
//!         .login(LoginRequest::new("admin@example.com", "admin123"), &client)
//!         .await;
//!     println!("remaining attempts: {}", result.rate_limit.remaining());
//!
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use chrono::Duration;
use shopkeep_core::{
    repositories::{
        LoginAttemptRepositoryAdapter, PasswordRepositoryAdapter, UserRepositoryAdapter,
    },
    services::{AuthService, LoginAttemptService, PasswordService, UserService},
    session::DEFAULT_SESSION_DURATION,
};
use tokio::{sync::watch, task::JoinHandle};

pub mod builder;

pub use builder::{NoStorage, ShopkeepBuilder, ShopkeepBuilderError, WithStorage};

/// Re-export core types from shopkeep_core
///
/// These types are commonly used when working with the Shopkeep API.
pub use shopkeep_core::{
    AttemptKey, Error, FailureReason, JwtConfig, LoginAttempt, NewUser, RepositoryProvider,
    Role, Session, SessionIssuer, SessionToken, User, UserId,
    error,
    services::{
        AuditLogConfig, ClientInfo, LoginOutcome, LoginRateLimiter, LoginRequest, LoginResult,
        RateLimitConfig, RateLimitDecision, RegisterRequest,
    },
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use shopkeep_storage_sqlite::SqliteRepositoryProvider;

/// Email of the admin account created on first start.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

/// Password of the admin account created on first start.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Service-level configuration.
///
/// The JWT signing key has no default, so a config is always created from one.
///
/// # Example
///
/// ```rust
/// use shopkeep::{JwtConfig, RateLimitConfig, ShopkeepConfig};
///
/// let config = ShopkeepConfig::new(JwtConfig::new_hs256(b"secret".to_vec()))
///     .with_rate_limit(RateLimitConfig::default().with_max_attempts(10));
/// ```
#[derive(Debug, Clone)]
pub struct ShopkeepConfig {
    pub jwt: JwtConfig,
    pub session_expires_in: Duration,
    pub rate_limit: RateLimitConfig,
    pub audit_log: AuditLogConfig,
}

impl ShopkeepConfig {
    pub fn new(jwt: JwtConfig) -> Self {
        Self {
            jwt,
            session_expires_in: DEFAULT_SESSION_DURATION,
            rate_limit: RateLimitConfig::default(),
            audit_log: AuditLogConfig::default(),
        }
    }

    pub fn with_session_expiry(mut self, expires_in: Duration) -> Self {
        self.session_expires_in = expires_in;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_audit_log(mut self, audit_log: AuditLogConfig) -> Self {
        self.audit_log = audit_log;
        self
    }
}

/// Result of provisioning an admin account.
#[derive(Debug)]
pub enum AdminSetup {
    Created(User),
    /// An account with the requested email was already there and was left untouched.
    AlreadyExists(User),
}

impl AdminSetup {
    pub fn user(&self) -> &User {
        match self {
            AdminSetup::Created(user) | AdminSetup::AlreadyExists(user) => user,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, AdminSetup::Created(_))
    }
}

type Auth<R> =
    AuthService<UserRepositoryAdapter<R>, PasswordRepositoryAdapter<R>, LoginAttemptRepositoryAdapter<R>>;

/// The login service assembled over a storage backend.
///
/// `Shopkeep` owns one [`LoginRateLimiter`]. Its counters live as long as this value; the
/// process entry point is expected to start the sweep task with
/// [`start_sweep_task`](Self::start_sweep_task) and stop it on shutdown.
///
/// # Example
///
/// ```rust,no_run
/// use shopkeep::{JwtConfig, Shopkeep, ShopkeepConfig, SqliteRepositoryProvider};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let repositories = Arc::new(SqliteRepositoryProvider::connect("sqlite::memory:").await?);
///     let config = ShopkeepConfig::new(JwtConfig::new_hs256(b"secret".to_vec()));
///
///     let shopkeep = Shopkeep::new(repositories, config);
///     shopkeep.migrate().await?;
///     shopkeep.seed_default_admin().await?;
///
///     Ok(())
/// }
/// ```
pub struct Shopkeep<R: RepositoryProvider> {
    repositories: Arc<R>,
    user_service: Arc<UserService<UserRepositoryAdapter<R>>>,
    password_service: Arc<PasswordService<UserRepositoryAdapter<R>, PasswordRepositoryAdapter<R>>>,
    attempt_service: Arc<LoginAttemptService<LoginAttemptRepositoryAdapter<R>>>,
    auth_service: Auth<R>,
}

impl<R: RepositoryProvider> Shopkeep<R> {
    /// Create a new Shopkeep instance with a repository provider
    pub fn new(repositories: Arc<R>, config: ShopkeepConfig) -> Self {
        let user_repo = Arc::new(UserRepositoryAdapter::new(repositories.clone()));
        let password_repo = Arc::new(PasswordRepositoryAdapter::new(repositories.clone()));
        let attempt_repo = Arc::new(LoginAttemptRepositoryAdapter::new(repositories.clone()));

        let user_service = Arc::new(UserService::new(user_repo.clone()));
        let password_service = Arc::new(PasswordService::new(user_repo, password_repo));
        let attempt_service = Arc::new(LoginAttemptService::new(attempt_repo, config.audit_log));

        let sessions =
            SessionIssuer::new(config.jwt).with_expires_in(config.session_expires_in);
        let rate_limiter = LoginRateLimiter::new(config.rate_limit);

        let auth_service = AuthService::new(
            user_service.clone(),
            password_service.clone(),
            attempt_service.clone(),
            rate_limiter,
            sessions,
        );

        Self {
            repositories,
            user_service,
            password_service,
            attempt_service,
            auth_service,
        }
    }

    /// Start configuring a Shopkeep instance.
    pub fn builder() -> ShopkeepBuilder<NoStorage> {
        ShopkeepBuilder::new()
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Run one login request. See [`AuthService::login`].
    pub async fn login(&self, request: LoginRequest, client: &ClientInfo) -> LoginResult {
        self.auth_service.login(request, client).await
    }

    /// Register a new admin and issue a session for them.
    pub async fn register(&self, request: RegisterRequest) -> Result<(User, Session), Error> {
        self.auth_service.register(request).await
    }

    /// Resolve a session token to its active user.
    pub async fn current_user(&self, token: &SessionToken) -> Result<User, Error> {
        self.auth_service.current_user(token).await
    }

    /// Get a user by their ID
    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.user_service.get_user(user_id).await
    }

    /// Activate or deactivate an account.
    pub async fn set_user_active(&self, user_id: &UserId, is_active: bool) -> Result<(), Error> {
        self.user_service.set_active(user_id, is_active).await
    }

    /// Replace a user's password.
    pub async fn set_password(&self, user_id: &UserId, password: &str) -> Result<(), Error> {
        self.password_service.set_password(user_id, password).await
    }

    /// The most recent audit records for an email or IP, newest first.
    pub async fn recent_login_attempts(
        &self,
        key: &AttemptKey,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.attempt_service.recent_attempts(key, limit).await
    }

    /// Whether the audit log shows enough recent failures from `ip` to block it.
    pub async fn should_block_ip(&self, ip: &str) -> bool {
        self.attempt_service.should_block_ip(ip).await
    }

    pub fn rate_limiter(&self) -> &LoginRateLimiter {
        self.auth_service.rate_limiter()
    }

    pub fn sessions(&self) -> &SessionIssuer {
        self.auth_service.sessions()
    }

    /// Start the periodic rate limiter sweep. It stops when `shutdown` fires.
    pub fn start_sweep_task(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.rate_limiter().start_sweep_task(shutdown)
    }

    /// Create an admin account unless one with `email` already exists.
    pub async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<AdminSetup, Error> {
        if let Some(existing) = self.user_service.get_user_by_email(email).await? {
            tracing::info!(user_id = %existing.id, email = %existing.email, "Admin user already exists");
            return Ok(AdminSetup::AlreadyExists(existing));
        }

        let new_user = NewUser::builder()
            .email(email.to_string())
            .first_name(first_name.to_string())
            .last_name(last_name.to_string())
            .role(Role::Admin)
            .build()?;

        let user = self.password_service.register_user(new_user, password).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "Admin user created");

        Ok(AdminSetup::Created(user))
    }

    /// Create the well-known default admin when no admin account exists at all.
    ///
    /// Returns the created user, or `None` when an admin was already present.
    pub async fn seed_default_admin(&self) -> Result<Option<User>, Error> {
        if self.user_service.admin_exists().await? {
            return Ok(None);
        }

        let setup = self
            .ensure_admin(DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_PASSWORD, "Admin", "User")
            .await?;

        tracing::warn!(
            email = DEFAULT_ADMIN_EMAIL,
            "Created default admin account with a well-known password; change it immediately"
        );

        Ok(Some(setup.user().clone()))
    }
}
