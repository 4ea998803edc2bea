//! # Shopkeep Axum Integration
//!
//! Axum routes and middleware for the shopkeep admin login service.
//!
//! | Route                     | Auth | Description                                      |
//! | ------------------------- | ---- | ------------------------------------------------ |
//! | `POST /api/auth/login`    |      | Rate limited login, sets the session cookie      |
//! | `POST /api/auth/register` |      | Create an admin account                          |
//! | `GET /api/auth/me`        | yes  | The signed-in user                               |
//! | `POST /api/auth/logout`   | yes  | Clear the session cookie                         |
//! | `GET /api/health`         |      | Liveness plus a storage ping                     |
//!
//! Every other path answers `404 {"success": false, "message": "Route not found"}`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::{net::SocketAddr, sync::Arc};
//! use shopkeep::{JwtConfig, ShopkeepBuilder};
//! use shopkeep_axum::Environment;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shopkeep = ShopkeepBuilder::new()
//!         .with_sqlite("sqlite://shopkeep.db?mode=rwc")
//!         .await?
//!         .with_jwt(JwtConfig::new_hs256(b"change-me".to_vec()))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let app = shopkeep_axum::routes(Arc::new(shopkeep))
//!         .with_environment(Environment::Production)
//!         .build();
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod extractors;
mod middleware;
mod routes;
mod types;

pub use error::{ACCOUNT_INACTIVE_MESSAGE, ApiError, INVALID_CREDENTIALS_MESSAGE, Result};
pub use extractors::{AuthUser, SessionTokenFromRequest};
pub use middleware::require_auth;
pub use routes::{AppState, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET, create_router};
pub use types::{
    ConnectionInfo, CookieConfig, CookieSameSite, Environment, ErrorResponse, HealthResponse,
    LoginResponse, MessageResponse, RegisterData, RegisterResponse, UserData, UserResponse,
    UserSummary,
};

use axum::Router;
use shopkeep::{RepositoryProvider, Shopkeep};
use std::sync::Arc;

/// Create the login service routes.
///
/// # Example
///
/// ```rust,ignore
/// let app = shopkeep_axum::routes(shopkeep).build();
/// ```
pub fn routes<R>(shopkeep: Arc<Shopkeep<R>>) -> ApiRouterBuilder<R>
where
    R: RepositoryProvider + 'static,
{
    ApiRouterBuilder {
        shopkeep,
        cookie_config: None,
        environment: Environment::default(),
    }
}

/// Builder for configuring the routes
pub struct ApiRouterBuilder<R: RepositoryProvider> {
    shopkeep: Arc<Shopkeep<R>>,
    cookie_config: Option<CookieConfig>,
    environment: Environment,
}

impl<R: RepositoryProvider + 'static> ApiRouterBuilder<R> {
    /// Set custom cookie configuration. Without one, the cookie follows the environment.
    pub fn with_cookie_config(mut self, config: CookieConfig) -> Self {
        self.cookie_config = Some(config);
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Build the router with the configured options
    pub fn build(self) -> Router {
        let cookie_config = self
            .cookie_config
            .unwrap_or_else(|| CookieConfig::for_environment(self.environment));
        create_router(self.shopkeep, cookie_config, self.environment)
    }
}

impl<R: RepositoryProvider + 'static> From<ApiRouterBuilder<R>> for Router {
    fn from(builder: ApiRouterBuilder<R>) -> Self {
        builder.build()
    }
}
