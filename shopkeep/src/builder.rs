//! Builder pattern for constructing Shopkeep instances
//!
//! This module provides a type-safe builder for creating [`Shopkeep`] instances with
//! compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use shopkeep::{JwtConfig, ShopkeepBuilder};
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
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use shopkeep_core::{
    JwtConfig, RepositoryProvider,
    services::{AuditLogConfig, RateLimitConfig},
    session::DEFAULT_SESSION_DURATION,
};

use crate::{Shopkeep, ShopkeepConfig};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building a Shopkeep instance.
#[derive(Debug, thiserror::Error)]
pub enum ShopkeepBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no storage has been configured yet.
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing [`Shopkeep`] instances.
///
/// Storage must be configured before the builder can be finished, and
/// [`build`](ShopkeepBuilder::build) fails unless a JWT signing key was provided.
pub struct ShopkeepBuilder<Storage> {
    storage: Storage,
    jwt: Option<JwtConfig>,
    session_expires_in: Duration,
    rate_limit: RateLimitConfig,
    audit_log: AuditLogConfig,
    apply_migrations: bool,
}

impl Default for ShopkeepBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl ShopkeepBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Session expiry: 7 days
    /// - Rate limit: 5 attempts per IP per 15 minutes
    /// - Audit retention: 30 days, 5 second write timeout
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            jwt: None,
            session_expires_in: DEFAULT_SESSION_DURATION,
            rate_limit: RateLimitConfig::default(),
            audit_log: AuditLogConfig::default(),
            apply_migrations: false,
        }
    }

    /// Use an already constructed repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> ShopkeepBuilder<WithStorage<R>> {
        ShopkeepBuilder {
            storage: WithStorage { repositories },
            jwt: self.jwt,
            session_expires_in: self.session_expires_in,
            rate_limit: self.rate_limit,
            audit_log: self.audit_log,
            apply_migrations: self.apply_migrations,
        }
    }
}

// ============================================================================
// Storage Configuration Methods (NoStorage -> WithStorage)
// ============================================================================

#[cfg(feature = "sqlite")]
impl ShopkeepBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://shopkeep.db?mode=rwc")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<ShopkeepBuilder<WithStorage<crate::SqliteRepositoryProvider>>, ShopkeepBuilderError>
    {
        let repositories = crate::SqliteRepositoryProvider::connect(url)
            .await
            .map_err(|e| ShopkeepBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_repositories(Arc::new(repositories)))
    }
}

// ============================================================================
// Configuration Methods (available after storage is configured)
// ============================================================================

impl<R: RepositoryProvider> ShopkeepBuilder<WithStorage<R>> {
    /// Set the key sessions are signed with. Required.
    pub fn with_jwt(mut self, config: JwtConfig) -> Self {
        self.jwt = Some(config);
        self
    }

    /// Set the session expiration duration.
    ///
    /// Default: 7 days
    pub fn with_session_expiry(mut self, duration: Duration) -> Self {
        self.session_expires_in = duration;
        self
    }

    /// Configure the per-IP login rate limiter.
    pub fn with_rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Configure retention and write timeout of the login attempt log.
    pub fn with_audit_log(mut self, config: AuditLogConfig) -> Self {
        self.audit_log = config;
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Build the Shopkeep instance.
    ///
    /// If `apply_migrations(true)` was called, migrations will be applied before returning.
    pub async fn build(self) -> Result<Shopkeep<R>, ShopkeepBuilderError> {
        let jwt = self.jwt.ok_or_else(|| {
            ShopkeepBuilderError::InvalidConfiguration("a JWT signing key is required".to_string())
        })?;

        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| ShopkeepBuilderError::Migration(e.to_string()))?;
        }

        let config = ShopkeepConfig::new(jwt)
            .with_session_expiry(self.session_expires_in)
            .with_rate_limit(self.rate_limit)
            .with_audit_log(self.audit_log);

        Ok(Shopkeep::new(self.storage.repositories, config))
    }
}
