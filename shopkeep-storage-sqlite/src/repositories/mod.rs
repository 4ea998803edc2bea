//! Repository implementations for SQLite storage

pub mod login_attempt;
pub mod password;
pub mod user;

pub use login_attempt::SqliteLoginAttemptRepository;
pub use password::SqlitePasswordRepository;
pub use user::SqliteUserRepository;

use async_trait::async_trait;
use shopkeep_core::{
    Error,
    error::StorageError,
    repositories::{
        LoginAttemptRepositoryProvider, PasswordRepositoryProvider, RepositoryProvider,
        UserRepositoryProvider,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Repository provider implementation for SQLite
///
/// This struct implements all the individual repository provider traits
/// as well as the unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    user: Arc<SqliteUserRepository>,
    password: Arc<SqlitePasswordRepository>,
    login_attempt: Arc<SqliteLoginAttemptRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let user = Arc::new(SqliteUserRepository::new(pool.clone()));
        let password = Arc::new(SqlitePasswordRepository::new(pool.clone()));
        let login_attempt = Arc::new(SqliteLoginAttemptRepository::new(pool.clone()));

        Self {
            pool,
            user,
            password,
            login_attempt,
        }
    }

    /// Open a pool for `database_url` and wrap it.
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(database_url).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to SQLite database");
            Error::Storage(StorageError::Connection(e.to_string()))
        })?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl UserRepositoryProvider for SqliteRepositoryProvider {
    type UserRepo = SqliteUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.user
    }
}

impl PasswordRepositoryProvider for SqliteRepositoryProvider {
    type PasswordRepo = SqlitePasswordRepository;

    fn password(&self) -> &Self::PasswordRepo {
        &self.password
    }
}

impl LoginAttemptRepositoryProvider for SqliteRepositoryProvider {
    type LoginAttemptRepo = SqliteLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        use crate::migrations::{self, SqliteMigrationManager};
        use shopkeep_migration::MigrationManager;

        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) async fn setup_test_db() -> SqlitePool {
        let provider = SqliteRepositoryProvider::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        provider.migrate().await.expect("Failed to run migrations");
        provider.pool().clone()
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent_and_healthy() {
        let provider = SqliteRepositoryProvider::connect("sqlite::memory:")
            .await
            .unwrap();
        provider.migrate().await.unwrap();
        provider.migrate().await.unwrap();
        provider.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_health_check_fails_when_closed() {
        let provider = SqliteRepositoryProvider::connect("sqlite::memory:")
            .await
            .unwrap();
        provider.pool().close().await;

        assert!(matches!(
            provider.health_check().await,
            Err(Error::Storage(StorageError::Database(_)))
        ));
    }
}
