//! SQLite storage backend for shopkeep
//!
//! [`SqliteRepositoryProvider`] implements every repository trait from `shopkeep-core` over a
//! single [`SqlitePool`]. Timestamps are stored as unix seconds.
//!
//! ```rust,no_run
//! use shopkeep_core::RepositoryProvider;
//! use shopkeep_storage_sqlite::SqliteRepositoryProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = SqliteRepositoryProvider::connect("sqlite::memory:").await?;
//! provider.migrate().await?;
//! # Ok(())
//! # }
//! ```
mod migrations;
pub mod repositories;

pub use repositories::{
    SqliteLoginAttemptRepository, SqlitePasswordRepository, SqliteRepositoryProvider,
    SqliteUserRepository,
};
pub use sqlx::SqlitePool;

use chrono::{DateTime, Utc};
use shopkeep_core::{Error, error::StorageError};

/// Convert a stored unix timestamp, rejecting values chrono cannot represent.
pub(crate) fn from_timestamp(timestamp: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| {
        Error::Storage(StorageError::Database(format!(
            "Invalid timestamp in database: {timestamp}"
        )))
    })
}
