//! Database-agnostic migration traits.
//!
//! Storage backends implement [`MigrationManager`] for their database and provide an ordered
//! list of [`Migration`]s. Applied versions are tracked in a table owned by the manager.
use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: i64, // unix timestamp
}

/// Check that migration versions are strictly increasing.
///
/// Managers apply migrations in slice order, so an out-of-order list would apply a later
/// schema change before an earlier one.
pub fn ensure_ordered<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<()> {
    for pair in migrations.windows(2) {
        if pair[0].version() >= pair[1].version() {
            return Err(MigrationError::Migration(format!(
                "Migration {} ({}) is not ordered before {} ({})",
                pair[0].name(),
                pair[0].version(),
                pair[1].name(),
                pair[1].version()
            )));
        }
    }
    Ok(())
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        "_shopkeep_migrations"
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Rollback migrations
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Sqlite;

    struct Noop(i64);

    #[async_trait]
    impl Migration<Sqlite> for Noop {
        async fn up<'a>(&'a self, _conn: &'a mut <Sqlite as Database>::Connection) -> Result<()> {
            Ok(())
        }

        async fn down<'a>(&'a self, _conn: &'a mut <Sqlite as Database>::Connection) -> Result<()> {
            Ok(())
        }

        fn version(&self) -> i64 {
            self.0
        }

        fn name(&self) -> &str {
            "Noop"
        }
    }

    #[test]
    fn test_ensure_ordered() {
        let ordered: Vec<Box<dyn Migration<Sqlite>>> = vec![Box::new(Noop(1)), Box::new(Noop(2))];
        assert!(ensure_ordered(&ordered).is_ok());

        let unordered: Vec<Box<dyn Migration<Sqlite>>> =
            vec![Box::new(Noop(2)), Box::new(Noop(1))];
        assert!(matches!(
            ensure_ordered(&unordered),
            Err(MigrationError::Migration(_))
        ));

        let duplicate: Vec<Box<dyn Migration<Sqlite>>> =
            vec![Box::new(Noop(1)), Box::new(Noop(1))];
        assert!(ensure_ordered(&duplicate).is_err());
    }
}
