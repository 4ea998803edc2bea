use async_trait::async_trait;
use sqlx::SqlitePool;
use shopkeep_core::{
    Error, NewUser, Role, User, UserId,
    error::{AuthError, StorageError},
    repositories::UserRepository,
};

use crate::from_timestamp;

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, role, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SqliteUser {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    is_active: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SqliteUser> for User {
    type Error = Error;

    fn try_from(row: SqliteUser) -> Result<Self, Self::Error> {
        User::builder()
            .id(UserId::new(&row.id))
            .email(row.email)
            .first_name(row.first_name)
            .last_name(row.last_name)
            .role(row.role.parse::<Role>()?)
            .is_active(row.is_active)
            .created_at(from_timestamp(row.created_at)?)
            .updated_at(from_timestamp(row.updated_at)?)
            .build()
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        let now = chrono::Utc::now().timestamp();

        let row = sqlx::query_as::<_, SqliteUser>(&format!(
            r#"
            INSERT INTO users (id, email, first_name, last_name, role, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                return Error::Auth(AuthError::UserAlreadyExists);
            }
            tracing::error!(error = %e, "Failed to create user");
            Error::Storage(StorageError::Database("Failed to create user".to_string()))
        })?;

        row.try_into()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        let row = sqlx::query_as::<_, SqliteUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to find user by id");
            StorageError::Database("Failed to find user".to_string())
        })?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let row = sqlx::query_as::<_, SqliteUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to find user by email");
            StorageError::Database("Failed to find user".to_string())
        })?;

        row.map(User::try_from).transpose()
    }

    async fn set_active(&self, id: &UserId, is_active: bool) -> Result<(), Error> {
        let result = sqlx::query("UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(is_active)
            .bind(chrono::Utc::now().timestamp())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to update user active flag");
                StorageError::Database("Failed to update user".to_string())
            })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound.into());
        }
        Ok(())
    }

    async fn exists_with_role(&self, role: Role) -> Result<bool, Error> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = ?1)")
                .bind(role.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to check for users by role");
                    StorageError::Database("Failed to check for users".to_string())
                })?;

        Ok(exists)
    }
}
