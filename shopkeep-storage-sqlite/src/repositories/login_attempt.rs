//! SQLite implementation of the login attempt audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shopkeep_core::{
    Error, UserId,
    error::StorageError,
    login_attempt::{AttemptKey, FailureReason, LoginAttempt, NewLoginAttempt},
    repositories::LoginAttemptRepository,
};
use sqlx::SqlitePool;

use crate::from_timestamp;

/// SQLite repository for login attempts.
pub struct SqliteLoginAttemptRepository {
    pool: SqlitePool,
}

impl SqliteLoginAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const ATTEMPT_COLUMNS: &str =
    "id, email, ip_address, user_agent, success, failure_reason, user_id, created_at";

#[derive(Debug, sqlx::FromRow)]
struct SqliteLoginAttempt {
    id: i64,
    email: String,
    ip_address: String,
    user_agent: String,
    success: bool,
    failure_reason: Option<String>,
    user_id: Option<String>,
    created_at: i64,
}

impl TryFrom<SqliteLoginAttempt> for LoginAttempt {
    type Error = Error;

    fn try_from(row: SqliteLoginAttempt) -> Result<Self, Self::Error> {
        Ok(LoginAttempt {
            id: row.id,
            email: row.email,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            success: row.success,
            failure_reason: row
                .failure_reason
                .as_deref()
                .map(str::parse::<FailureReason>)
                .transpose()?,
            user_id: row.user_id.map(UserId::from),
            created_at: from_timestamp(row.created_at)?,
        })
    }
}

/// Column and value to filter on for a key. Column names are fixed strings.
fn key_filter(key: &AttemptKey) -> (&'static str, &str) {
    match key {
        AttemptKey::Email(email) => ("email", email.as_str()),
        AttemptKey::IpAddress(ip) => ("ip_address", ip.as_str()),
    }
}

#[async_trait]
impl LoginAttemptRepository for SqliteLoginAttemptRepository {
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let now = Utc::now().timestamp();

        let row = sqlx::query_as::<_, SqliteLoginAttempt>(&format!(
            r#"
            INSERT INTO login_attempts (email, ip_address, user_agent, success, failure_reason, user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(&attempt.email)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(attempt.success)
        .bind(attempt.failure_reason.map(|r| r.as_str()))
        .bind(attempt.user_id.as_ref().map(|id| id.as_str()))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record login attempt");
            StorageError::Database("Failed to record login attempt".to_string())
        })?;

        row.try_into()
    }

    async fn count_failures_since(
        &self,
        key: &AttemptKey,
        since: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let (column, value) = key_filter(key);

        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM login_attempts WHERE {column} = ? AND success = 0 AND created_at > ?"
        ))
        .bind(value)
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to count failed login attempts");
            StorageError::Database("Failed to count failed login attempts".to_string())
        })?;

        Ok(count.max(0) as u64)
    }

    async fn delete_older_than(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE created_at < ?")
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to delete old login attempts");
                StorageError::Database("Failed to delete old login attempts".to_string())
            })?;

        Ok(result.rows_affected())
    }

    async fn list_recent(&self, key: &AttemptKey, limit: u32) -> Result<Vec<LoginAttempt>, Error> {
        let (column, value) = key_filter(key);

        let rows = sqlx::query_as::<_, SqliteLoginAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM login_attempts WHERE {column} = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(value)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list login attempts");
            StorageError::Database("Failed to list login attempts".to_string())
        })?;

        rows.into_iter().map(LoginAttempt::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::tests::setup_test_db;
    use chrono::Duration;

    fn failed(email: &str, ip: &str) -> NewLoginAttempt {
        NewLoginAttempt::failure(email, ip, None, FailureReason::InvalidCredentials, None)
            .unwrap()
    }

    async fn insert_at(pool: &SqlitePool, email: &str, ip: &str, created_at: DateTime<Utc>) {
        sqlx::query(
            "INSERT INTO login_attempts (email, ip_address, user_agent, success, failure_reason, created_at) VALUES (?, ?, 'unknown', 0, 'invalid_credentials', ?)",
        )
        .bind(email)
        .bind(ip)
        .bind(created_at.timestamp())
        .execute(pool)
        .await
        .expect("Failed to insert login attempt");
    }

    #[tokio::test]
    async fn test_record_login_attempt() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);
        let user_id = UserId::new_random();

        let attempt = repo
            .record(
                NewLoginAttempt::success(
                    "admin@example.com",
                    "192.168.1.1",
                    Some("Mozilla/5.0"),
                    user_id.clone(),
                )
                .unwrap(),
            )
            .await
            .unwrap();

        assert!(attempt.id > 0);
        assert!(attempt.success);
        assert!(attempt.failure_reason.is_none());
        assert_eq!(attempt.user_id, Some(user_id));
        assert_eq!(attempt.user_agent, "Mozilla/5.0");
        assert!((Utc::now() - attempt.created_at).num_seconds() < 5);
    }

    #[tokio::test]
    async fn test_record_failure_without_user() {
        let repo = SqliteLoginAttemptRepository::new(setup_test_db().await);

        let attempt = repo.record(failed("nobody@example.com", "10.0.0.5")).await.unwrap();

        assert!(!attempt.success);
        assert_eq!(
            attempt.failure_reason,
            Some(FailureReason::InvalidCredentials)
        );
        assert!(attempt.user_id.is_none());
        assert_eq!(attempt.user_agent, "unknown");
    }

    #[tokio::test]
    async fn test_count_failures_since_by_ip_and_email() {
        let pool = setup_test_db().await;
        let repo = SqliteLoginAttemptRepository::new(pool.clone());

        for _ in 0..3 {
            repo.record(failed("user@example.com", "10.0.0.5")).await.unwrap();
        }
        repo.record(failed("other@example.com", "10.0.0.5")).await.unwrap();
        repo.record(
            NewLoginAttempt::success("user@example.com", "10.0.0.5", None, UserId::new_random())
                .unwrap(),
        )
        .await
        .unwrap();
        insert_at(&pool, "user@example.com", "10.0.0.5", Utc::now() - Duration::hours(2)).await;

        let since = Utc::now() - Duration::hours(1);
        assert_eq!(
            repo.count_failures_since(&AttemptKey::ip("10.0.0.5"), since)
                .await
                .unwrap(),
            4
        );
        assert_eq!(
            repo.count_failures_since(&AttemptKey::email("user@example.com"), since)
                .await
                .unwrap(),
            3
        );
        assert_eq!(
            repo.count_failures_since(&AttemptKey::ip("10.0.0.5"), Utc::now() + Duration::hours(1))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_delete_older_than_removes_expired_records() {
        let pool = setup_test_db().await;
        let repo = SqliteLoginAttemptRepository::new(pool.clone());

        insert_at(&pool, "old@example.com", "10.0.0.1", Utc::now() - Duration::days(31)).await;
        repo.record(failed("new@example.com", "10.0.0.1")).await.unwrap();

        let deleted = repo
            .delete_older_than(Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = repo
            .list_recent(&AttemptKey::ip("10.0.0.1"), 10)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].email, "new@example.com");
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let pool = setup_test_db().await;
        let repo = SqliteLoginAttemptRepository::new(pool.clone());

        insert_at(&pool, "a@example.com", "10.0.0.1", Utc::now() - Duration::days(2)).await;
        insert_at(&pool, "a@example.com", "10.0.0.1", Utc::now() - Duration::days(1)).await;
        repo.record(failed("a@example.com", "10.0.0.1")).await.unwrap();

        let recent = repo
            .list_recent(&AttemptKey::email("a@example.com"), 2)
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].created_at > recent[1].created_at);
    }
}
