//! Login attempt audit log service.
//!
//! Writes never fail the caller. [`LoginAttemptService::log_attempt`] returns an
//! [`AuditWrite`] describing what happened; the login path inspects nothing but is forced by
//! `#[must_use]` to discard it explicitly.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    Error,
    login_attempt::{AttemptKey, LoginAttempt, NewLoginAttempt},
    repositories::LoginAttemptRepository,
};

/// Failures from one IP within this period count towards [`LoginAttemptService::should_block_ip`].
const IP_BLOCK_PERIOD: Duration = Duration::hours(1);
const IP_BLOCK_THRESHOLD: u64 = 5;

/// Configuration for the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditLogConfig {
    /// Records older than this are deleted by the write-triggered sweep.
    pub retention: Duration,
    /// Upper bound on one write, insert and sweep together.
    pub write_timeout: std::time::Duration,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self {
            retention: Duration::days(30),
            write_timeout: std::time::Duration::from_secs(5),
        }
    }
}

impl AuditLogConfig {
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: std::time::Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }
}

/// Outcome of an audit write.
#[must_use = "audit write outcomes must be explicitly discarded"]
#[derive(Debug)]
pub enum AuditWrite {
    Recorded(LoginAttempt),
    Failed(String),
    TimedOut,
}

impl AuditWrite {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditWrite::Recorded(_))
    }

    /// Discard the outcome. Failures were already logged when they happened.
    pub fn ignore(self) {}
}

/// Service for the append-only login attempt log.
pub struct LoginAttemptService<R: LoginAttemptRepository> {
    repository: Arc<R>,
    config: AuditLogConfig,
}

impl<R: LoginAttemptRepository> LoginAttemptService<R> {
    pub fn new(repository: Arc<R>, config: AuditLogConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &AuditLogConfig {
        &self.config
    }

    /// Append an attempt, then delete records past retention.
    ///
    /// Never returns an error. A sweep failure after a successful insert still yields
    /// [`AuditWrite::Recorded`].
    pub async fn log_attempt(&self, attempt: NewLoginAttempt) -> AuditWrite {
        let email = attempt.email.clone();
        let ip_address = attempt.ip_address.clone();

        match tokio::time::timeout(self.config.write_timeout, self.write(attempt)).await {
            Ok(Ok(recorded)) => AuditWrite::Recorded(recorded),
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    email = %email,
                    ip = %ip_address,
                    "Failed to record login attempt"
                );
                AuditWrite::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    email = %email,
                    ip = %ip_address,
                    timeout_ms = self.config.write_timeout.as_millis() as u64,
                    "Timed out recording login attempt"
                );
                AuditWrite::TimedOut
            }
        }
    }

    async fn write(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let recorded = self.repository.record(attempt).await?;

        let before = Utc::now() - self.config.retention;
        match self.repository.delete_older_than(before).await {
            Ok(count) if count > 0 => {
                tracing::debug!(count, "Deleted expired login attempt records");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to delete expired login attempt records");
            }
            _ => {}
        }

        Ok(recorded)
    }

    /// Count failed attempts for `key` after `since`.
    pub async fn count_failures_since(
        &self,
        key: &AttemptKey,
        since: DateTime<Utc>,
    ) -> Result<u64, Error> {
        self.repository.count_failures_since(key, since).await
    }

    /// Whether `ip` has at least 5 failed attempts in the last hour.
    ///
    /// Storage errors are logged and treated as "do not block".
    pub async fn should_block_ip(&self, ip: &str) -> bool {
        let since = Utc::now() - IP_BLOCK_PERIOD;
        match self
            .repository
            .count_failures_since(&AttemptKey::ip(ip), since)
            .await
        {
            Ok(count) => count >= IP_BLOCK_THRESHOLD,
            Err(e) => {
                tracing::warn!(error = %e, ip = %ip, "Failed to count failed login attempts");
                false
            }
        }
    }

    /// The most recent attempts for `key`, newest first.
    pub async fn recent_attempts(
        &self,
        key: &AttemptKey,
        limit: u32,
    ) -> Result<Vec<LoginAttempt>, Error> {
        self.repository.list_recent(key, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        UserId,
        error::StorageError,
        login_attempt::FailureReason,
        services::mock::MockLoginAttemptRepository,
    };

    fn failed(email: &str, ip: &str) -> NewLoginAttempt {
        NewLoginAttempt::failure(email, ip, None, FailureReason::InvalidCredentials, None)
            .unwrap()
    }

    fn service(repo: Arc<MockLoginAttemptRepository>) -> LoginAttemptService<MockLoginAttemptRepository> {
        LoginAttemptService::new(repo, AuditLogConfig::default())
    }

    #[tokio::test]
    async fn test_log_attempt_records() {
        let repo = Arc::new(MockLoginAttemptRepository::default());
        let service = service(repo.clone());

        let outcome = service
            .log_attempt(
                NewLoginAttempt::success("a@b.co", "127.0.0.1", Some("curl"), UserId::new_random())
                    .unwrap(),
            )
            .await;

        match outcome {
            AuditWrite::Recorded(attempt) => {
                assert!(attempt.success);
                assert_eq!(attempt.user_agent, "curl");
            }
            other => panic!("expected recorded, got {other:?}"),
        }
        assert_eq!(repo.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_log_attempt_sweeps_expired_records() {
        let repo = Arc::new(MockLoginAttemptRepository::default());
        repo.insert_at(failed("old@b.co", "10.0.0.1"), Utc::now() - Duration::days(31));
        repo.insert_at(failed("recent@b.co", "10.0.0.1"), Utc::now() - Duration::days(29));
        let service = service(repo.clone());

        service.log_attempt(failed("new@b.co", "10.0.0.1")).await.ignore();

        let emails: Vec<String> = repo.attempts().into_iter().map(|a| a.email).collect();
        assert_eq!(emails, vec!["recent@b.co", "new@b.co"]);
    }

    #[tokio::test]
    async fn test_log_attempt_swallows_storage_errors() {
        let repo = Arc::new(MockLoginAttemptRepository::default());
        repo.fail_writes(true);
        let service = service(repo.clone());

        let outcome = service.log_attempt(failed("a@b.co", "10.0.0.1")).await;
        assert!(matches!(outcome, AuditWrite::Failed(_)));
        assert!(repo.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_failure_still_reports_recorded() {
        let repo = Arc::new(MockLoginAttemptRepository::default());
        repo.fail_deletes(true);
        let service = service(repo.clone());

        let outcome = service.log_attempt(failed("a@b.co", "10.0.0.1")).await;
        assert!(outcome.is_recorded());
    }

    #[tokio::test]
    async fn test_log_attempt_times_out() {
        let repo = Arc::new(MockLoginAttemptRepository::default());
        repo.set_delay(std::time::Duration::from_millis(200));
        let service = LoginAttemptService::new(
            repo,
            AuditLogConfig::default().with_write_timeout(std::time::Duration::from_millis(10)),
        );

        let outcome = service.log_attempt(failed("a@b.co", "10.0.0.1")).await;
        assert!(matches!(outcome, AuditWrite::TimedOut));
    }

    #[tokio::test]
    async fn test_should_block_ip_after_five_failures() {
        let repo = Arc::new(MockLoginAttemptRepository::default());
        let service = service(repo.clone());

        for _ in 0..4 {
            service.log_attempt(failed("a@b.co", "10.0.0.5")).await.ignore();
        }
        assert!(!service.should_block_ip("10.0.0.5").await);

        service.log_attempt(failed("b@b.co", "10.0.0.5")).await.ignore();
        assert!(service.should_block_ip("10.0.0.5").await);
        assert!(!service.should_block_ip("10.0.0.6").await);
    }

    #[tokio::test]
    async fn test_should_block_ip_ignores_old_failures() {
        let repo = Arc::new(MockLoginAttemptRepository::default());
        for _ in 0..5 {
            repo.insert_at(failed("a@b.co", "10.0.0.5"), Utc::now() - Duration::hours(2));
        }
        let service = service(repo);
        assert!(!service.should_block_ip("10.0.0.5").await);
    }

    #[tokio::test]
    async fn test_count_failures_by_email_excludes_successes() {
        let repo = Arc::new(MockLoginAttemptRepository::default());
        let service = service(repo);
        let since = Utc::now() - Duration::minutes(1);

        service.log_attempt(failed("A@b.co", "10.0.0.1")).await.ignore();
        service
            .log_attempt(
                NewLoginAttempt::success("a@b.co", "10.0.0.1", None, UserId::new_random()).unwrap(),
            )
            .await
            .ignore();

        let count = service
            .count_failures_since(&AttemptKey::email("a@b.co"), since)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let recent = service
            .recent_attempts(&AttemptKey::email("a@b.co"), 10)
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].success);
    }

    #[tokio::test]
    async fn test_count_failures_propagates_errors() {
        let repo = Arc::new(MockLoginAttemptRepository::default());
        repo.fail_reads(true);
        let service = service(repo);

        let result = service
            .count_failures_since(&AttemptKey::ip("10.0.0.1"), Utc::now())
            .await;
        assert!(matches!(result, Err(Error::Storage(StorageError::Database(_)))));
        assert!(!service.should_block_ip("10.0.0.1").await);
    }
}
