//! Repository trait for the login attempt audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    login_attempt::{AttemptKey, LoginAttempt, NewLoginAttempt},
};

/// Append-only storage for login attempts.
///
/// Implementations must index `(email, created_at)` and `(ip_address, created_at)`; every
/// query below filters on one of those pairs.
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Append an attempt. `created_at` is assigned by the repository.
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error>;

    /// Count failed attempts for `key` with `created_at` strictly after `since`.
    async fn count_failures_since(
        &self,
        key: &AttemptKey,
        since: DateTime<Utc>,
    ) -> Result<u64, Error>;

    /// Delete every attempt with `created_at` strictly before `before`.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    async fn delete_older_than(&self, before: DateTime<Utc>) -> Result<u64, Error>;

    /// The most recent attempts for `key`, newest first.
    async fn list_recent(&self, key: &AttemptKey, limit: u32) -> Result<Vec<LoginAttempt>, Error>;
}
