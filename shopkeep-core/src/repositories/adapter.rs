use crate::{
    Error, NewUser, Role, User, UserId,
    login_attempt::{AttemptKey, LoginAttempt, NewLoginAttempt},
    repositories::{LoginAttemptRepository, PasswordRepository, RepositoryProvider, UserRepository},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Adapter that wraps a RepositoryProvider and implements individual repository traits
pub struct UserRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> UserRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> UserRepository for UserRepositoryAdapter<R> {
    async fn create(&self, user: NewUser) -> Result<User, Error> {
        self.provider.user().create(user).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.provider.user().find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.provider.user().find_by_email(email).await
    }

    async fn set_active(&self, id: &UserId, is_active: bool) -> Result<(), Error> {
        self.provider.user().set_active(id, is_active).await
    }

    async fn exists_with_role(&self, role: Role) -> Result<bool, Error> {
        self.provider.user().exists_with_role(role).await
    }
}

pub struct PasswordRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> PasswordRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> PasswordRepository for PasswordRepositoryAdapter<R> {
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.provider
            .password()
            .set_password_hash(user_id, hash)
            .await
    }

    async fn get_password_hash(&self, user_id: &UserId) -> Result<Option<String>, Error> {
        self.provider.password().get_password_hash(user_id).await
    }
}

pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        self.provider.login_attempt().record(attempt).await
    }

    async fn count_failures_since(
        &self,
        key: &AttemptKey,
        since: DateTime<Utc>,
    ) -> Result<u64, Error> {
        self.provider
            .login_attempt()
            .count_failures_since(key, since)
            .await
    }

    async fn delete_older_than(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.login_attempt().delete_older_than(before).await
    }

    async fn list_recent(&self, key: &AttemptKey, limit: u32) -> Result<Vec<LoginAttempt>, Error> {
        self.provider.login_attempt().list_recent(key, limit).await
    }
}
