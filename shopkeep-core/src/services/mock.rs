//! In-memory repositories for service tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error, NewUser, Role, User, UserId,
    error::{AuthError, StorageError},
    login_attempt::{AttemptKey, LoginAttempt, NewLoginAttempt},
    repositories::{LoginAttemptRepository, PasswordRepository, UserRepository},
};

fn unavailable() -> Error {
    Error::Storage(StorageError::Database("storage unavailable".to_string()))
}

#[derive(Default)]
pub struct MockUserRepository {
    users: Mutex<HashMap<UserId, User>>,
    fail_reads: AtomicBool,
}

impl MockUserRepository {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<User, Error> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == new_user.email) {
            return Err(AuthError::UserAlreadyExists.into());
        }
        let user = User::builder()
            .id(new_user.id.clone())
            .email(new_user.email)
            .first_name(new_user.first_name)
            .last_name(new_user.last_name)
            .role(new_user.role)
            .is_active(new_user.is_active)
            .build()?;
        users.insert(new_user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn set_active(&self, id: &UserId, is_active: bool) -> Result<(), Error> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(id).ok_or(StorageError::NotFound)?;
        user.is_active = is_active;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn exists_with_role(&self, role: Role) -> Result<bool, Error> {
        Ok(self.users.lock().unwrap().values().any(|u| u.role == role))
    }
}

#[derive(Default)]
pub struct MockPasswordRepository {
    hashes: Mutex<HashMap<UserId, String>>,
}

#[async_trait]
impl PasswordRepository for MockPasswordRepository {
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.hashes
            .lock()
            .unwrap()
            .insert(user_id.clone(), hash.to_string());
        Ok(())
    }

    async fn get_password_hash(&self, user_id: &UserId) -> Result<Option<String>, Error> {
        Ok(self.hashes.lock().unwrap().get(user_id).cloned())
    }
}

#[derive(Default)]
pub struct MockLoginAttemptRepository {
    attempts: Mutex<Vec<LoginAttempt>>,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    fail_reads: AtomicBool,
    delay: Mutex<Option<std::time::Duration>>,
}

impl MockLoginAttemptRepository {
    pub fn attempts(&self) -> Vec<LoginAttempt> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Insert a record with an explicit timestamp, bypassing the sweep.
    pub fn insert_at(&self, attempt: NewLoginAttempt, created_at: DateTime<Utc>) -> LoginAttempt {
        let mut attempts = self.attempts.lock().unwrap();
        let id = attempts.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        let record = LoginAttempt {
            id,
            email: attempt.email,
            ip_address: attempt.ip_address,
            user_agent: attempt.user_agent,
            success: attempt.success,
            failure_reason: attempt.failure_reason,
            user_id: attempt.user_id,
            created_at,
        };
        attempts.push(record.clone());
        record
    }

    fn matches(attempt: &LoginAttempt, key: &AttemptKey) -> bool {
        match key {
            AttemptKey::Email(email) => &attempt.email == email,
            AttemptKey::IpAddress(ip) => &attempt.ip_address == ip,
        }
    }
}

#[async_trait]
impl LoginAttemptRepository for MockLoginAttemptRepository {
    async fn record(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.insert_at(attempt, Utc::now()))
    }

    async fn count_failures_since(
        &self,
        key: &AttemptKey,
        since: DateTime<Utc>,
    ) -> Result<u64, Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| Self::matches(a, key) && !a.success && a.created_at > since)
            .count() as u64)
    }

    async fn delete_older_than(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut attempts = self.attempts.lock().unwrap();
        let before_len = attempts.len();
        attempts.retain(|a| a.created_at >= before);
        Ok((before_len - attempts.len()) as u64)
    }

    async fn list_recent(&self, key: &AttemptKey, limit: u32) -> Result<Vec<LoginAttempt>, Error> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut matching: Vec<LoginAttempt> = self
            .attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| Self::matches(a, key))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matching.truncate(limit as usize);
        Ok(matching)
    }
}
