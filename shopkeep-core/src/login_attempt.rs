//! Login attempt audit records
//!
//! Every login request that gets past the rate limiter and input validation produces exactly
//! one [`LoginAttempt`]. Records are append-only; the only mutation is the retention sweep
//! which deletes whole rows older than the configured retention.
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, UserId, error::ValidationError, validation::normalize_email};

pub const UNKNOWN_USER_AGENT: &str = "unknown";

/// Why a login attempt failed.
///
/// A successful attempt has no failure reason (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidCredentials,
    /// Reserved. No lockout policy exists, so nothing records this value.
    AccountLocked,
    AccountInactive,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidCredentials => "invalid_credentials",
            FailureReason::AccountLocked => "account_locked",
            FailureReason::AccountInactive => "account_inactive",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invalid_credentials" => Ok(FailureReason::InvalidCredentials),
            "account_locked" => Ok(FailureReason::AccountLocked),
            "account_inactive" => Ok(FailureReason::AccountInactive),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown failure reason: {other}"
            ))),
        }
    }
}

/// Which index a per-subject query should use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttemptKey {
    Email(String),
    IpAddress(String),
}

impl AttemptKey {
    /// Key on an email address, normalized the same way records are.
    pub fn email(email: &str) -> Self {
        AttemptKey::Email(normalize_email(email))
    }

    pub fn ip(ip_address: impl Into<String>) -> Self {
        AttemptKey::IpAddress(ip_address.into())
    }
}

/// A persisted login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttempt {
    pub id: i64,
    pub email: String,
    pub ip_address: String,
    pub user_agent: String,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// A login attempt that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoginAttempt {
    pub email: String,
    pub ip_address: String,
    pub user_agent: String,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub user_id: Option<UserId>,
}

impl NewLoginAttempt {
    pub fn builder() -> NewLoginAttemptBuilder {
        NewLoginAttemptBuilder::default()
    }

    /// A failed attempt. `user_id` is `None` when the email matched no account.
    pub fn failure(
        email: &str,
        ip_address: &str,
        user_agent: Option<&str>,
        reason: FailureReason,
        user_id: Option<UserId>,
    ) -> Result<Self, Error> {
        let mut builder = NewLoginAttempt::builder()
            .email(email.to_string())
            .ip_address(ip_address.to_string())
            .success(false)
            .failure_reason(reason);
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent.to_string());
        }
        if let Some(user_id) = user_id {
            builder = builder.user_id(user_id);
        }
        builder.build()
    }

    pub fn success(
        email: &str,
        ip_address: &str,
        user_agent: Option<&str>,
        user_id: UserId,
    ) -> Result<Self, Error> {
        let mut builder = NewLoginAttempt::builder()
            .email(email.to_string())
            .ip_address(ip_address.to_string())
            .success(true)
            .user_id(user_id);
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent.to_string());
        }
        builder.build()
    }
}

#[derive(Default)]
pub struct NewLoginAttemptBuilder {
    email: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    success: Option<bool>,
    failure_reason: Option<FailureReason>,
    user_id: Option<UserId>,
}

impl NewLoginAttemptBuilder {
    pub fn email(mut self, email: String) -> Self {
        self.email = Some(email);
        self
    }

    pub fn ip_address(mut self, ip_address: String) -> Self {
        self.ip_address = Some(ip_address);
        self
    }

    pub fn user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn failure_reason(mut self, failure_reason: FailureReason) -> Self {
        self.failure_reason = Some(failure_reason);
        self
    }

    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn build(self) -> Result<NewLoginAttempt, Error> {
        let email = self.email.ok_or(ValidationError::MissingField(
            "Email is required".to_string(),
        ))?;
        let ip_address = self.ip_address.ok_or(ValidationError::MissingField(
            "IP address is required".to_string(),
        ))?;
        let success = self.success.ok_or(ValidationError::MissingField(
            "Attempt outcome is required".to_string(),
        ))?;

        match (success, self.failure_reason) {
            (true, Some(reason)) => {
                return Err(ValidationError::InvalidField(format!(
                    "Successful attempt cannot have failure reason {reason}"
                ))
                .into());
            }
            (false, None) => {
                return Err(ValidationError::MissingField(
                    "Failed attempt requires a failure reason".to_string(),
                )
                .into());
            }
            _ => {}
        }

        let user_agent = self
            .user_agent
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_USER_AGENT.to_string());

        Ok(NewLoginAttempt {
            email: normalize_email(&email),
            ip_address,
            user_agent,
            success,
            failure_reason: self.failure_reason,
            user_id: self.user_id,
        })
    }
}
