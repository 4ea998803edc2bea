//! Service layer for business logic
//!
//! This module contains concrete service implementations that encapsulate
//! login, audit and user management logic.

pub mod auth;
pub mod login_attempt;
pub mod password;
pub mod rate_limit;
pub mod user;

#[cfg(test)]
pub(crate) mod mock;

pub use auth::{AuthService, ClientInfo, LoginOutcome, LoginRequest, LoginResult, RegisterRequest};
pub use login_attempt::{AuditLogConfig, AuditWrite, LoginAttemptService};
pub use password::PasswordService;
pub use rate_limit::{LoginRateLimiter, RateLimitConfig, RateLimitCounter, RateLimitDecision};
pub use user::UserService;
