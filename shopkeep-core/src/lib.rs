//! Core functionality for the shopkeep admin login service
//!
//! This crate contains the domain types (users, login attempts, sessions), the error
//! taxonomy, input validation, the repository traits storage backends implement, and the
//! services that orchestrate a login request.
//!
//! The interesting pieces are:
//!
//! - [`LoginRateLimiter`](services::LoginRateLimiter): an in-memory, per-IP sliding-window
//!   gate evaluated before any database work on the login path.
//! - [`LoginAttemptService`](services::LoginAttemptService): the append-only audit log of
//!   every login attempt, with a write-triggered 30 day retention sweep.
//! - [`AuthService`](services::AuthService): the per-request login state machine.
//!
//! Storage backends implement the traits in [`repositories`] and are not intended to be
//! used directly by application code; see the `shopkeep` crate for the assembled facade.
pub mod error;
pub mod id;
pub mod login_attempt;
pub mod repositories;
pub mod services;
pub mod session;
pub mod user;
pub mod validation;

pub use error::Error;
pub use login_attempt::{AttemptKey, FailureReason, LoginAttempt, NewLoginAttempt};
pub use repositories::RepositoryProvider;
pub use session::{JwtClaims, JwtConfig, Session, SessionIssuer, SessionToken};
pub use user::{NewUser, Role, User, UserId};
