//! Session tokens
//!
//! Sessions are stateless HS256 JWTs. A token carries the user id as its subject and expires
//! a fixed duration after issue; nothing is stored server-side.
//!
//! | Claim | Type             | Description                                  |
//! | ----- | ---------------- | -------------------------------------------- |
//! | `sub` | `String`         | The user id the session belongs to.          |
//! | `iat` | `i64`            | Issued at, unix seconds.                     |
//! | `exp` | `i64`            | Expiration, unix seconds.                    |
//! | `iss` | `Option<String>` | Issuer, validated when configured.           |
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    error::{CryptoError, SessionError},
    user::UserId,
};

/// Default session lifetime.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::days(7);

/// A signed session token as handed to clients.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: &str) -> Self {
        SessionToken(token.to_string())
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Tokens are bearer credentials; keep them out of debug logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// JWT claims for session tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject - user ID
    pub sub: String,
    /// Issued at in seconds (as UTC timestamp)
    pub iat: i64,
    /// Expiration time in seconds (as UTC timestamp)
    pub exp: i64,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Configuration for signing and verifying session JWTs
#[derive(Clone)]
pub struct JwtConfig {
    secret_key: Vec<u8>,
    /// Issuer claim
    pub issuer: Option<String>,
}

impl JwtConfig {
    /// Create a new JWT configuration with HS256 algorithm
    pub fn new_hs256(secret_key: impl Into<Vec<u8>>) -> Self {
        Self {
            secret_key: secret_key.into(),
            issuer: None,
        }
    }

    /// Create a JWT configuration with a random HS256 secret key.
    ///
    /// Tokens signed with it do not survive a restart.
    pub fn new_random_hs256() -> Self {
        use rand::RngCore;

        let mut secret_key = vec![0u8; 32];
        rand::rng().fill_bytes(&mut secret_key);
        Self::new_hs256(secret_key)
    }

    /// Set the issuer claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn jwt_algorithm(&self) -> Algorithm {
        Algorithm::HS256
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret_key)
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret_key)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.jwt_algorithm());
        validation.leeway = 0;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("algorithm", &self.jwt_algorithm())
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

/// An issued or verified session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    fn from_claims(token: SessionToken, claims: &JwtClaims) -> Self {
        let now = Utc::now();
        Self {
            token,
            user_id: UserId::new(&claims.sub),
            issued_at: DateTime::from_timestamp(claims.iat, 0).unwrap_or(now),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(now),
        }
    }
}

/// Issues and verifies session tokens.
#[derive(Debug, Clone)]
pub struct SessionIssuer {
    config: JwtConfig,
    expires_in: Duration,
}

impl SessionIssuer {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config,
            expires_in: DEFAULT_SESSION_DURATION,
        }
    }

    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Sign a new session for `user_id`.
    pub fn issue(&self, user_id: &UserId) -> Result<Session, Error> {
        self.issue_at(user_id, Utc::now())
    }

    /// Sign a session as if issued at `now`.
    pub fn issue_at(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Session, Error> {
        let claims = JwtClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.expires_in).timestamp(),
            iss: self.config.issuer.clone(),
        };

        let header = Header::new(self.config.jwt_algorithm());
        let token = encode(&header, &claims, &self.config.encoding_key())
            .map_err(|e| CryptoError::JwtSigning(e.to_string()))?;

        Ok(Session::from_claims(SessionToken(token), &claims))
    }

    /// Verify a token's signature and expiry.
    pub fn verify(&self, token: &SessionToken) -> Result<Session, Error> {
        let data = decode::<JwtClaims>(
            token.as_str(),
            &self.config.decoding_key(),
            &self.config.validation(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::InvalidToken(e.to_string()),
        })?;

        Ok(Session::from_claims(token.clone(), &data.claims))
    }
}
