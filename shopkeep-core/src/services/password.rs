use crate::{
    Error, NewUser, User, UserId,
    error::{AuthError, CryptoError},
    repositories::{PasswordRepository, UserRepository},
    services::UserService,
    validation::validate_password,
};
use std::sync::Arc;

/// Service for password authentication operations
pub struct PasswordService<U: UserRepository, P: PasswordRepository> {
    user_service: Arc<UserService<U>>,
    password_repository: Arc<P>,
}

impl<U: UserRepository, P: PasswordRepository> PasswordService<U, P> {
    /// Create a new PasswordService with the given repositories
    pub fn new(user_repository: Arc<U>, password_repository: Arc<P>) -> Self {
        let user_service = Arc::new(UserService::new(user_repository));
        Self {
            user_service,
            password_repository,
        }
    }

    /// Register a new user with a password
    ///
    /// Fails with [`AuthError::UserAlreadyExists`] when the email is taken; the existing
    /// account's password is left untouched.
    pub async fn register_user(&self, new_user: NewUser, password: &str) -> Result<User, Error> {
        validate_password(password)?;

        if self
            .user_service
            .get_user_by_email(&new_user.email)
            .await?
            .is_some()
        {
            return Err(AuthError::UserAlreadyExists.into());
        }

        let password_hash = Self::hash_password(password);

        let user = self.user_service.create_user(new_user).await?;

        self.password_repository
            .set_password_hash(&user.id, &password_hash)
            .await?;

        tracing::info!(user_id = %user.id, email = %user.email, "Registered user");

        Ok(user)
    }

    /// Check `password` against the stored hash for `user_id`.
    ///
    /// A user without a stored hash never matches.
    pub async fn verify_credentials(&self, user_id: &UserId, password: &str) -> Result<bool, Error> {
        let Some(password_hash) = self.password_repository.get_password_hash(user_id).await? else {
            tracing::warn!(user_id = %user_id, "User has no password hash");
            return Ok(false);
        };

        Self::verify_password(password, &password_hash)
    }

    /// Set a user's password (admin operation, no old password required)
    pub async fn set_password(&self, user_id: &UserId, password: &str) -> Result<(), Error> {
        validate_password(password)?;

        let password_hash = Self::hash_password(password);
        self.password_repository
            .set_password_hash(user_id, &password_hash)
            .await
    }

    /// Hash a password using argon2
    fn hash_password(password: &str) -> String {
        password_auth::generate_hash(password)
    }

    /// Verify a password against a hash. A malformed stored hash is a crypto error.
    fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
        match password_auth::verify_password(password, hash) {
            Ok(()) => Ok(true),
            Err(password_auth::VerifyError::PasswordInvalid) => Ok(false),
            Err(e) => Err(CryptoError::PasswordHash(e.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ValidationError,
        services::mock::{MockPasswordRepository, MockUserRepository},
    };

    fn service() -> (
        PasswordService<MockUserRepository, MockPasswordRepository>,
        Arc<MockPasswordRepository>,
    ) {
        let passwords = Arc::new(MockPasswordRepository::default());
        let service = PasswordService::new(Arc::new(MockUserRepository::default()), passwords.clone());
        (service, passwords)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser::builder()
            .email(email.to_string())
            .first_name("Admin".to_string())
            .last_name("User".to_string())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_and_verify() {
        let (service, passwords) = service();
        let user = service
            .register_user(new_user("admin@example.com"), "admin123")
            .await
            .unwrap();

        let stored = passwords.get_password_hash(&user.id).await.unwrap().unwrap();
        assert_ne!(stored, "admin123");

        assert!(service.verify_credentials(&user.id, "admin123").await.unwrap());
        assert!(!service.verify_credentials(&user.id, "wrong").await.unwrap());
    }

    #[tokio::test]
    async fn test_register_duplicate_email_fails() {
        let (service, _) = service();
        service
            .register_user(new_user("admin@example.com"), "admin123")
            .await
            .unwrap();

        let result = service
            .register_user(new_user("ADMIN@example.com"), "other-password")
            .await;
        assert!(matches!(
            result,
            Err(Error::Auth(AuthError::UserAlreadyExists))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let (service, _) = service();
        let result = service.register_user(new_user("a@example.com"), "12345").await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InvalidPassword(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_hash_never_matches() {
        let (service, _) = service();
        let result = service
            .verify_credentials(&UserId::new_random(), "anything")
            .await
            .unwrap();
        assert!(!result);
    }

    #[tokio::test]
    async fn test_corrupt_hash_is_crypto_error() {
        let (service, passwords) = service();
        let user_id = UserId::new_random();
        passwords.set_password_hash(&user_id, "not-a-phc-string").await.unwrap();

        let result = service.verify_credentials(&user_id, "anything").await;
        assert!(matches!(result, Err(Error::Crypto(CryptoError::PasswordHash(_)))));
    }

    #[tokio::test]
    async fn test_set_password_replaces_hash() {
        let (service, _) = service();
        let user = service
            .register_user(new_user("admin@example.com"), "admin123")
            .await
            .unwrap();

        service.set_password(&user.id, "new-secret").await.unwrap();
        assert!(service.verify_credentials(&user.id, "new-secret").await.unwrap());
        assert!(!service.verify_credentials(&user.id, "admin123").await.unwrap());
    }
}
