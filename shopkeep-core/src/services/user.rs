use crate::{
    Error, NewUser, Role, User, UserId,
    repositories::UserRepository,
    validation::{normalize_email, validate_email},
};
use std::sync::Arc;

/// Service for user management operations
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
}

impl<R: UserRepository> UserService<R> {
    /// Create a new UserService with the given repository
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Create a new user. The email is validated and normalized; names are trimmed.
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, Error> {
        validate_email(&new_user.email)?;

        let new_user = NewUser {
            email: normalize_email(&new_user.email),
            first_name: new_user.first_name.trim().to_string(),
            last_name: new_user.last_name.trim().to_string(),
            ..new_user
        };

        self.repository.create(new_user).await
    }

    /// Get a user by ID
    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.repository.find_by_id(user_id).await
    }

    /// Get a user by email, in any casing
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.repository
            .find_by_email(&normalize_email(email))
            .await
    }

    /// Activate or deactivate a user
    pub async fn set_active(&self, user_id: &UserId, is_active: bool) -> Result<(), Error> {
        self.repository.set_active(user_id, is_active).await
    }

    /// Whether any admin account exists
    pub async fn admin_exists(&self) -> Result<bool, Error> {
        self.repository.exists_with_role(Role::Admin).await
    }
}
