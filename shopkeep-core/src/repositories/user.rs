use crate::{Error, NewUser, Role, User, UserId};
use async_trait::async_trait;

/// Repository for user data access
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Create a new user
    async fn create(&self, user: NewUser) -> Result<User, Error>;

    /// Find a user by ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error>;

    /// Find a user by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Activate or deactivate an account
    async fn set_active(&self, id: &UserId, is_active: bool) -> Result<(), Error>;

    /// Whether at least one user has the given role
    async fn exists_with_role(&self, role: Role) -> Result<bool, Error>;
}
