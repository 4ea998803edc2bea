//! Request input validation
//!
//! Single source of truth for the rules applied to login and registration bodies. Rules
//! collect every failing field into a [`ValidationError::Fields`] so clients get the full
//! list in one response.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{FieldError, ValidationError};

/// Practical subset of RFC 5322, loaded once and reused.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_NAME_LENGTH: usize = 50;
const MAX_EMAIL_LENGTH: usize = 254;

pub const INVALID_EMAIL_MESSAGE: &str = "Please provide a valid email address";
pub const PASSWORD_REQUIRED_MESSAGE: &str = "Password is required";

/// Trim and lowercase an email address. Stored emails and lookups both go through here.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates an email address
///
/// ```rust
/// use shopkeep_core::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("invalid-email").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::MissingField(
            "Email is required".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(
            "Email is too long".to_string(),
        ));
    }

    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(format!(
            "Invalid email format: {email}"
        )))
    }
}

/// Validates a new password. Existing passwords are never re-validated on login.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::MissingField(
            PASSWORD_REQUIRED_MESSAGE.to_string(),
        ));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }

    Ok(())
}

/// Validates a person name after trimming; `field` is the client-facing field name.
pub fn validate_name(field: &str, name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length == 0 || length > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "{field} must be between 1 and {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Accumulates field errors across several rules.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Record a rule failure under `field`, replacing the rule's own message.
    pub fn check(&mut self, field: &str, result: Result<(), ValidationError>, message: &str) {
        if result.is_err() {
            self.push(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(self.errors))
        }
    }
}

/// Login body rules: a valid email and a present password.
pub fn validate_login(email: Option<&str>, password: Option<&str>) -> Result<(), ValidationError> {
    let mut errors = FieldErrors::new();

    match email {
        Some(email) => errors.check("email", validate_email(email), INVALID_EMAIL_MESSAGE),
        None => errors.push("email", INVALID_EMAIL_MESSAGE),
    }
    if password.is_none() {
        errors.push("password", PASSWORD_REQUIRED_MESSAGE);
    }

    errors.into_result()
}

/// Registration body rules.
pub fn validate_registration(
    email: Option<&str>,
    password: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<(), ValidationError> {
    let mut errors = FieldErrors::new();

    match email {
        Some(email) => errors.check("email", validate_email(email), INVALID_EMAIL_MESSAGE),
        None => errors.push("email", INVALID_EMAIL_MESSAGE),
    }

    let password_message =
        format!("Password must be at least {MIN_PASSWORD_LENGTH} characters long");
    match password {
        Some(password) => errors.check("password", validate_password(password), &password_message),
        None => errors.push("password", password_message.clone()),
    }

    for (field, value) in [("firstName", first_name), ("lastName", last_name)] {
        let result = validate_name(field, value.unwrap_or_default());
        if let Err(ValidationError::InvalidName(message)) = result {
            errors.push(field, message);
        }
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Admin@Example.COM  "), "admin@example.com");
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("  user@example.com ").is_ok());
        assert!(validate_email("user.name+tag@domain.co.uk").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
    }

    #[test]
    fn test_validate_password_minimum_length() {
        assert!(validate_password("admin123").is_ok());
        assert!(validate_password("123456").is_ok());
        assert!(matches!(
            validate_password("12345"),
            Err(ValidationError::InvalidPassword(_))
        ));
        assert!(matches!(
            validate_password(""),
            Err(ValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_validate_name_bounds() {
        assert!(validate_name("firstName", "Ada").is_ok());
        assert!(validate_name("firstName", &"a".repeat(50)).is_ok());
        assert!(validate_name("firstName", &"a".repeat(51)).is_err());
        assert!(validate_name("firstName", "   ").is_err());
    }

    #[test]
    fn test_validate_login_collects_all_fields() {
        let err = validate_login(Some("not-an-email"), None).unwrap_err();
        let fields = err.field_errors();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], FieldError::new("email", INVALID_EMAIL_MESSAGE));
        assert_eq!(fields[1], FieldError::new("password", PASSWORD_REQUIRED_MESSAGE));
    }

    #[test]
    fn test_validate_login_accepts_any_present_password() {
        assert!(validate_login(Some("user@example.com"), Some("")).is_ok());
    }

    #[test]
    fn test_validate_registration() {
        assert!(
            validate_registration(
                Some("new@example.com"),
                Some("secret1"),
                Some("Ada"),
                Some("Lovelace")
            )
            .is_ok()
        );

        let err = validate_registration(Some("new@example.com"), Some("short"), Some(""), None)
            .unwrap_err();
        let fields: Vec<String> = err.field_errors().into_iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["password", "firstName", "lastName"]);
    }
}
