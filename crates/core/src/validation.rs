//! Input normalization and password policy.

use crate::error::AuthError;

/// Minimum accepted password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum accepted password length in characters.
pub const MAX_PASSWORD_LENGTH: usize = 100;

/// Normalize an email address for lookup and storage (trimmed, lowercase).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate that a new password meets the strength policy.
///
/// The password must be 8-100 characters long and contain at least one
/// letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters long"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AuthError::Validation(
            "Password must contain at least one letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::Validation(
            "Password must contain at least one number".into(),
        ));
    }
    Ok(())
}
