/// Every failure the authentication subsystem can report to its callers.
///
/// Callers match on the variant, never on the rendered message. Each variant
/// also carries a stable machine-readable [`code`](AuthError::code) that the
/// HTTP layer puts on the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password. The two cases are deliberately
    /// indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address has not been verified")]
    EmailNotVerified,

    #[error("Account has been deactivated")]
    AccountDeactivated,

    #[error("Too many attempts, retry in {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Invalid or expired verification token")]
    InvalidVerificationToken,

    #[error("Current password is incorrect")]
    IncorrectCurrentPassword,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    /// The token's subject no longer resolves to an account.
    #[error("Account not found")]
    AccountNotFound,

    #[error("Insufficient role")]
    InsufficientRole,

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The ephemeral store could not be reached (connection exhausted its
    /// retries, or an operation timed out).
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AuthError::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            AuthError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::ExpiredToken => "TOKEN_EXPIRED",
            AuthError::TokenRevoked => "TOKEN_REVOKED",
            AuthError::SessionNotFound => "SESSION_NOT_FOUND",
            AuthError::InvalidResetToken => "INVALID_RESET_TOKEN",
            AuthError::InvalidVerificationToken => "INVALID_VERIFICATION_TOKEN",
            AuthError::IncorrectCurrentPassword => "INCORRECT_CURRENT_PASSWORD",
            AuthError::EmailAlreadyRegistered => "EMAIL_ALREADY_REGISTERED",
            AuthError::AccountNotFound => "USER_NOT_FOUND",
            AuthError::InsufficientRole => "FORBIDDEN",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::StoreUnavailable(_) => "SERVICE_UNAVAILABLE",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convenience alias for fallible auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
