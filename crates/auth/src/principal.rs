//! The authenticated caller of a request.

use gatekeep_core::error::{AuthError, AuthResult};
use gatekeep_core::types::DbId;

/// Identity and authorization facts established once per request.
///
/// Built by [`RequestGuard`](crate::guard::RequestGuard) from a verified
/// access token and the current account row. Fields are read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user_id: DbId,
    email: String,
    role: String,
    npo_id: Option<DbId>,
    email_verified: bool,
    token_id: String,
    session_id: Option<String>,
    token_expires_at: i64,
}

impl Principal {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        user_id: DbId,
        email: String,
        role: String,
        npo_id: Option<DbId>,
        email_verified: bool,
        token_id: String,
        session_id: Option<String>,
        token_expires_at: i64,
    ) -> Self {
        Self {
            user_id,
            email,
            role,
            npo_id,
            email_verified,
            token_id,
            session_id,
            token_expires_at,
        }
    }

    pub fn user_id(&self) -> DbId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Role name resolved from the account at authentication time.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Organization the caller is scoped to, if any.
    pub fn npo_id(&self) -> Option<DbId> {
        self.npo_id
    }

    pub fn email_verified(&self) -> bool {
        self.email_verified
    }

    /// `jti` of the access token that authenticated this request.
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// `jti` of the refresh token (session) the access token was issued under.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// `exp` of the access token (Unix seconds).
    pub fn token_expires_at(&self) -> i64 {
        self.token_expires_at
    }

    /// Fail with [`AuthError::InsufficientRole`] unless the role is in `allowed`.
    pub fn require_role(&self, allowed: &[&str]) -> AuthResult<()> {
        if allowed.contains(&self.role.as_str()) {
            Ok(())
        } else {
            Err(AuthError::InsufficientRole)
        }
    }

    /// Fail with [`AuthError::EmailNotVerified`] unless the email is verified.
    pub fn require_verified(&self) -> AuthResult<()> {
        if self.email_verified {
            Ok(())
        } else {
            Err(AuthError::EmailNotVerified)
        }
    }
}
