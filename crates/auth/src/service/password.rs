//! Password reset and password change.

use std::sync::Arc;

use gatekeep_core::error::{AuthError, AuthResult};
use gatekeep_core::hashing::{generate_secret_token, sha256_hex};
use gatekeep_core::types::DbId;
use gatekeep_core::validation::{normalize_email, validate_password_strength};

use super::AuthComponents;
use crate::accounts::AccountStore;
use crate::audit::{self, AuditEvent};
use crate::mailer::{MailKind, Mailer};
use crate::password::PasswordHasher;
use crate::sessions::SessionManager;
use crate::store::{EphemeralStore, OneTimeTokenKind};

#[derive(Clone)]
pub struct PasswordService {
    accounts: Arc<dyn AccountStore>,
    store: Arc<dyn EphemeralStore>,
    mailer: Arc<dyn Mailer>,
    hasher: Arc<PasswordHasher>,
    sessions: SessionManager,
}

impl PasswordService {
    pub fn new(components: &AuthComponents) -> Self {
        Self {
            accounts: components.accounts.clone(),
            store: components.store.clone(),
            mailer: components.mailer.clone(),
            hasher: components.hasher.clone(),
            sessions: components.sessions(),
        }
    }

    /// Start a password reset for `email`.
    ///
    /// Never fails and never reveals whether the address is registered:
    /// lookup and store failures are logged and swallowed. Only the SHA-256
    /// digest of the emailed token is stored.
    pub async fn request_reset(&self, email: &str) {
        let email = normalize_email(email);
        let found = match self.issue_reset_token(&email).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(error = %e, "Password reset request failed");
                false
            }
        };
        audit::record(&AuditEvent::PasswordResetRequested {
            email: &email,
            found,
        });
    }

    async fn issue_reset_token(&self, email: &str) -> AuthResult<bool> {
        let Some(account) = self.accounts.find_by_email(email).await? else {
            return Ok(false);
        };

        let token = generate_secret_token();
        let kind = OneTimeTokenKind::PasswordReset;
        self.store
            .put_one_time_token(kind, &sha256_hex(token.as_bytes()), account.id, kind.ttl())
            .await?;

        let name = format!("{} {}", account.first_name, account.last_name);
        if let Err(e) = self
            .mailer
            .send(MailKind::PasswordReset, &account.email, &name, &token)
            .await
        {
            tracing::warn!(error = %e, user_id = %account.id, "Reset email delivery failed");
        }
        Ok(true)
    }

    /// Redeem a reset token and set a new password.
    ///
    /// Every session of the account is revoked afterwards.
    pub async fn confirm_reset(&self, token: &str, new_password: &str) -> AuthResult<()> {
        validate_password_strength(new_password)?;

        let user_id = self
            .store
            .consume_one_time_token(OneTimeTokenKind::PasswordReset, &sha256_hex(token.as_bytes()))
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        let hash = self.hash(new_password)?;
        self.accounts.update_password_hash(user_id, &hash).await?;
        self.sessions.close_all(user_id, None, "password_reset").await?;

        audit::record(&AuditEvent::PasswordResetCompleted { user_id });
        Ok(())
    }

    /// Change the password of a signed-in user.
    ///
    /// Every other session is revoked; the session identified by
    /// `current_token_id` (a refresh token `jti`) stays usable.
    pub async fn change_password(
        &self,
        user_id: DbId,
        current_password: &str,
        new_password: &str,
        current_token_id: Option<&str>,
    ) -> AuthResult<()> {
        let account = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let matches = self
            .hasher
            .verify(current_password, &account.password_hash)
            .map_err(|e| {
                tracing::error!(error = %e, %user_id, "Stored password hash unusable");
                AuthError::Internal("password verification failed".into())
            })?;
        if !matches {
            return Err(AuthError::IncorrectCurrentPassword);
        }
        validate_password_strength(new_password)?;

        let hash = self.hash(new_password)?;
        self.accounts.update_password_hash(user_id, &hash).await?;
        self.sessions
            .close_all(user_id, current_token_id, "password_change")
            .await?;

        audit::record(&AuditEvent::PasswordChanged { user_id });
        Ok(())
    }

    fn hash(&self, password: &str) -> AuthResult<String> {
        self.hasher.hash(password).map_err(|e| {
            tracing::error!(error = %e, "Password hashing failed");
            AuthError::Internal("password hashing failed".into())
        })
    }
}
