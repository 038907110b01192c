//! Login, logout, token refresh, registration and session management.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gatekeep_core::error::{AuthError, AuthResult};
use gatekeep_core::hashing::generate_secret_token;
use gatekeep_core::types::DbId;
use gatekeep_core::validation::{normalize_email, validate_password_strength};
use gatekeep_db::models::session::Session;

use super::{AuthComponents, UserProfile};
use crate::accounts::{Account, AccountStore, NewAccount};
use crate::audit::{self, AuditEvent};
use crate::jwt::{Expiry, ExtraClaims, TokenCodec, TokenType};
use crate::mailer::{MailKind, Mailer};
use crate::password::PasswordHasher;
use crate::sessions::{ClientMeta, SessionManager};
use crate::store::{EphemeralStore, OneTimeTokenKind};

/// The only token type this service issues to clients.
pub const BEARER: &str = "bearer";

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub client: ClientMeta,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub session_id: DbId,
    pub user: UserProfile,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// Identifies the access token presented alongside a logout.
#[derive(Debug, Clone)]
pub struct PresentedAccessToken {
    pub token_id: String,
    /// Unix timestamp of the token's `exp` claim.
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    store: Arc<dyn EphemeralStore>,
    mailer: Arc<dyn Mailer>,
    codec: Arc<TokenCodec>,
    hasher: Arc<PasswordHasher>,
    sessions: SessionManager,
}

impl AuthService {
    pub fn new(components: &AuthComponents) -> Self {
        Self {
            accounts: components.accounts.clone(),
            store: components.store.clone(),
            mailer: components.mailer.clone(),
            codec: components.codec.clone(),
            hasher: components.hasher.clone(),
            sessions: components.sessions(),
        }
    }

    // ------------------------------------------------------------------
    // Login / logout / refresh
    // ------------------------------------------------------------------

    /// Authenticate with email and password and open a new session.
    ///
    /// Unknown email and wrong password both fail with
    /// [`AuthError::InvalidCredentials`]. Account flags are checked only
    /// after the password matched.
    pub async fn login(&self, request: LoginRequest) -> AuthResult<LoginOutcome> {
        let email = normalize_email(&request.email);
        let ip = request.client.ip.as_deref();

        // 1. Credential check.
        let Some(account) = self.accounts.find_by_email(&email).await? else {
            audit::record(&AuditEvent::LoginFailed {
                email: &email,
                ip,
                reason: "user_not_found",
            });
            return Err(AuthError::InvalidCredentials);
        };

        let password_ok = self
            .hasher
            .verify(&request.password, &account.password_hash)
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %account.id, "Stored password hash unusable");
                AuthError::Internal("password verification failed".into())
            })?;
        if !password_ok {
            audit::record(&AuditEvent::LoginFailed {
                email: &email,
                ip,
                reason: "invalid_password",
            });
            return Err(AuthError::InvalidCredentials);
        }

        // 2. Account state.
        if !account.email_verified {
            audit::record(&AuditEvent::LoginFailed {
                email: &email,
                ip,
                reason: "email_not_verified",
            });
            return Err(AuthError::EmailNotVerified);
        }
        if !account.is_active {
            audit::record(&AuditEvent::LoginFailed {
                email: &email,
                ip,
                reason: "account_deactivated",
            });
            return Err(AuthError::AccountDeactivated);
        }

        // 3. Tokens and session, ledger first.
        let pair = self.codec.issue_pair(
            account.id,
            Some(account.email.clone()),
            Some(account.role.clone()),
        )?;
        let session = self
            .sessions
            .open(account.id, &pair.refresh.claims, &request.client)
            .await?;

        // 4. Bookkeeping. The session is already live; a failed timestamp
        // update must not turn this into an error.
        let mut profile = UserProfile::from(&account);
        match self.accounts.record_login(account.id).await {
            Ok(()) => profile.last_login_at = Some(Utc::now()),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %account.id, "Failed to record last login");
            }
        }

        audit::record(&AuditEvent::LoginSucceeded {
            user_id: account.id,
            email: &account.email,
            ip,
            user_agent: request.client.user_agent.as_deref(),
            session_id: session.id,
        });

        Ok(LoginOutcome {
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
            expires_in: self.codec.access_ttl_secs(),
            session_id: session.id,
            user: profile,
        })
    }

    /// Close the session of `refresh_token` and optionally revoke the access
    /// token presented with the request.
    ///
    /// The refresh token may already be expired but must belong to `user_id`.
    /// Logging out an already-closed session succeeds.
    pub async fn logout(
        &self,
        user_id: DbId,
        refresh_token: &str,
        access: Option<&PresentedAccessToken>,
    ) -> AuthResult<()> {
        let claims = self
            .codec
            .decode_as(refresh_token, TokenType::Refresh, Expiry::Ignore)?;
        if claims.sub != user_id {
            return Err(AuthError::InvalidToken);
        }

        self.sessions.close(user_id, &claims.jti, "logout").await?;

        if let Some(access) = access {
            let remaining = (access.expires_at - Utc::now().timestamp())
                .min(self.codec.access_ttl_secs());
            if remaining > 0 {
                self.store
                    .blacklist(&access.token_id, Duration::from_secs(remaining as u64))
                    .await?;
            }
        }

        audit::record(&AuditEvent::Logout {
            user_id,
            token_id: &claims.jti,
        });
        Ok(())
    }

    /// Issue a new access token for a live session. The refresh token itself
    /// is not rotated.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshOutcome> {
        let claims = self
            .codec
            .decode_as(refresh_token, TokenType::Refresh, Expiry::Enforce)?;

        if self.store.is_blacklisted(&claims.jti).await? {
            return Err(AuthError::TokenRevoked);
        }
        if !self.sessions.is_active(claims.sub, &claims.jti).await? {
            return Err(self.missing_session_error(&claims.jti).await?);
        }

        let access = self.codec.issue(
            claims.sub,
            TokenType::Access,
            ExtraClaims {
                sid: Some(claims.jti.clone()),
                ..claims.extra
            },
        )?;

        audit::record(&AuditEvent::TokenRefreshed {
            user_id: claims.sub,
        });
        Ok(RefreshOutcome {
            access_token: access.token,
            expires_in: self.codec.access_ttl_secs(),
        })
    }

    /// A session missing from the ephemeral store was either revoked or
    /// simply never existed (or expired); the ledger tells them apart.
    async fn missing_session_error(&self, token_id: &str) -> AuthResult<AuthError> {
        let revoked = self
            .sessions
            .find_by_token_id(token_id)
            .await?
            .is_some_and(|s| s.revoked_at.is_some());
        Ok(if revoked {
            AuthError::TokenRevoked
        } else {
            AuthError::SessionNotFound
        })
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Create an unverified, inactive account and email a verification link.
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<UserProfile> {
        validate_password_strength(&request.password)?;
        let email = normalize_email(&request.email);
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("A valid email address is required".into()));
        }

        let password_hash = self.hasher.hash(&request.password).map_err(|e| {
            tracing::error!(error = %e, "Password hashing failed");
            AuthError::Internal("password hashing failed".into())
        })?;

        let account = self
            .accounts
            .create(NewAccount {
                email,
                password_hash,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                phone: request.phone,
            })
            .await?;

        let token = generate_secret_token();
        let kind = OneTimeTokenKind::EmailVerification;
        self.store
            .put_one_time_token(kind, &token, account.id, kind.ttl())
            .await?;
        self.notify(MailKind::EmailVerification, &account, &token).await;

        audit::record(&AuditEvent::AccountCreated {
            user_id: account.id,
            email: &account.email,
        });
        Ok(UserProfile::from(&account))
    }

    /// Redeem a verification token, activating its account.
    pub async fn verify_email(&self, token: &str) -> AuthResult<UserProfile> {
        let user_id = self
            .store
            .consume_one_time_token(OneTimeTokenKind::EmailVerification, token)
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?;

        self.accounts.mark_email_verified(user_id).await?;
        let account = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        audit::record(&AuditEvent::EmailVerified { user_id });
        Ok(UserProfile::from(&account))
    }

    /// Issue a fresh verification token for an unverified account.
    ///
    /// Succeeds silently for unknown or already-verified addresses.
    pub async fn resend_verification(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email);
        let Some(account) = self.accounts.find_by_email(&email).await? else {
            return Ok(());
        };
        if account.email_verified {
            return Ok(());
        }

        let token = generate_secret_token();
        let kind = OneTimeTokenKind::EmailVerification;
        self.store
            .put_one_time_token(kind, &token, account.id, kind.ttl())
            .await?;
        self.notify(MailKind::EmailVerification, &account, &token).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session management
    // ------------------------------------------------------------------

    /// Sessions of a user, newest first.
    pub async fn list_sessions(&self, user_id: DbId, active_only: bool) -> AuthResult<Vec<Session>> {
        self.sessions.list(user_id, active_only).await
    }

    /// Revoke one of the caller's own sessions by its ledger id.
    ///
    /// Sessions of other users are reported as not found.
    pub async fn revoke_session(&self, user_id: DbId, session_id: DbId) -> AuthResult<()> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or(AuthError::SessionNotFound)?;

        self.sessions
            .close(user_id, &session.refresh_token_jti, "user_revoked")
            .await?;
        Ok(())
    }

    /// Send mail without failing the calling flow; delivery problems are
    /// logged.
    async fn notify(&self, kind: MailKind, account: &Account, token: &str) {
        let name = format!("{} {}", account.first_name, account.last_name);
        if let Err(e) = self.mailer.send(kind, &account.email, &name, token).await {
            tracing::warn!(error = %e, user_id = %account.id, kind = ?kind, "Mail delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    use crate::service::testing::{Harness, PASSWORD};

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
            client: ClientMeta {
                ip: Some("198.51.100.4".into()),
                user_agent: Some("test-agent".into()),
                device: None,
            },
        }
    }

    #[tokio::test]
    async fn login_issues_tokens_and_opens_session() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        let service = AuthService::new(&h.components);

        let outcome = service.login(login_request("  A@X.com ", PASSWORD)).await.unwrap();
        assert_eq!(outcome.user.id, account.id);
        assert_eq!(outcome.expires_in, 900);
        assert!(outcome.user.last_login_at.is_some());

        let refresh = h
            .components
            .codec
            .decode(&outcome.refresh_token, Expiry::Enforce)
            .unwrap();
        assert_eq!(refresh.token_type, TokenType::Refresh);
        assert!(h.store.get_session(account.id, &refresh.jti).await.unwrap().is_some());

        let access = h
            .components
            .codec
            .decode(&outcome.access_token, Expiry::Enforce)
            .unwrap();
        assert_eq!(access.extra.sid.as_deref(), Some(refresh.jti.as_str()));
        assert_eq!(access.extra.role.as_deref(), Some(account.role.as_str()));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let h = Harness::new();
        h.account("a@x.com");
        let service = AuthService::new(&h.components);

        let unknown = service.login(login_request("nobody@x.com", PASSWORD)).await;
        let wrong = service.login(login_request("a@x.com", "Wrong1234")).await;
        assert_matches!(unknown, Err(AuthError::InvalidCredentials));
        assert_matches!(wrong, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn unverified_login_creates_no_session() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        h.accounts.update(account.id, |a| a.email_verified = false).unwrap();
        let service = AuthService::new(&h.components);

        assert_matches!(
            service.login(login_request("a@x.com", "Secret123")).await,
            Err(AuthError::EmailNotVerified)
        );
        assert!(h.store.is_empty());
        assert!(service.list_sessions(account.id, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unverified_state_hidden_behind_password_check() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        h.accounts.update(account.id, |a| a.email_verified = false).unwrap();
        let service = AuthService::new(&h.components);

        assert_matches!(
            service.login(login_request("a@x.com", "Wrong1234")).await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn deactivated_account_rejected() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        h.accounts.update(account.id, |a| a.is_active = false).unwrap();
        let service = AuthService::new(&h.components);

        assert_matches!(
            service.login(login_request("a@x.com", PASSWORD)).await,
            Err(AuthError::AccountDeactivated)
        );
    }

    #[tokio::test]
    async fn store_outage_during_login_leaves_no_usable_session() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        h.store.set_unavailable(true);
        let service = AuthService::new(&h.components);

        assert_matches!(
            service.login(login_request("a@x.com", PASSWORD)).await,
            Err(AuthError::StoreUnavailable(_))
        );
        assert!(service.list_sessions(account.id, true).await.unwrap().is_empty());
        assert_eq!(service.list_sessions(account.id, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_login_timestamp_does_not_fail_login() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        let service = AuthService::new(&h.components);
        h.accounts.set_read_only(true);

        let outcome = service.login(login_request("a@x.com", PASSWORD)).await.unwrap();
        assert_eq!(outcome.user.id, account.id);
        assert!(outcome.user.last_login_at.is_none());
        assert!(service.refresh(&outcome.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_logins_are_independent_sessions() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        let service = AuthService::new(&h.components);

        let (a, b, c) = tokio::join!(
            service.login(login_request("a@x.com", PASSWORD)),
            service.login(login_request("a@x.com", PASSWORD)),
            service.login(login_request("a@x.com", PASSWORD)),
        );
        let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];
        assert_eq!(service.list_sessions(account.id, true).await.unwrap().len(), 3);

        service
            .revoke_session(account.id, outcomes[0].session_id)
            .await
            .unwrap();

        assert_matches!(
            service.refresh(&outcomes[0].refresh_token).await,
            Err(AuthError::TokenRevoked)
        );
        for outcome in &outcomes[1..] {
            service.refresh(&outcome.refresh_token).await.unwrap();
        }
    }

    #[tokio::test]
    async fn refresh_issues_new_access_token_without_rotation() {
        let h = Harness::new();
        h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let login = service.login(login_request("a@x.com", PASSWORD)).await.unwrap();

        let first = service.refresh(&login.refresh_token).await.unwrap();
        let second = service.refresh(&login.refresh_token).await.unwrap();

        let codec = &h.components.codec;
        let a = codec.decode(&first.access_token, Expiry::Enforce).unwrap();
        let b = codec.decode(&second.access_token, Expiry::Enforce).unwrap();
        let original = codec.decode(&login.access_token, Expiry::Enforce).unwrap();
        assert_ne!(a.jti, b.jti);
        assert_eq!(a.sub, original.sub);
        assert_eq!(a.extra, original.extra);
        assert_eq!(a.token_type, TokenType::Access);
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let h = Harness::new();
        h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let login = service.login(login_request("a@x.com", PASSWORD)).await.unwrap();

        assert_matches!(
            service.refresh(&login.access_token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn logout_then_refresh_is_revoked_and_logout_is_idempotent() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let login = service.login(login_request("a@x.com", PASSWORD)).await.unwrap();

        service.logout(account.id, &login.refresh_token, None).await.unwrap();
        service.logout(account.id, &login.refresh_token, None).await.unwrap();

        assert_matches!(
            service.refresh(&login.refresh_token).await,
            Err(AuthError::TokenRevoked)
        );
    }

    #[tokio::test]
    async fn logout_blacklists_presented_access_token() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let login = service.login(login_request("a@x.com", PASSWORD)).await.unwrap();
        let access = h
            .components
            .codec
            .decode(&login.access_token, Expiry::Enforce)
            .unwrap();

        service
            .logout(
                account.id,
                &login.refresh_token,
                Some(&PresentedAccessToken {
                    token_id: access.jti.clone(),
                    expires_at: access.exp,
                }),
            )
            .await
            .unwrap();
        assert!(h.store.is_blacklisted(&access.jti).await.unwrap());
    }

    #[tokio::test]
    async fn logout_with_foreign_refresh_token_fails() {
        let h = Harness::new();
        h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let login = service.login(login_request("a@x.com", PASSWORD)).await.unwrap();

        assert_matches!(
            service.logout(Uuid::new_v4(), &login.refresh_token, None).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn logout_accepts_expired_refresh_token() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let stale = h
            .components
            .codec
            .issue_at(
                account.id,
                TokenType::Refresh,
                ExtraClaims::default(),
                Utc::now().timestamp() - 700_000,
            )
            .unwrap();

        service.logout(account.id, &stale.token, None).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_of_unknown_session_is_not_found() {
        let h = Harness::new();
        let account = h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let orphan = h
            .components
            .codec
            .issue(account.id, TokenType::Refresh, ExtraClaims::default())
            .unwrap();

        assert_matches!(
            service.refresh(&orphan.token).await,
            Err(AuthError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn refresh_during_store_timeout_is_unavailable_not_missing() {
        let h = Harness::new();
        h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let login = service.login(login_request("a@x.com", PASSWORD)).await.unwrap();

        h.store.set_timing_out(true);
        assert_matches!(
            service.refresh(&login.refresh_token).await,
            Err(AuthError::StoreUnavailable(_))
        );

        h.store.set_timing_out(false);
        assert!(service.refresh(&login.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_of_blacklisted_token_is_revoked() {
        let h = Harness::new();
        h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let login = service.login(login_request("a@x.com", PASSWORD)).await.unwrap();
        let jti = h
            .components
            .codec
            .decode(&login.refresh_token, Expiry::Enforce)
            .unwrap()
            .jti;
        h.store.blacklist(&jti, Duration::from_secs(60)).await.unwrap();

        assert_matches!(
            service.refresh(&login.refresh_token).await,
            Err(AuthError::TokenRevoked)
        );
    }

    #[tokio::test]
    async fn revoke_session_of_other_user_is_not_found() {
        let h = Harness::new();
        h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let login = service.login(login_request("a@x.com", PASSWORD)).await.unwrap();

        assert_matches!(
            service.revoke_session(Uuid::new_v4(), login.session_id).await,
            Err(AuthError::SessionNotFound)
        );
        service.refresh(&login.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn register_then_verify_then_login() {
        let h = Harness::new();
        let service = AuthService::new(&h.components);

        let profile = service
            .register(RegisterRequest {
                email: "New@X.com".into(),
                password: "Secret123".into(),
                first_name: " Grace ".into(),
                last_name: "Hopper".into(),
                phone: None,
            })
            .await
            .unwrap();
        assert_eq!(profile.email, "new@x.com");
        assert_eq!(profile.first_name, "Grace");
        assert!(!profile.email_verified);

        assert_matches!(
            service.login(login_request("new@x.com", "Secret123")).await,
            Err(AuthError::EmailNotVerified)
        );

        let token = h
            .mailer
            .last_token(MailKind::EmailVerification, "new@x.com")
            .unwrap();
        let verified = service.verify_email(&token).await.unwrap();
        assert!(verified.email_verified && verified.is_active);

        assert_matches!(
            service.verify_email(&token).await,
            Err(AuthError::InvalidVerificationToken)
        );
        service.login(login_request("new@x.com", "Secret123")).await.unwrap();
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_weak_passwords() {
        let h = Harness::new();
        h.account("a@x.com");
        let service = AuthService::new(&h.components);
        let request = |email: &str, password: &str| RegisterRequest {
            email: email.into(),
            password: password.into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone: None,
        };

        assert_matches!(
            service.register(request("A@x.com", "Secret123")).await,
            Err(AuthError::EmailAlreadyRegistered)
        );
        assert_matches!(
            service.register(request("b@x.com", "short")).await,
            Err(AuthError::Validation(_))
        );
        assert_matches!(
            service.register(request("not-an-email", "Secret123")).await,
            Err(AuthError::Validation(_))
        );
    }

    #[tokio::test]
    async fn resend_verification_is_silent_for_unknown_addresses() {
        let h = Harness::new();
        let service = AuthService::new(&h.components);
        service.resend_verification("ghost@x.com").await.unwrap();
        assert!(h.mailer.sent().is_empty());
    }
}
