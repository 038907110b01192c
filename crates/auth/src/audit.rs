//! Security audit trail.
//!
//! Events are emitted as structured `tracing` records under the `audit`
//! target so they can be routed to a dedicated sink by the subscriber.

use gatekeep_core::types::DbId;

/// A security-relevant occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent<'a> {
    LoginSucceeded {
        user_id: DbId,
        email: &'a str,
        ip: Option<&'a str>,
        user_agent: Option<&'a str>,
        session_id: DbId,
    },
    LoginFailed {
        email: &'a str,
        ip: Option<&'a str>,
        reason: &'a str,
    },
    Logout {
        user_id: DbId,
        token_id: &'a str,
    },
    SessionRevoked {
        user_id: DbId,
        token_id: &'a str,
        reason: &'a str,
    },
    SessionsRevoked {
        user_id: DbId,
        count: u64,
        reason: &'a str,
    },
    TokenRefreshed {
        user_id: DbId,
    },
    AccountCreated {
        user_id: DbId,
        email: &'a str,
    },
    EmailVerified {
        user_id: DbId,
    },
    PasswordResetRequested {
        email: &'a str,
        found: bool,
    },
    PasswordResetCompleted {
        user_id: DbId,
    },
    PasswordChanged {
        user_id: DbId,
    },
}

impl AuditEvent<'_> {
    /// Stable event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::LoginSucceeded { .. } => "login_success",
            AuditEvent::LoginFailed { .. } => "login_failed",
            AuditEvent::Logout { .. } => "logout",
            AuditEvent::SessionRevoked { .. } => "session_revoked",
            AuditEvent::SessionsRevoked { .. } => "sessions_revoked",
            AuditEvent::TokenRefreshed { .. } => "token_refreshed",
            AuditEvent::AccountCreated { .. } => "account_created",
            AuditEvent::EmailVerified { .. } => "email_verified",
            AuditEvent::PasswordResetRequested { .. } => "password_reset_requested",
            AuditEvent::PasswordResetCompleted { .. } => "password_reset_completed",
            AuditEvent::PasswordChanged { .. } => "password_changed",
        }
    }
}

/// Emit an audit event.
pub fn record(event: &AuditEvent<'_>) {
    let event_type = event.event_type();
    match *event {
        AuditEvent::LoginSucceeded {
            user_id,
            email,
            ip,
            user_agent,
            session_id,
        } => tracing::info!(
            target: "audit",
            event_type,
            %user_id,
            email,
            ip,
            user_agent,
            %session_id,
            "Login succeeded",
        ),
        AuditEvent::LoginFailed { email, ip, reason } => tracing::warn!(
            target: "audit",
            event_type,
            email,
            ip,
            reason,
            "Login failed",
        ),
        AuditEvent::Logout { user_id, token_id } => tracing::info!(
            target: "audit",
            event_type,
            %user_id,
            token_id,
            "Logout",
        ),
        AuditEvent::SessionRevoked {
            user_id,
            token_id,
            reason,
        } => tracing::info!(
            target: "audit",
            event_type,
            %user_id,
            token_id,
            reason,
            "Session revoked",
        ),
        AuditEvent::SessionsRevoked {
            user_id,
            count,
            reason,
        } => tracing::info!(
            target: "audit",
            event_type,
            %user_id,
            count,
            reason,
            "Sessions revoked",
        ),
        AuditEvent::TokenRefreshed { user_id } => tracing::info!(
            target: "audit",
            event_type,
            %user_id,
            "Access token refreshed",
        ),
        AuditEvent::AccountCreated { user_id, email } => tracing::info!(
            target: "audit",
            event_type,
            %user_id,
            email,
            "Account created",
        ),
        AuditEvent::EmailVerified { user_id } => tracing::info!(
            target: "audit",
            event_type,
            %user_id,
            "Email verified",
        ),
        AuditEvent::PasswordResetRequested { email, found } => tracing::info!(
            target: "audit",
            event_type,
            email,
            found,
            "Password reset requested",
        ),
        AuditEvent::PasswordResetCompleted { user_id } => tracing::info!(
            target: "audit",
            event_type,
            %user_id,
            "Password reset completed",
        ),
        AuditEvent::PasswordChanged { user_id } => tracing::info!(
            target: "audit",
            event_type,
            %user_id,
            "Password changed",
        ),
    }
}
