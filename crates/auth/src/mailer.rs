//! Outbound email for password resets and address verification.

use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
#[error("Mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Which one-time link a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    PasswordReset,
    EmailVerification,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a one-time token to `to`.
    async fn send(&self, kind: MailKind, to: &str, name: &str, token: &str)
        -> Result<(), MailError>;
}

/// Logs each delivery (never the token) instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        kind: MailKind,
        to: &str,
        name: &str,
        _token: &str,
    ) -> Result<(), MailError> {
        tracing::info!(kind = ?kind, to, name, "Email queued for delivery");
        Ok(())
    }
}

/// A message captured by [`MemoryMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub kind: MailKind,
    pub to: String,
    pub token: String,
}

/// Records every message in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Token of the most recent message of `kind` sent to `to`.
    pub fn last_token(&self, kind: MailKind, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.kind == kind && m.to == to)
            .map(|m| m.token)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(
        &self,
        kind: MailKind,
        to: &str,
        _name: &str,
        token: &str,
    ) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError("mailbox lock poisoned".into()))?
            .push(SentMail {
                kind,
                to: to.to_string(),
                token: token.to_string(),
            });
        Ok(())
    }
}
