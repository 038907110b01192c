//! Key layout of the ephemeral store.

use gatekeep_core::types::DbId;

use super::OneTimeTokenKind;

pub fn session(user_id: DbId, token_id: &str) -> String {
    format!("session:{user_id}:{token_id}")
}

/// Glob pattern matching every session key of a user.
pub fn session_pattern(user_id: DbId) -> String {
    format!("session:{user_id}:*")
}

pub fn blacklist(token_id: &str) -> String {
    format!("blacklist:{token_id}")
}

pub fn one_time(kind: OneTimeTokenKind, key: &str) -> String {
    format!("{}:{key}", kind.key_prefix())
}

pub fn rate_limit(action: &str, identifier: &str) -> String {
    format!("rate_limit:{action}:{identifier}")
}
