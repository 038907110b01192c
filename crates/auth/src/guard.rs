//! Per-request bearer token authentication.

use std::sync::Arc;

use gatekeep_core::error::{AuthError, AuthResult};

use crate::accounts::AccountStore;
use crate::jwt::{Expiry, TokenCodec, TokenType};
use crate::principal::Principal;
use crate::service::AuthComponents;
use crate::store::EphemeralStore;

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively.
pub fn extract_bearer(header: &str) -> AuthResult<&str> {
    let (scheme, token) = header.trim().split_once(' ').ok_or(AuthError::InvalidToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct RequestGuard {
    codec: Arc<TokenCodec>,
    store: Arc<dyn EphemeralStore>,
    accounts: Arc<dyn AccountStore>,
}

impl RequestGuard {
    pub fn new(components: &AuthComponents) -> Self {
        Self {
            codec: components.codec.clone(),
            store: components.store.clone(),
            accounts: components.accounts.clone(),
        }
    }

    /// Verify an access token and resolve the caller.
    ///
    /// Rejects invalid, expired and revoked tokens, tokens whose subject no
    /// longer exists, and deactivated accounts.
    pub async fn authenticate(&self, token: &str) -> AuthResult<Principal> {
        let claims = self
            .codec
            .decode_as(token, TokenType::Access, Expiry::Enforce)?;

        if self.store.is_blacklisted(&claims.jti).await? {
            tracing::warn!(token_id = %claims.jti, user_id = %claims.sub, "Revoked access token presented");
            return Err(AuthError::TokenRevoked);
        }

        let account = self
            .accounts
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::AccountNotFound)?;
        if !account.is_active {
            return Err(AuthError::AccountDeactivated);
        }

        Ok(Principal::new(
            account.id,
            account.email,
            account.role,
            account.npo_id,
            account.email_verified,
            claims.jti,
            claims.extra.sid,
            claims.exp,
        ))
    }
}
