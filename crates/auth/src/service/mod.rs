//! Auth flows composed from the stores, the token codec and the hasher.

pub mod auth;
pub mod password;

use std::sync::Arc;

use gatekeep_core::types::{DbId, Timestamp};
use serde::Serialize;

use crate::accounts::{Account, AccountStore};
use crate::jwt::TokenCodec;
use crate::ledger::SessionLedger;
use crate::mailer::Mailer;
use crate::password::PasswordHasher;
use crate::sessions::SessionManager;
use crate::store::EphemeralStore;

pub use self::auth::{AuthService, LoginOutcome, LoginRequest, RefreshOutcome, RegisterRequest};
pub use self::password::PasswordService;

/// Shared collaborators every auth service is built from.
///
/// Constructed once at startup and cloned into each service.
#[derive(Clone)]
pub struct AuthComponents {
    pub accounts: Arc<dyn AccountStore>,
    pub ledger: Arc<dyn SessionLedger>,
    pub store: Arc<dyn EphemeralStore>,
    pub mailer: Arc<dyn Mailer>,
    pub codec: Arc<TokenCodec>,
    pub hasher: Arc<PasswordHasher>,
}

impl AuthComponents {
    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(self.ledger.clone(), self.store.clone())
    }
}

/// Account fields that are safe to return to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: DbId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub npo_id: Option<DbId>,
    pub email_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<&Account> for UserProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            phone: account.phone.clone(),
            role: account.role.clone(),
            npo_id: account.npo_id,
            email_verified: account.email_verified,
            is_active: account.is_active,
            last_login_at: account.last_login_at,
            created_at: account.created_at,
        }
    }
}
