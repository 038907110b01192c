//! Account lookup and credential updates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use gatekeep_core::error::{AuthError, AuthResult};
use gatekeep_core::roles::DEFAULT_ROLE;
use gatekeep_core::types::{DbId, Timestamp};
use gatekeep_db::models::user::{CreateUser, User};
use gatekeep_db::repositories::UserRepo;
use gatekeep_db::DbPool;
use uuid::Uuid;

use crate::ledger::db_error;

/// Unique constraint guarding `users.email`.
const EMAIL_CONSTRAINT: &str = "uq_users_email";

/// The account fields authentication works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: DbId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub role: String,
    pub npo_id: Option<DbId>,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<User> for Account {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            email_verified: user.email_verified,
            is_active: user.is_active,
            role: user.role,
            npo_id: user.npo_id,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// A self-registered account. Starts unverified and inactive.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Normalized (lowercase) email.
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up by normalized email.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>>;

    async fn find_by_id(&self, id: DbId) -> AuthResult<Option<Account>>;

    /// Fails with [`AuthError::EmailAlreadyRegistered`] if the email is taken.
    async fn create(&self, input: NewAccount) -> AuthResult<Account>;

    async fn update_password_hash(&self, id: DbId, password_hash: &str) -> AuthResult<()>;

    async fn record_login(&self, id: DbId) -> AuthResult<()>;

    /// Mark the email verified and activate the account.
    async fn mark_email_verified(&self, id: DbId) -> AuthResult<()>;
}

/// [`AccountStore`] over the `users` table.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: DbPool,
}

impl PgAccountStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>> {
        UserRepo::find_by_email(&self.pool, email)
            .await
            .map(|user| user.map(Account::from))
            .map_err(db_error("account lookup"))
    }

    async fn find_by_id(&self, id: DbId) -> AuthResult<Option<Account>> {
        UserRepo::find_by_id(&self.pool, id)
            .await
            .map(|user| user.map(Account::from))
            .map_err(db_error("account lookup"))
    }

    async fn create(&self, input: NewAccount) -> AuthResult<Account> {
        let create = CreateUser {
            email: input.email,
            password_hash: input.password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            phone: input.phone,
            role: DEFAULT_ROLE.to_string(),
            email_verified: false,
            is_active: false,
        };
        match UserRepo::create(&self.pool, &create).await {
            Ok(user) => Ok(user.into()),
            Err(sqlx::Error::Database(db_err)) if db_err.constraint() == Some(EMAIL_CONSTRAINT) => {
                Err(AuthError::EmailAlreadyRegistered)
            }
            Err(e) => Err(db_error("account insert")(e)),
        }
    }

    async fn update_password_hash(&self, id: DbId, password_hash: &str) -> AuthResult<()> {
        let updated = UserRepo::update_password_hash(&self.pool, id, password_hash)
            .await
            .map_err(db_error("password update"))?;
        if !updated {
            return Err(AuthError::AccountNotFound);
        }
        Ok(())
    }

    async fn record_login(&self, id: DbId) -> AuthResult<()> {
        UserRepo::record_successful_login(&self.pool, id)
            .await
            .map_err(db_error("login timestamp update"))
    }

    async fn mark_email_verified(&self, id: DbId) -> AuthResult<()> {
        let updated = UserRepo::mark_email_verified(&self.pool, id)
            .await
            .map_err(db_error("email verification update"))?;
        if !updated {
            return Err(AuthError::AccountNotFound);
        }
        Ok(())
    }
}

/// In-process [`AccountStore`].
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: Mutex<HashMap<DbId, Account>>,
    read_only: AtomicBool,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write through [`AccountStore`] fail with
    /// [`AuthError::StoreUnavailable`] until switched back. Reads still work.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn writable(&self) -> AuthResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(AuthError::StoreUnavailable("account store is read-only".into()));
        }
        Ok(())
    }

    /// Insert or replace an account directly.
    pub fn insert(&self, account: Account) -> AuthResult<()> {
        self.accounts()?.insert(account.id, account);
        Ok(())
    }

    /// Apply `change` to a stored account.
    pub fn update(&self, id: DbId, change: impl FnOnce(&mut Account)) -> AuthResult<()> {
        let mut accounts = self.accounts()?;
        let account = accounts.get_mut(&id).ok_or(AuthError::AccountNotFound)?;
        change(account);
        Ok(())
    }

    fn accounts(&self) -> AuthResult<MutexGuard<'_, HashMap<DbId, Account>>> {
        self.accounts
            .lock()
            .map_err(|_| AuthError::Internal("account store lock poisoned".into()))
    }
}

#[async_trait]
impl AccountStore for MemoryAccounts {
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>> {
        Ok(self
            .accounts()?
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: DbId) -> AuthResult<Option<Account>> {
        Ok(self.accounts()?.get(&id).cloned())
    }

    async fn create(&self, input: NewAccount) -> AuthResult<Account> {
        self.writable()?;
        let mut accounts = self.accounts()?;
        if accounts.values().any(|a| a.email == input.email) {
            return Err(AuthError::EmailAlreadyRegistered);
        }
        let account = Account {
            id: Uuid::new_v4(),
            email: input.email,
            password_hash: input.password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            phone: input.phone,
            email_verified: false,
            is_active: false,
            role: DEFAULT_ROLE.to_string(),
            npo_id: None,
            last_login_at: None,
            created_at: Utc::now(),
        };
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn update_password_hash(&self, id: DbId, password_hash: &str) -> AuthResult<()> {
        self.writable()?;
        self.update(id, |a| a.password_hash = password_hash.to_string())
    }

    async fn record_login(&self, id: DbId) -> AuthResult<()> {
        self.writable()?;
        self.update(id, |a| a.last_login_at = Some(Utc::now()))
    }

    async fn mark_email_verified(&self, id: DbId) -> AuthResult<()> {
        self.writable()?;
        self.update(id, |a| {
            a.email_verified = true;
            a.is_active = true;
        })
    }
}
