//! Password hashing and verification using Argon2id.
//!
//! Passwords longer than [`MAX_PASSWORD_BYTES`] are truncated to exactly that
//! many bytes before hashing and before verification, so the same input always
//! maps to the same hash input.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

/// Bytes of a password that participate in hashing.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// The stored hash is not a parseable PHC string.
    #[error("Invalid password hash format: {0}")]
    InvalidHashFormat(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Argon2id hasher with a fixed cost.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Hasher with the production cost (19 MiB memory, 2 iterations, 1 lane).
    pub fn new() -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::DEFAULT),
        }
    }

    /// Hasher with a custom memory cost (KiB) and iteration count.
    ///
    /// Verification always uses the parameters embedded in the stored hash, so
    /// hashes produced at any cost remain verifiable.
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a plaintext password, returning the PHC-formatted hash string.
    ///
    /// A fresh random salt is generated for every call.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(truncate(password), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::Hashing(e.to_string()))
    }

    /// Verify a plaintext password against a stored PHC hash string.
    ///
    /// Returns `Ok(false)` on mismatch and
    /// [`PasswordError::InvalidHashFormat`] when the stored hash is malformed.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHashFormat(e.to_string()))?;
        match self.argon2.verify_password(truncate(password), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::InvalidHashFormat(e.to_string())),
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

fn truncate(password: &str) -> &[u8] {
    let bytes = password.as_bytes();
    &bytes[..bytes.len().min(MAX_PASSWORD_BYTES)]
}
