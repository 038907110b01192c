//! SHA-256 digests and random one-time secrets.
//!
//! One-time tokens (password reset, email verification) are generated here so
//! the services and any future CLI tooling share the same alphabet and length.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a generated one-time secret (alphanumeric characters).
///
/// 43 alphanumeric characters carry ~256 bits of entropy.
pub const SECRET_TOKEN_LENGTH: usize = 43;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Generate a cryptographically random, URL-safe one-time secret.
pub fn generate_secret_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(SECRET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
