//! Authentication and session lifecycle.
//!
//! Credentials are checked against Argon2id hashes, sessions are recorded in
//! a durable ledger and mirrored into a TTL-bound ephemeral store, and every
//! request is authenticated from a short-lived signed access token.
//!
//! The entry points are [`AuthService`], [`PasswordService`] and
//! [`RequestGuard`], all built from one [`AuthComponents`] value.

pub mod accounts;
pub mod audit;
pub mod config;
pub mod guard;
pub mod jwt;
pub mod ledger;
pub mod mailer;
pub mod password;
pub mod principal;
pub mod rate_limit;
pub mod service;
pub mod sessions;
pub mod store;

pub use guard::{extract_bearer, RequestGuard};
pub use principal::Principal;
pub use rate_limit::{RateLimitPolicy, RateLimiter};
pub use service::{AuthComponents, AuthService, PasswordService, UserProfile};
