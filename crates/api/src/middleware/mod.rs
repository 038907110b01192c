//! Request extractors for authentication, authorization and client metadata.
//!
//! - [`auth::AuthUser`] -- Authenticates the JWT Bearer token into a principal.
//! - [`rbac::RequireSuperAdmin`] -- Requires the `super_admin` role.
//! - [`rbac::RequireVerified`] -- Requires a verified email address.
//! - [`client::ClientInfo`] -- Client IP and user agent for sessions and rate limits.

pub mod auth;
pub mod client;
pub mod rbac;
