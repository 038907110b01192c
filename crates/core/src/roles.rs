//! Well-known role name constants.
//!
//! These must match the seed data in `20251020000001_create_roles_table.sql`.

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_DONOR: &str = "donor";

/// Role assigned to self-registered accounts.
pub const DEFAULT_ROLE: &str = ROLE_DONOR;
