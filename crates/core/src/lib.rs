//! Domain primitives shared by every Gatekeep crate.
//!
//! This crate has no I/O and no internal dependencies so it can be used by the
//! repository layer, the auth services, and the HTTP surface alike.

pub mod error;
pub mod hashing;
pub mod roles;
pub mod types;
pub mod validation;
