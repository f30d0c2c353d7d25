//! Domain models for Warden.
//!
//! These are the records owned by the credential store and shared
//! across all crates.

pub mod permission;
pub mod role;
pub mod token;
pub mod user;
