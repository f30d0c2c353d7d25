//! Warden Database: SurrealDB connection management and repository
//! implementations for the credential store.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - Implementations of the `warden-core` repository traits
//!   ([`repository`])

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::{
    SurrealPermissionRepository, SurrealRoleRepository, SurrealTokenRepository,
    SurrealUserRepository,
};
pub use schema::run_migrations;
