//! SurrealDB repository implementations.

mod permission;
mod role;
mod token;
mod user;

pub use permission::SurrealPermissionRepository;
pub use role::SurrealRoleRepository;
pub use token::SurrealTokenRepository;
pub use user::SurrealUserRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for `count()` queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Minimal projection of an `UPDATE` result; an empty result means no
/// live row matched.
#[derive(Debug, SurrealValue)]
struct TouchedRow {
    #[allow(dead_code)]
    updated_at: chrono::DateTime<chrono::Utc>,
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {what} UUID {raw:?}: {e}")))
}
