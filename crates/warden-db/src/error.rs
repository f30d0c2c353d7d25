//! Database-specific error types and conversions.

use warden_core::error::WardenError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A unique index or record id rejected the write.
    #[error("Conflicting {entity}: {detail}")]
    Conflict { entity: String, detail: String },

    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl DbError {
    /// Classify a failed write: unique-index and duplicate-record
    /// violations become [`DbError::Conflict`], anything else a query error.
    pub(crate) fn from_write(err: impl std::fmt::Display, entity: &str) -> Self {
        let detail = err.to_string();
        if detail.contains("already contains") || detail.contains("already exists") {
            DbError::Conflict {
                entity: entity.to_string(),
                detail,
            }
        } else {
            DbError::Query(detail)
        }
    }

    pub(crate) fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict { .. })
    }
}

impl From<DbError> for WardenError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => WardenError::NotFound { entity, id },
            DbError::Conflict { entity, .. } => WardenError::AlreadyExists { entity },
            other => WardenError::Store(other.to_string()),
        }
    }
}
