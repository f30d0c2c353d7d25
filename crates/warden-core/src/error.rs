//! Error types for the Warden authorization core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Permission already exists for resource '{resource}' and action '{action}'")]
    DuplicatePermission { resource: String, action: String },

    /// Unknown account and wrong password are deliberately the same error.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired reset token")]
    InvalidOrExpiredToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A multi-step operation failed part-way; earlier steps were applied.
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<WardenError>,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardenError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Wrap `self` as the failure of a named step.
    pub fn at_step(self, step: impl Into<String>) -> Self {
        Self::StepFailed {
            step: step.into(),
            source: Box::new(self),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type WardenResult<T> = Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failure_names_the_step() {
        let err = WardenError::Store("connection reset".into()).at_step("mark reset token used");
        let msg = err.to_string();
        assert!(msg.contains("mark reset token used"), "{msg}");
        assert!(msg.contains("connection reset"), "{msg}");
    }

    #[test]
    fn not_found_helper() {
        let err = WardenError::not_found("role", 42);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Entity not found: role with id 42");
    }
}
