//! Authentication error types.

use thiserror::Error;
use warden_core::error::WardenError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token has expired")]
    TokenExpired,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("invalid or expired reset token")]
    InvalidOrExpiredToken,

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<AuthError> for WardenError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => WardenError::InvalidCredentials,
            AuthError::TokenExpired => WardenError::TokenExpired,
            AuthError::InvalidSignature => WardenError::InvalidSignature,
            AuthError::MalformedToken(msg) => WardenError::MalformedToken(msg),
            AuthError::TokenRevoked => WardenError::TokenRevoked,
            AuthError::InvalidOrExpiredToken => WardenError::InvalidOrExpiredToken,
            AuthError::Crypto(msg) => WardenError::Crypto(msg),
            AuthError::Config(msg) => WardenError::Config(msg),
        }
    }
}
