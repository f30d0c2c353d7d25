//! Password hashing and verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _, Version,
};

use crate::config::AuthConfig;
use crate::error::AuthError;

/// One-way password hashing with salted verification.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing PHC string.
    fn hash(&self, plaintext: &str) -> Result<String, AuthError>;

    /// Returns `Ok(false)` on mismatch and `Err` only when the stored hash
    /// cannot be parsed or verification itself fails.
    fn verify(&self, hash: &str, plaintext: &str) -> Result<bool, AuthError>;
}

/// Argon2id with a configurable work factor and optional pepper.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
    pepper: Option<String>,
}

impl Argon2Hasher {
    pub fn new(params: Params, pepper: Option<String>) -> Self {
        Self { params, pepper }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
            None,
        )
        .map_err(|e| AuthError::Config(format!("invalid Argon2 parameters: {e}")))?;
        Ok(Self::new(params, config.pepper.clone()))
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn peppered(&self, plaintext: &str) -> Vec<u8> {
        match &self.pepper {
            Some(p) => format!("{p}{plaintext}").into_bytes(),
            None => plaintext.as_bytes().to_vec(),
        }
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new(Params::default(), None)
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(&self.peppered(plaintext), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Crypto(format!("hash error: {e}")))
    }

    fn verify(&self, hash: &str, plaintext: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

        // Cost parameters come from the stored hash, not from `self.params`.
        match self
            .argon2()
            .verify_password(&self.peppered(plaintext), &parsed_hash)
        {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
        }
    }
}
