//! Authentication configuration.

use crate::error::AuthError;

/// Session token lifetime used when none is configured or the configured
/// value is not a positive integer.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret for session tokens. Must not be empty.
    pub jwt_secret: String,
    /// Session token lifetime in hours (default: 24).
    pub session_ttl_hours: i64,
    /// Password reset token lifetime in seconds (default: 1800 = 30 minutes).
    pub reset_token_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    /// Argon2id memory cost in KiB (default: 19456).
    pub hash_memory_kib: u32,
    /// Argon2id iteration count (default: 2).
    pub hash_iterations: u32,
    /// Argon2id lanes (default: 1).
    pub hash_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            reset_token_lifetime_secs: 1800,
            pepper: None,
            hash_memory_kib: argon2::Params::DEFAULT_M_COST,
            hash_iterations: argon2::Params::DEFAULT_T_COST,
            hash_parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

impl AuthConfig {
    /// Read configuration from the process environment.
    ///
    /// Missing or unparsable values fall back to [`AuthConfig::default`];
    /// call [`AuthConfig::validate`] before use.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ttl = get("JWT_EXPIRES_IN").or_else(|| get("JWT_EXPIRY_HOURS"));

        Self {
            jwt_secret: get("JWT_SECRET").unwrap_or_default(),
            session_ttl_hours: crate::token::parse_ttl_hours(ttl.as_deref()),
            reset_token_lifetime_secs: parse_or(
                get("RESET_TOKEN_LIFETIME_SECS"),
                defaults.reset_token_lifetime_secs,
            ),
            pepper: get("PASSWORD_PEPPER"),
            hash_memory_kib: parse_or(get("ARGON2_MEMORY_KIB"), defaults.hash_memory_kib),
            hash_iterations: parse_or(get("ARGON2_ITERATIONS"), defaults.hash_iterations),
            hash_parallelism: parse_or(
                get("ARGON2_PARALLELISM"),
                defaults.hash_parallelism,
            ),
        }
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.is_empty() {
            return Err(AuthError::Config("JWT_SECRET must be set".into()));
        }
        if self.session_ttl_hours <= 0 {
            return Err(AuthError::Config(
                "session token lifetime must be positive".into(),
            ));
        }
        if self.reset_token_lifetime_secs == 0 {
            return Err(AuthError::Config(
                "reset token lifetime must be positive".into(),
            ));
        }
        argon2::Params::new(
            self.hash_memory_kib,
            self.hash_iterations,
            self.hash_parallelism,
            None,
        )
        .map_err(|e| AuthError::Config(format!("invalid Argon2 parameters: {e}")))?;
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = AuthConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.session_ttl_hours, 24);
        assert_eq!(config.reset_token_lifetime_secs, 1800);
        assert_eq!(config.hash_memory_kib, 19456);
        assert_eq!(config.hash_iterations, 2);
        assert_eq!(config.hash_parallelism, 1);
        assert!(config.pepper.is_none());
        assert!(config.validate().is_err());
    }

    #[test]
    fn reads_every_key() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("JWT_EXPIRES_IN", "48"),
            ("RESET_TOKEN_LIFETIME_SECS", "600"),
            ("PASSWORD_PEPPER", "pep"),
            ("ARGON2_MEMORY_KIB", "4096"),
            ("ARGON2_ITERATIONS", "3"),
            ("ARGON2_PARALLELISM", "2"),
        ]));
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.session_ttl_hours, 48);
        assert_eq!(config.reset_token_lifetime_secs, 600);
        assert_eq!(config.pepper.as_deref(), Some("pep"));
        assert_eq!(config.hash_memory_kib, 4096);
        assert_eq!(config.hash_iterations, 3);
        assert_eq!(config.hash_parallelism, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn expiry_hours_alias_is_a_fallback() {
        let config = AuthConfig::from_lookup(lookup_from(&[("JWT_EXPIRY_HOURS", "12")]));
        assert_eq!(config.session_ttl_hours, 12);

        let config = AuthConfig::from_lookup(lookup_from(&[
            ("JWT_EXPIRES_IN", "6"),
            ("JWT_EXPIRY_HOURS", "12"),
        ]));
        assert_eq!(config.session_ttl_hours, 6);
    }

    #[test]
    fn garbage_ttl_falls_back_to_default() {
        let config = AuthConfig::from_lookup(lookup_from(&[("JWT_EXPIRES_IN", "soon")]));
        assert_eq!(config.session_ttl_hours, 24);
    }

    #[test]
    fn invalid_argon2_params_are_rejected() {
        let config = AuthConfig {
            jwt_secret: "s3cret".into(),
            hash_memory_kib: 1,
            ..AuthConfig::default()
        };
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));
    }
}
