//! Revocation-aware session token service.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use warden_core::Clock;
use warden_core::error::WardenResult;
use warden_core::models::user::UserWithRoles;
use warden_core::repository::TokenRepository;

use crate::error::AuthError;
use crate::token::{self, SessionClaims};

/// A freshly issued session token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues, verifies and revokes session tokens.
///
/// Verification itself is stateless; only revocation touches the store.
pub struct SessionTokens<T: TokenRepository> {
    repo: Arc<T>,
    secret: String,
    ttl_hours: i64,
    clock: Arc<dyn Clock>,
}

impl<T: TokenRepository> SessionTokens<T> {
    pub fn new(repo: Arc<T>, secret: String, ttl_hours: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            secret,
            ttl_hours,
            clock,
        }
    }

    pub fn issue(&self, user: &UserWithRoles) -> Result<IssuedToken, AuthError> {
        let now = self.clock.now();
        let token = token::issue_session_token(user, &self.secret, self.ttl_hours, now)?;
        Ok(IssuedToken {
            token,
            expires_at: now + Duration::hours(self.ttl_hours),
        })
    }

    /// Signature and expiry only; does not consult the blacklist.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        token::verify_session_token(token, &self.secret, self.clock.now())
    }

    /// Blacklist a token until `expires_at`. Revoking twice is not an error.
    pub async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> WardenResult<()> {
        self.repo.blacklist(token, expires_at).await?;
        info!(%expires_at, "session token revoked");
        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> WardenResult<bool> {
        self.repo.is_blacklisted(token).await
    }

    /// Bearer check: revoked tokens are rejected before their signature
    /// or expiry is looked at.
    pub async fn authenticate(&self, token: &str) -> WardenResult<SessionClaims> {
        if self.is_revoked(token).await? {
            warn!("rejected revoked session token");
            return Err(AuthError::TokenRevoked.into());
        }

        self.verify(token).map_err(|e| {
            warn!(error = %e, "rejected session token");
            e.into()
        })
    }

    /// Drop blacklist rows whose tokens have expired anyway.
    pub async fn purge_expired(&self) -> WardenResult<u64> {
        let removed = self.repo.purge_expired_blacklist(self.clock.now()).await?;
        if removed > 0 {
            info!(removed, "purged expired blacklist entries");
        }
        Ok(removed)
    }
}
