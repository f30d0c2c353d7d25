//! Single-use, time-boxed password reset tokens.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};
use warden_core::Clock;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::token::CreatePasswordResetToken;
use warden_core::models::user::UpdateUser;
use warden_core::repository::{TokenRepository, UserRepository};

use crate::password::PasswordHasher;
use crate::token;

pub struct ResetTokens<U: UserRepository, T: TokenRepository> {
    users: Arc<U>,
    tokens: Arc<T>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
}

impl<U: UserRepository, T: TokenRepository> ResetTokens<U, T> {
    pub fn new(
        users: Arc<U>,
        tokens: Arc<T>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        lifetime: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            clock,
            lifetime,
        }
    }

    /// Create a reset token for the account behind `email`.
    ///
    /// Returns `Ok(None)` for an unknown email so callers cannot discover
    /// which accounts exist. Nothing is written in that case.
    pub async fn request(&self, email: &str) -> WardenResult<Option<String>> {
        let user = match self.users.get_by_email(email).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => {
                debug!("password reset requested for unknown email");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let raw = token::generate_reset_token();
        let expires_at = self.clock.now() + self.lifetime;

        self.tokens
            .create_reset_token(CreatePasswordResetToken {
                user_id: user.id,
                token: raw.clone(),
                expires_at,
            })
            .await?;

        info!(user_id = %user.id, %expires_at, "password reset token issued");
        Ok(Some(raw))
    }

    /// Set a new password with a reset token, consuming the token.
    ///
    /// The password is persisted before the token is marked used; a
    /// store failure at that last step is reported as a step failure, not
    /// swallowed. Losing the race to mark the token is
    /// `InvalidOrExpiredToken`.
    pub async fn consume(&self, token: &str, new_password: &str) -> WardenResult<()> {
        let now = self.clock.now();

        let reset = match self.tokens.get_valid_reset_token(token, now).await {
            Ok(reset) if reset.is_valid_at(now) => reset,
            Ok(_) => return Err(WardenError::InvalidOrExpiredToken),
            Err(e) if e.is_not_found() => {
                warn!("rejected invalid or expired reset token");
                return Err(WardenError::InvalidOrExpiredToken);
            }
            Err(e) => return Err(e),
        };

        let user = self.users.get_by_id(reset.user_id).await?;
        let password_hash = self.hasher.hash(new_password)?;

        self.users
            .update(
                user.id,
                UpdateUser {
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
            )
            .await?;

        self.tokens
            .mark_reset_token_used(reset.id, now)
            .await
            .map_err(|e| match e {
                // Lost the race to another consumer of the same token.
                WardenError::InvalidOrExpiredToken => e,
                other => other.at_step("mark reset token used"),
            })?;

        info!(user_id = %user.id, "password reset completed");
        Ok(())
    }
}
