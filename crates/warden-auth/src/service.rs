//! Authentication service: login, registration, logout, password reset
//! and permission checks.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::Permission;
use warden_core::models::user::{CreateUser, UpdateUser, User, UserWithRoles};
use warden_core::repository::{TokenRepository, UserRepository};
use warden_core::{Clock, SystemClock};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password::{Argon2Hasher, PasswordHasher};
use crate::rbac;
use crate::reset::ResetTokens;
use crate::session::SessionTokens;
use crate::token::SessionClaims;

/// Input for self-registration.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Successful login with a session token.
#[derive(Debug)]
pub struct LoginOutput {
    pub user: UserWithRoles,
    /// Signed HS256 session token.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<U: UserRepository, T: TokenRepository> {
    users: Arc<U>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    sessions: SessionTokens<T>,
    resets: ResetTokens<U, T>,
    decoy: OnceLock<Option<String>>,
}

impl<U: UserRepository, T: TokenRepository> AuthService<U, T> {
    /// Build a service with Argon2id hashing from `config` and wall-clock time.
    pub fn new(user_repo: U, token_repo: T, config: &AuthConfig) -> WardenResult<Self> {
        config.validate()?;
        let hasher = Arc::new(Argon2Hasher::from_config(config)?);
        Ok(Self::with_parts(
            user_repo,
            token_repo,
            config,
            hasher,
            Arc::new(SystemClock),
        ))
    }

    /// Build a service from explicit hasher and clock implementations.
    pub fn with_parts(
        user_repo: U,
        token_repo: T,
        config: &AuthConfig,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let users = Arc::new(user_repo);
        let tokens = Arc::new(token_repo);
        let sessions = SessionTokens::new(
            tokens.clone(),
            config.jwt_secret.clone(),
            config.session_ttl_hours,
            clock.clone(),
        );
        let resets = ResetTokens::new(
            users.clone(),
            tokens,
            hasher.clone(),
            clock.clone(),
            Duration::seconds(config.reset_token_lifetime_secs as i64),
        );
        Self {
            users,
            hasher,
            clock,
            sessions,
            resets,
            decoy: OnceLock::new(),
        }
    }

    pub fn sessions(&self) -> &SessionTokens<T> {
        &self.sessions
    }

    /// A hash of a throwaway password, built with the live hasher on first use.
    fn decoy_hash(&self) -> Option<&str> {
        self.decoy
            .get_or_init(|| self.hasher.hash("warden decoy password").ok())
            .as_deref()
    }

    /// Check an email/password pair and return the user with roles.
    ///
    /// Unknown email and wrong password are indistinguishable. The
    /// account's active flag is reported, not enforced.
    pub async fn login(&self, email: &str, password: &str) -> WardenResult<UserWithRoles> {
        let user = match self.users.get_by_email(email).await {
            Ok(u) => u,
            Err(e) if e.is_not_found() => {
                // Spend the same hashing work as a real mismatch.
                if let Some(hash) = self.decoy_hash() {
                    let _ = self.hasher.verify(hash, password);
                }
                warn!("login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        match self.hasher.verify(&user.password_hash, password) {
            Ok(true) => {}
            Ok(false) => {
                warn!(user_id = %user.id, "login rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => {
                error!(user_id = %user.id, error = %e, "stored password hash is unusable");
                return Err(AuthError::InvalidCredentials.into());
            }
        }

        self.users
            .update(
                user.id,
                UpdateUser {
                    last_login: Some(self.clock.now()),
                    ..Default::default()
                },
            )
            .await?;

        let resolved = self.users.get_with_roles(user.id).await?;
        info!(user_id = %user.id, active = resolved.user.is_active, "user logged in");
        Ok(resolved)
    }

    /// [`login`](Self::login) followed by session token issuance.
    pub async fn login_with_token(&self, email: &str, password: &str) -> WardenResult<LoginOutput> {
        let user = self.login(email, password).await?;
        let issued = self.sessions.issue(&user)?;
        Ok(LoginOutput {
            user,
            token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    /// Create an account. The plaintext password is hashed before it
    /// reaches the store and is never logged.
    pub async fn register(&self, input: NewUser) -> WardenResult<User> {
        match self.users.get_by_email(&input.email).await {
            Ok(_) => {
                return Err(WardenError::AlreadyExists {
                    entity: "user".into(),
                });
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = self
            .users
            .create(CreateUser {
                email: input.email,
                name: input.name,
                password_hash,
                is_active: true,
            })
            .await?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Revoke a session token until `expires_at`.
    pub async fn logout(&self, token: &str, expires_at: DateTime<Utc>) -> WardenResult<()> {
        self.sessions.revoke(token, expires_at).await
    }

    /// Verify a session token, then revoke it for the rest of its lifetime.
    pub async fn logout_token(&self, token: &str) -> WardenResult<()> {
        let claims = self.sessions.verify(token)?;
        self.sessions.revoke(token, claims.expires_at()).await?;
        info!(user_id = %claims.sub, "user logged out");
        Ok(())
    }

    pub async fn authenticate(&self, token: &str) -> WardenResult<SessionClaims> {
        self.sessions.authenticate(token).await
    }

    pub async fn request_password_reset(&self, email: &str) -> WardenResult<Option<String>> {
        self.resets.request(email).await
    }

    /// Reset a password with a reset token. A `confirmation` that differs
    /// from `new_password` is rejected before the store is touched.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirmation: Option<&str>,
    ) -> WardenResult<()> {
        if confirmation.is_some_and(|c| c != new_password) {
            return Err(WardenError::validation(
                "password confirmation does not match",
            ));
        }
        self.resets.consume(token, new_password).await
    }

    /// Evaluate a permission against the user's current roles.
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        resource: &str,
        action: &str,
    ) -> WardenResult<bool> {
        let user = self.users.get_with_roles(user_id).await?;
        let allowed = rbac::has_permission(&user, resource, action);
        debug!(%user_id, resource, action, allowed, "permission check");
        Ok(allowed)
    }

    pub async fn has_role(&self, user_id: Uuid, role_name: &str) -> WardenResult<bool> {
        let user = self.users.get_with_roles(user_id).await?;
        Ok(rbac::has_role(&user, role_name))
    }

    pub async fn effective_permissions(&self, user_id: Uuid) -> WardenResult<Vec<Permission>> {
        let user = self.users.get_with_roles(user_id).await?;
        Ok(rbac::effective_permissions(&user))
    }
}
