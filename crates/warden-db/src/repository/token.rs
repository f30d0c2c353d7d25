//! SurrealDB implementation of [`TokenRepository`].
//!
//! Revoked session tokens are keyed by the SHA-256 of the token string,
//! so a repeat revocation collides on the record id and is absorbed.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::token::{CreatePasswordResetToken, PasswordResetToken};
use warden_core::repository::TokenRepository;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

const RESET_FIELDS: &str = "meta::id(id) AS record_id, user_id, token, expires_at, \
                            used_at, created_at";

#[derive(Debug, SurrealValue)]
struct BlacklistRow {
    #[allow(dead_code)]
    token: String,
}

#[derive(Debug, SurrealValue)]
struct ResetTokenRow {
    record_id: String,
    user_id: String,
    token: String,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ResetTokenRow {
    fn try_into_token(self) -> Result<PasswordResetToken, DbError> {
        Ok(PasswordResetToken {
            id: parse_uuid(&self.record_id, "reset token")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            token: self.token,
            expires_at: self.expires_at,
            used_at: self.used_at,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct UsedRow {
    #[allow(dead_code)]
    used_at: Option<DateTime<Utc>>,
}

fn blacklist_key(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// SurrealDB implementation of the Token repository.
#[derive(Clone)]
pub struct SurrealTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TokenRepository for SurrealTokenRepository<C> {
    async fn blacklist(&self, token: &str, expires_at: DateTime<Utc>) -> WardenResult<()> {
        let outcome = self
            .db
            .query(
                "CREATE type::record('blacklisted_token', $key) SET \
                 token = $raw_token, expires_at = $expires_at",
            )
            .bind(("key", blacklist_key(token)))
            .bind(("raw_token", token.to_string()))
            .bind(("expires_at", expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "blacklisted token"));

        match outcome {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => {
                debug!("token already blacklisted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn is_blacklisted(&self, token: &str) -> WardenResult<bool> {
        let mut result = self
            .db
            .query("SELECT token FROM type::record('blacklisted_token', $key)")
            .bind(("key", blacklist_key(token)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BlacklistRow> = result.take(0).map_err(DbError::from)?;
        Ok(!rows.is_empty())
    }

    async fn purge_expired_blacklist(&self, now: DateTime<Utc>) -> WardenResult<u64> {
        // Count first, then delete, in one round trip.
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM blacklisted_token \
                 WHERE expires_at < $now GROUP ALL; \
                 DELETE blacklisted_token WHERE expires_at < $now;",
            )
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(count_rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn create_reset_token(
        &self,
        input: CreatePasswordResetToken,
    ) -> WardenResult<PasswordResetToken> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "CREATE type::record('password_reset_token', $id) SET \
                 user_id = $user_id, token = $raw_token, \
                 expires_at = $expires_at; \
                 SELECT {RESET_FIELDS} FROM type::record('password_reset_token', $id);"
            ))
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("raw_token", input.token))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write(e, "password reset token"))?;

        let rows: Vec<ResetTokenRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "password reset token".into(),
            id: id_str,
        })?;

        Ok(row.try_into_token()?)
    }

    async fn get_valid_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> WardenResult<PasswordResetToken> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {RESET_FIELDS} FROM password_reset_token \
                 WHERE token = $raw_token AND used_at = NONE AND expires_at > $now"
            ))
            .bind(("raw_token", token.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResetTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "password reset token".into(),
            id: "<redacted>".into(),
        })?;

        Ok(row.try_into_token()?)
    }

    async fn mark_reset_token_used(&self, id: Uuid, now: DateTime<Utc>) -> WardenResult<()> {
        // The WHERE clause makes this a compare-and-set: only one caller
        // can flip `used_at` from NONE.
        let mut result = self
            .db
            .query(
                "UPDATE type::record('password_reset_token', $id) \
                 SET used_at = $now WHERE used_at = NONE",
            )
            .bind(("id", id.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<UsedRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(WardenError::InvalidOrExpiredToken);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blacklist_key_is_stable_hex() {
        let key = blacklist_key("abc");
        assert_eq!(key.len(), 64);
        assert_eq!(key, blacklist_key("abc"));
        assert_ne!(key, blacklist_key("abd"));
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
