//! Password-reset tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Unused and strictly before expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct CreatePasswordResetToken {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_at: DateTime<Utc>, used_at: Option<DateTime<Utc>>) -> PasswordResetToken {
        PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "t".into(),
            expires_at,
            used_at,
            created_at: expires_at - Duration::minutes(30),
        }
    }

    #[test]
    fn valid_before_expiry() {
        let now = Utc::now();
        assert!(token(now + Duration::seconds(1), None).is_valid_at(now));
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = Utc::now();
        assert!(!token(now, None).is_valid_at(now));
    }

    #[test]
    fn used_token_is_invalid() {
        let now = Utc::now();
        assert!(!token(now + Duration::minutes(10), Some(now)).is_valid_at(now));
    }
}
