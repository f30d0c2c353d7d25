//! HS256 session token issuance/verification and opaque reset token
//! generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use warden_core::models::user::UserWithRoles;

use crate::config::DEFAULT_SESSION_TTL_HOURS;
use crate::error::AuthError;

/// The only accepted `alg` header value.
const SESSION_ALG: &str = "HS256";

/// JWT claims embedded in every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user ID (UUID string).
    pub sub: String,
    /// Snapshot of the user, roles and permissions at issuance. The
    /// password hash is never serialized.
    pub user: UserWithRoles,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

impl SessionClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Parse a session lifetime in hours. Absent, non-numeric or
/// non-positive values give the 24 hour default.
pub fn parse_ttl_hours(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|h| *h > 0)
        .unwrap_or(DEFAULT_SESSION_TTL_HOURS)
}

/// Issue a signed HS256 session token valid for `ttl_hours` from `now`.
pub fn issue_session_token(
    user: &UserWithRoles,
    secret: &str,
    ttl_hours: i64,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let iat = now.timestamp();
    let claims = SessionClaims {
        sub: user.user.id.to_string(),
        user: user.clone(),
        iat,
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Verify a session token's algorithm, signature and expiry against `now`.
///
/// The header's `alg` is read and checked before any key is used, so a
/// token cannot pick its own verifier.
pub fn verify_session_token(
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<SessionClaims, AuthError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken(
            "expected three dot-separated segments".into(),
        ));
    };

    check_algorithm(header)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    let claims = jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName => AuthError::InvalidSignature,
        _ => AuthError::MalformedToken(e.to_string()),
    })?;

    if now.timestamp() >= claims.exp {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

fn check_algorithm(header_segment: &str) -> Result<(), AuthError> {
    let raw = URL_SAFE_NO_PAD
        .decode(header_segment)
        .map_err(|e| AuthError::MalformedToken(format!("header encoding: {e}")))?;
    let header: serde_json::Value = serde_json::from_slice(&raw)
        .map_err(|e| AuthError::MalformedToken(format!("header JSON: {e}")))?;

    match header.get("alg").and_then(serde_json::Value::as_str) {
        Some(SESSION_ALG) => Ok(()),
        _ => Err(AuthError::InvalidSignature),
    }
}

/// Generate a cryptographically random opaque reset token
/// (32 bytes → base64url-encoded, no padding).
pub fn generate_reset_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use warden_core::models::user::User;

    use super::*;

    const SECRET: &str = "test-secret";

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn sample_user() -> UserWithRoles {
        let now = at(1_700_000_000);
        UserWithRoles {
            user: User {
                id: Uuid::new_v4(),
                email: "ada@example.com".into(),
                name: "Ada".into(),
                password_hash: "$argon2id$v=19$secret-material".into(),
                is_active: true,
                last_login: None,
                created_at: now,
                updated_at: now,
            },
            roles: vec![],
        }
    }

    fn forge(header: &str, payload: &str) -> String {
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn jwt_roundtrip() {
        let user = sample_user();
        let now = at(1_700_000_000);

        let token = issue_session_token(&user, SECRET, 24, now).unwrap();
        let claims = verify_session_token(&token, SECRET, now).unwrap();

        assert_eq!(claims.sub, user.user.id.to_string());
        assert_eq!(claims.user.user.email, "ada@example.com");
        assert_eq!(claims.issued_at(), now);
        assert_eq!(claims.expires_at(), now + Duration::hours(24));
    }

    #[test]
    fn password_hash_never_enters_the_token() {
        let token = issue_session_token(&sample_user(), SECRET, 1, at(1_700_000_000)).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let json = String::from_utf8(URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret-material"));
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let now = at(1_700_000_000);
        let token = issue_session_token(&sample_user(), SECRET, 1, now).unwrap();
        let err = verify_session_token(&token, "other-secret", now).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature), "{err:?}");
    }

    #[test]
    fn expiry_is_exclusive() {
        let now = at(1_700_000_000);
        let token = issue_session_token(&sample_user(), SECRET, 1, now).unwrap();

        let just_before = now + Duration::hours(1) - Duration::seconds(1);
        assert!(verify_session_token(&token, SECRET, just_before).is_ok());

        let err = verify_session_token(&token, SECRET, now + Duration::hours(1)).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired), "{err:?}");
    }

    #[test]
    fn alg_none_is_rejected() {
        let token = forge(
            r#"{"alg":"none","typ":"JWT"}"#,
            r#"{"sub":"x","iat":0,"exp":99999999999}"#,
        );
        let err = verify_session_token(&token, SECRET, at(1_700_000_000)).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature), "{err:?}");
    }

    #[test]
    fn other_hmac_algorithms_are_rejected() {
        let now = at(1_700_000_000);
        let claims = SessionClaims {
            sub: "x".into(),
            user: sample_user(),
            iat: now.timestamp(),
            exp: now.timestamp() + 3600,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = verify_session_token(&token, SECRET, now).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature), "{err:?}");
    }

    #[test]
    fn malformed_tokens() {
        let now = at(1_700_000_000);
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.e30.sig"] {
            let err = verify_session_token(token, SECRET, now).unwrap_err();
            assert!(matches!(err, AuthError::MalformedToken(_)), "{token}: {err:?}");
        }
    }

    #[test]
    fn ttl_parsing_defaults() {
        assert_eq!(parse_ttl_hours(None), 24);
        assert_eq!(parse_ttl_hours(Some("")), 24);
        assert_eq!(parse_ttl_hours(Some("abc")), 24);
        assert_eq!(parse_ttl_hours(Some("0")), 24);
        assert_eq!(parse_ttl_hours(Some("-3")), 24);
        assert_eq!(parse_ttl_hours(Some("72")), 72);
        assert_eq!(parse_ttl_hours(Some(" 8 ")), 8);
    }

    #[test]
    fn reset_token_is_url_safe() {
        let token = generate_reset_token();
        // base64url characters only (A-Z a-z 0-9 - _), no padding.
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        // 32 bytes → 43 base64url chars.
        assert_eq!(token.len(), 43);
    }

    #[test]
    fn reset_tokens_are_unique() {
        assert_ne!(generate_reset_token(), generate_reset_token());
    }
}
