//! Integration tests for the authentication service.

mod common;

use chrono::Duration;
use surrealdb_types::SurrealValue;
use common::{PASSWORD, register, setup, start};
use warden_auth::service::NewUser;
use warden_core::error::WardenError;
use warden_core::repository::{TokenRepository, UserRepository};
use warden_db::repository::{SurrealTokenRepository, SurrealUserRepository};

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[tokio::test]
async fn register_then_login() {
    let h = setup().await;
    let user = register(&h.service, "ada@example.com").await;

    assert_ne!(user.password_hash, PASSWORD);
    assert!(user.password_hash.starts_with("$argon2id$"));

    let logged_in = h.service.login("ada@example.com", PASSWORD).await.unwrap();
    assert_eq!(logged_in.user.id, user.id);
    assert_eq!(logged_in.user.last_login, Some(start()));
    assert!(logged_in.roles.is_empty());
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let h = setup().await;
    register(&h.service, "ada@example.com").await;

    let unknown = h
        .service
        .login("nobody@example.com", PASSWORD)
        .await
        .unwrap_err();
    let wrong = h
        .service
        .login("ada@example.com", "not the password")
        .await
        .unwrap_err();

    assert!(matches!(unknown, WardenError::InvalidCredentials));
    assert!(matches!(wrong, WardenError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn inactive_accounts_can_still_log_in() {
    let h = setup().await;
    let user = register(&h.service, "ada@example.com").await;
    h.admin.set_user_active(user.id, false).await.unwrap();

    let logged_in = h.service.login("ada@example.com", PASSWORD).await.unwrap();
    assert!(!logged_in.user.is_active);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let h = setup().await;
    register(&h.service, "ada@example.com").await;

    let err = h
        .service
        .register(NewUser {
            email: "ada@example.com".into(),
            name: "Impostor".into(),
            password: "whatever".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::AlreadyExists { .. }));
}

#[tokio::test]
async fn session_token_round_trip() {
    let h = setup().await;
    let user = register(&h.service, "ada@example.com").await;

    let out = h
        .service
        .login_with_token("ada@example.com", PASSWORD)
        .await
        .unwrap();
    assert_eq!(out.expires_at, start() + Duration::hours(24));

    let claims = h.service.authenticate(&out.token).await.unwrap();
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.user.user.email, "ada@example.com");
    assert!(claims.user.user.password_hash.is_empty());
}

#[tokio::test]
async fn session_token_expires_on_the_clock() {
    let h = setup().await;
    register(&h.service, "ada@example.com").await;
    let out = h
        .service
        .login_with_token("ada@example.com", PASSWORD)
        .await
        .unwrap();

    h.clock.advance(Duration::hours(24));
    let err = h.service.authenticate(&out.token).await.unwrap_err();
    assert!(matches!(err, WardenError::TokenExpired), "{err:?}");
}

#[tokio::test]
async fn revoked_token_is_rejected_before_expiry() {
    let h = setup().await;
    register(&h.service, "ada@example.com").await;
    let out = h
        .service
        .login_with_token("ada@example.com", PASSWORD)
        .await
        .unwrap();

    h.service.logout(&out.token, out.expires_at).await.unwrap();
    h.service.logout(&out.token, out.expires_at).await.unwrap();

    assert!(h.service.sessions().is_revoked(&out.token).await.unwrap());
    let err = h.service.authenticate(&out.token).await.unwrap_err();
    assert!(matches!(err, WardenError::TokenRevoked), "{err:?}");
}

#[tokio::test]
async fn logout_token_uses_the_token_expiry() {
    let h = setup().await;
    register(&h.service, "ada@example.com").await;
    let out = h
        .service
        .login_with_token("ada@example.com", PASSWORD)
        .await
        .unwrap();

    h.service.logout_token(&out.token).await.unwrap();
    assert!(matches!(
        h.service.authenticate(&out.token).await.unwrap_err(),
        WardenError::TokenRevoked
    ));

    // Still blacklisted one second before expiry, purgeable after it.
    h.clock.set(out.expires_at - Duration::seconds(1));
    assert_eq!(h.service.sessions().purge_expired().await.unwrap(), 0);
    h.clock.set(out.expires_at + Duration::seconds(1));
    assert_eq!(h.service.sessions().purge_expired().await.unwrap(), 1);
}

#[tokio::test]
async fn garbage_bearer_tokens_are_malformed() {
    let h = setup().await;
    let err = h.service.authenticate("not-a-jwt").await.unwrap_err();
    assert!(matches!(err, WardenError::MalformedToken(_)), "{err:?}");
}

#[tokio::test]
async fn reset_request_for_unknown_email_writes_nothing() {
    let h = setup().await;
    let token = h
        .service
        .request_password_reset("nobody@example.com")
        .await
        .unwrap();
    assert!(token.is_none());

    let mut result = h
        .db
        .query("SELECT count() AS total FROM password_reset_token GROUP ALL")
        .await
        .unwrap();
    let rows: Vec<CountRow> = result.take(0).unwrap();
    assert_eq!(rows.first().map_or(0, |r| r.total), 0);
}

#[tokio::test]
async fn reset_token_row_expires_thirty_minutes_out() {
    let h = setup().await;
    let user = register(&h.service, "ada@example.com").await;

    let token = h
        .service
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .expect("known email yields a token");
    assert_eq!(token.len(), 43);

    let tokens = SurrealTokenRepository::new(h.db.clone());
    let row = tokens.get_valid_reset_token(&token, start()).await.unwrap();
    assert_eq!(row.user_id, user.id);
    assert_eq!(row.expires_at, start() + Duration::minutes(30));
    assert!(row.used_at.is_none());
}

#[tokio::test]
async fn reset_token_is_consumed_exactly_once() {
    let h = setup().await;
    register(&h.service, "ada@example.com").await;
    let token = h
        .service
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();

    h.service
        .reset_password(&token, "a brand new password", Some("a brand new password"))
        .await
        .unwrap();

    h.service
        .login("ada@example.com", "a brand new password")
        .await
        .unwrap();
    assert!(matches!(
        h.service.login("ada@example.com", PASSWORD).await.unwrap_err(),
        WardenError::InvalidCredentials
    ));

    let err = h
        .service
        .reset_password(&token, "yet another password", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::InvalidOrExpiredToken), "{err:?}");
}

#[tokio::test]
async fn reset_token_expiring_now_is_invalid() {
    let h = setup().await;
    register(&h.service, "ada@example.com").await;
    let token = h
        .service
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();

    h.clock.advance(Duration::minutes(30));
    let err = h
        .service
        .reset_password(&token, "a brand new password", None)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::InvalidOrExpiredToken), "{err:?}");
}

#[tokio::test]
async fn mismatched_confirmation_touches_nothing() {
    let h = setup().await;
    let user = register(&h.service, "ada@example.com").await;
    let token = h
        .service
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();

    let err = h
        .service
        .reset_password(&token, "a brand new password", Some("a brand new passw0rd"))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Validation { .. }), "{err:?}");

    // Token unused and password unchanged.
    let tokens = SurrealTokenRepository::new(h.db.clone());
    assert!(tokens.get_valid_reset_token(&token, start()).await.is_ok());
    let users = SurrealUserRepository::new(h.db.clone());
    assert_eq!(
        users.get_by_id(user.id).await.unwrap().password_hash,
        user.password_hash
    );
}
