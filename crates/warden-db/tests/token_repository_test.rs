//! Integration tests for the Token repository (session blacklist and
//! password reset tokens).

use chrono::{DateTime, Duration, Utc};
use warden_core::error::WardenError;
use warden_core::models::token::CreatePasswordResetToken;
use warden_core::repository::TokenRepository;
use warden_db::repository::SurrealTokenRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();
    db
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

#[tokio::test]
async fn blacklist_is_idempotent() {
    let db = setup().await;
    let repo = SurrealTokenRepository::new(db);
    let expires = at(1_700_003_600);

    assert!(!repo.is_blacklisted("header.payload.sig").await.unwrap());

    repo.blacklist("header.payload.sig", expires).await.unwrap();
    repo.blacklist("header.payload.sig", expires).await.unwrap();

    assert!(repo.is_blacklisted("header.payload.sig").await.unwrap());
    assert!(!repo.is_blacklisted("header.payload.other").await.unwrap());
}

#[tokio::test]
async fn purge_removes_only_expired_rows() {
    let db = setup().await;
    let repo = SurrealTokenRepository::new(db);

    repo.blacklist("old", at(1_700_000_000)).await.unwrap();
    repo.blacklist("fresh", at(1_700_010_000)).await.unwrap();

    let removed = repo
        .purge_expired_blacklist(at(1_700_005_000))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(!repo.is_blacklisted("old").await.unwrap());
    assert!(repo.is_blacklisted("fresh").await.unwrap());
}

#[tokio::test]
async fn reset_token_validity_window() {
    let db = setup().await;
    let repo = SurrealTokenRepository::new(db);
    let now = at(1_700_000_000);
    let user_id = uuid::Uuid::new_v4();

    let created = repo
        .create_reset_token(CreatePasswordResetToken {
            user_id,
            token: "opaque-token".into(),
            expires_at: now + Duration::minutes(30),
        })
        .await
        .unwrap();
    assert_eq!(created.user_id, user_id);
    assert!(created.used_at.is_none());

    let found = repo.get_valid_reset_token("opaque-token", now).await.unwrap();
    assert_eq!(found.id, created.id);

    // Expiry is exclusive: a token expiring exactly now is invalid.
    let err = repo
        .get_valid_reset_token("opaque-token", now + Duration::minutes(30))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = repo
        .get_valid_reset_token("unknown", now)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn reset_token_is_marked_used_once() {
    let db = setup().await;
    let repo = SurrealTokenRepository::new(db);
    let now = at(1_700_000_000);

    let created = repo
        .create_reset_token(CreatePasswordResetToken {
            user_id: uuid::Uuid::new_v4(),
            token: "opaque-token".into(),
            expires_at: now + Duration::minutes(30),
        })
        .await
        .unwrap();

    repo.mark_reset_token_used(created.id, now).await.unwrap();

    let err = repo
        .mark_reset_token_used(created.id, now)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::InvalidOrExpiredToken));

    let err = repo
        .get_valid_reset_token("opaque-token", now)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn duplicate_reset_token_string_is_rejected() {
    let db = setup().await;
    let repo = SurrealTokenRepository::new(db);
    let now = at(1_700_000_000);

    let input = CreatePasswordResetToken {
        user_id: uuid::Uuid::new_v4(),
        token: "same".into(),
        expires_at: now + Duration::minutes(30),
    };
    repo.create_reset_token(input.clone()).await.unwrap();
    let err = repo.create_reset_token(input).await.unwrap_err();
    assert!(matches!(err, WardenError::AlreadyExists { .. }));
}
