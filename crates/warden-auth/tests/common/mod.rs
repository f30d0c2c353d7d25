//! Shared setup for the auth integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use argon2::Params;
use chrono::{DateTime, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use warden_auth::config::AuthConfig;
use warden_auth::password::Argon2Hasher;
use warden_auth::service::{AuthService, NewUser};
use warden_auth::RbacAdmin;
use warden_core::FixedClock;
use warden_core::models::user::User;
use warden_db::repository::{
    SurrealPermissionRepository, SurrealRoleRepository, SurrealTokenRepository,
    SurrealUserRepository,
};

pub type Service = AuthService<SurrealUserRepository<Db>, SurrealTokenRepository<Db>>;
pub type Admin = RbacAdmin<
    SurrealUserRepository<Db>,
    SurrealRoleRepository<Db>,
    SurrealPermissionRepository<Db>,
>;

pub const SECRET: &str = "test-secret";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn config() -> AuthConfig {
    AuthConfig {
        jwt_secret: SECRET.into(),
        ..AuthConfig::default()
    }
}

/// Cheapest valid Argon2 cost keeps the suite fast.
pub fn cheap_hasher() -> Arc<Argon2Hasher> {
    Arc::new(Argon2Hasher::new(Params::new(8, 1, 1, None).unwrap(), None))
}

pub struct Harness {
    pub db: Surreal<Db>,
    pub clock: Arc<FixedClock>,
    pub service: Service,
    pub admin: Admin,
}

pub async fn setup() -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();

    let config = config();
    let clock = Arc::new(FixedClock::new(start()));
    let hasher = cheap_hasher();

    let service = AuthService::with_parts(
        SurrealUserRepository::new(db.clone()),
        SurrealTokenRepository::new(db.clone()),
        &config,
        hasher.clone(),
        clock.clone(),
    );
    let admin = RbacAdmin::new(
        SurrealUserRepository::new(db.clone()),
        SurrealRoleRepository::new(db.clone()),
        SurrealPermissionRepository::new(db.clone()),
        hasher,
    );

    Harness {
        db,
        clock,
        service,
        admin,
    }
}

pub async fn register(service: &Service, email: &str) -> User {
    service
        .register(NewUser {
            email: email.into(),
            name: "Ada Lovelace".into(),
            password: PASSWORD.into(),
        })
        .await
        .unwrap()
}
