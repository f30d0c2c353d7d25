//! Warden Server: connects the credential store, applies the schema and
//! seeds the default roles and permissions.

use std::process::ExitCode;
use std::sync::Arc;

use surrealdb::engine::remote::ws::Client;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use warden_auth::rbac::roles;
use warden_auth::{Argon2Hasher, AuthConfig, AuthService, NewUser, RbacAdmin};
use warden_core::error::{WardenError, WardenResult};
use warden_db::repository::{
    SurrealPermissionRepository, SurrealRoleRepository, SurrealTokenRepository,
    SurrealUserRepository,
};
use warden_db::{DbConfig, DbError, DbManager};

type Service = AuthService<SurrealUserRepository<Client>, SurrealTokenRepository<Client>>;
type Admin = RbacAdmin<
    SurrealUserRepository<Client>,
    SurrealRoleRepository<Client>,
    SurrealPermissionRepository<Client>,
>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warden=info")),
        )
        .json()
        .init();

    info!("Starting Warden bootstrap...");

    match run().await {
        Ok(()) => {
            info!("Warden bootstrap complete.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Warden bootstrap failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> WardenResult<()> {
    let auth_config = AuthConfig::from_env();
    auth_config.validate()?;

    let db_config = DbConfig::from_env();
    let manager = DbManager::connect(&db_config)
        .await
        .map_err(DbError::from)?;
    let db = manager.client().clone();

    warden_db::run_migrations(&db).await?;

    let hasher = Arc::new(Argon2Hasher::from_config(&auth_config)?);
    let admin = RbacAdmin::new(
        SurrealUserRepository::new(db.clone()),
        SurrealRoleRepository::new(db.clone()),
        SurrealPermissionRepository::new(db.clone()),
        hasher,
    );
    admin.seed_defaults().await?;

    let service = AuthService::new(
        SurrealUserRepository::new(db.clone()),
        SurrealTokenRepository::new(db.clone()),
        &auth_config,
    )?;

    let purged = service.sessions().purge_expired().await?;
    info!(purged, "Blacklist cleaned");

    if let (Ok(email), Ok(password)) = (
        std::env::var("WARDEN_ADMIN_EMAIL"),
        std::env::var("WARDEN_ADMIN_PASSWORD"),
    ) {
        ensure_admin(&service, &admin, email, password).await?;
    }

    Ok(())
}

/// Register the bootstrap administrator if missing and give it the admin role.
async fn ensure_admin(
    service: &Service,
    admin: &Admin,
    email: String,
    password: String,
) -> WardenResult<()> {
    let user_id = match service
        .register(NewUser {
            email: email.clone(),
            name: "Administrator".into(),
            password,
        })
        .await
    {
        Ok(user) => user.id,
        Err(WardenError::AlreadyExists { .. }) => {
            warn!("Bootstrap admin already registered; ensuring role only");
            admin.get_user_by_email(&email).await?.id
        }
        Err(e) => return Err(e),
    };

    let role = admin.get_role_by_name(roles::ADMIN).await?;
    admin.assign_role_to_user(user_id, role.role.id).await?;
    info!(%user_id, "Bootstrap admin ready");
    Ok(())
}
