//! Natal Server: composition root.
//!
//! Loads configuration, connects to SurrealDB, brings the schema up to
//! date and wires the services. A missing encryption key outside
//! development stops the process before anything is served.

mod bootstrap;

use std::process::ExitCode;

use natal_auth::{AdminService, AuditTrail, AuthConfig, AuthService, ProtectionConfig};
use natal_core::env::ProcessEnv;
use natal_core::error::NatalResult;
use natal_db::repository::{
    SurrealAuditLogRepository, SurrealBirthRepository, SurrealCorrectionRepository,
    SurrealMotherRepository, SurrealNewbornRepository, SurrealRoleRepository,
    SurrealUserRepository,
};
use natal_db::{DbConfig, DbManager};
use natal_records::RecordsService;
use surrealdb::engine::remote::ws::Client;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type Users = SurrealUserRepository<Client>;
type Roles = SurrealRoleRepository<Client>;
type AuditLog = SurrealAuditLogRepository<Client>;

/// Everything the (external) request layer calls into.
#[allow(dead_code)]
struct Services {
    auth: AuthService<Users, Roles, AuditLog>,
    admin: AdminService<Users, Roles, AuditLog>,
    records: RecordsService<
        SurrealMotherRepository<Client>,
        SurrealBirthRepository<Client>,
        SurrealNewbornRepository<Client>,
        SurrealCorrectionRepository<Client>,
        AuditLog,
    >,
    audit: AuditTrail<AuditLog>,
}

async fn run() -> NatalResult<()> {
    let protection = ProtectionConfig::from_env()?;
    let crypto = protection.crypto()?;
    let auth_config = AuthConfig::from_env();
    let db_config = DbConfig::from_env();
    info!(environment = ?protection.environment(), "configuration loaded");

    let manager = DbManager::connect(&db_config).await?;
    manager.prepare().await?;
    let db = manager.client().clone();

    let users = SurrealUserRepository::new(db.clone());
    let roles = SurrealRoleRepository::new(db.clone());
    bootstrap::ensure_superuser(&users, &auth_config, &ProcessEnv).await?;

    let audit = AuditTrail::new(
        SurrealAuditLogRepository::new(db.clone()),
        crypto.clone(),
        auth_config.audit_query_limit,
    );
    let _services = Services {
        auth: AuthService::new(
            users.clone(),
            roles.clone(),
            audit.clone(),
            auth_config.clone(),
        ),
        admin: AdminService::new(users, roles, audit.clone(), auth_config),
        records: RecordsService::new(
            SurrealMotherRepository::new(db.clone()),
            SurrealBirthRepository::new(db.clone()),
            SurrealNewbornRepository::new(db.clone()),
            SurrealCorrectionRepository::new(db),
            audit.clone(),
            crypto,
        ),
        audit,
    };

    info!("natal core ready");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| natal_core::error::NatalError::Internal(e.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("natal=info".parse().unwrap()))
        .json()
        .init();

    info!("Starting natal server...");

    match run().await {
        Ok(()) => {
            info!("natal server stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "natal server failed to start");
            ExitCode::FAILURE
        }
    }
}
