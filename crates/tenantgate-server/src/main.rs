//! tenantgate server — application entry point.

mod config;
mod registry;

use std::sync::Arc;

use tenantgate_auth::AuthService;
use tenantgate_auth::service::Collaborators;
use tenantgate_db::DbManager;
use tenantgate_db::repository::{SurrealSessionRepository, SurrealUserRepository};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::registry::{Unconfigured, build_registry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .json()
        .init();

    info!("Starting tenantgate server...");

    let db = DbManager::connect(&config.db).await?;
    tenantgate_db::run_migrations(db.client()).await?;

    let router = build_registry(&config)?;

    let unconfigured = Arc::new(Unconfigured);
    let service = AuthService::new(
        SurrealUserRepository::new(db.client().clone()),
        SurrealSessionRepository::new(db.client().clone()),
        router,
        Collaborators {
            otp: unconfigured.clone(),
            oauth: unconfigured,
        },
        config.auth.clone(),
    );

    info!(
        shared_namespace = %service.router().shared_namespace(),
        nodes = service.router().len(),
        "tenantgate server ready"
    );

    tokio::signal::ctrl_c().await?;

    info!("tenantgate server stopped.");
    Ok(())
}
