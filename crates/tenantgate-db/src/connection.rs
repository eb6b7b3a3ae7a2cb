//! SurrealDB connection management.
//!
//! The endpoint scheme picks the engine: `ws://host:port` for a remote
//! cluster, `mem://` for an embedded in-memory store used in local runs.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::{debug, info};

use crate::error::DbError;

/// Root credentials for a remote endpoint.
#[derive(Clone)]
pub struct DbCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Engine endpoint, e.g. `ws://127.0.0.1:8000` or `mem://`.
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Skipped for embedded engines.
    pub credentials: Option<DbCredentials>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000".into(),
            namespace: "tenantgate".into(),
            database: "auth".into(),
            credentials: Some(DbCredentials {
                username: "root".into(),
                password: "root".into(),
            }),
        }
    }
}

impl DbConfig {
    pub fn is_embedded(&self) -> bool {
        self.endpoint.starts_with("mem://")
    }
}

/// Holds the session and user store connection.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Open the endpoint, sign in when credentials apply and select the
    /// configured namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            endpoint = %config.endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = any::connect(config.endpoint.as_str()).await?;

        match &config.credentials {
            Some(credentials) if !config.is_embedded() => {
                db.signin(Root {
                    username: credentials.username.clone(),
                    password: credentials.password.clone(),
                })
                .await?;
            }
            _ => debug!("Skipping root sign-in"),
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Connected to SurrealDB");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_endpoint_detection() {
        let mut config = DbConfig::default();
        assert!(!config.is_embedded());
        config.endpoint = "mem://".into();
        assert!(config.is_embedded());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = DbCredentials {
            username: "root".into(),
            password: "hunter22".into(),
        };
        assert!(!format!("{credentials:?}").contains("hunter22"));
    }

    #[tokio::test]
    async fn connects_to_embedded_store() {
        let config = DbConfig {
            endpoint: "mem://".into(),
            credentials: None,
            ..DbConfig::default()
        };
        let manager = DbManager::connect(&config).await.unwrap();
        crate::run_migrations(manager.client()).await.unwrap();
    }
}
