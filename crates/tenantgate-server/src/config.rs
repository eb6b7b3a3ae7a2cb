//! Process configuration read from `TENANTGATE_*` environment variables.

use std::str::FromStr;

use tenantgate_auth::AuthConfig;
use tenantgate_db::{DbConfig, DbCredentials};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub auth: AuthConfig,
    /// Registry namespace of the shared LOW/HIGH cluster.
    pub shared_namespace: String,
    /// Dedicated ENTERPRISE clusters registered at startup.
    pub enterprise_namespaces: Vec<String>,
    /// `EnvFilter` directives for the JSON logger.
    pub log_filter: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_defaults = DbConfig::default();
        let auth_defaults = AuthConfig::default();

        let jwt_secret = lookup("TENANTGATE_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("TENANTGATE_JWT_SECRET"))?;

        let credentials = match lookup("TENANTGATE_DB_USERNAME") {
            Some(username) => Some(DbCredentials {
                username,
                password: lookup("TENANTGATE_DB_PASSWORD").unwrap_or_default(),
            }),
            None => db_defaults.credentials,
        };
        let db = DbConfig {
            endpoint: lookup("TENANTGATE_DB_ENDPOINT").unwrap_or(db_defaults.endpoint),
            namespace: lookup("TENANTGATE_DB_NAMESPACE").unwrap_or(db_defaults.namespace),
            database: lookup("TENANTGATE_DB_DATABASE").unwrap_or(db_defaults.database),
            credentials,
        };

        let auth = AuthConfig {
            jwt_secret,
            access_token_lifetime_secs: lifetime(
                &lookup,
                "TENANTGATE_ACCESS_TOKEN_TTL_SECS",
                auth_defaults.access_token_lifetime_secs,
            )?,
            refresh_token_lifetime_secs: lifetime(
                &lookup,
                "TENANTGATE_REFRESH_TOKEN_TTL_SECS",
                auth_defaults.refresh_token_lifetime_secs,
            )?,
            bcrypt_cost: parsed(&lookup, "TENANTGATE_BCRYPT_COST", auth_defaults.bcrypt_cost)?,
            min_credential_length: parsed(
                &lookup,
                "TENANTGATE_MIN_CREDENTIAL_LENGTH",
                auth_defaults.min_credential_length,
            )?,
            upstream_timeout_secs: parsed(
                &lookup,
                "TENANTGATE_UPSTREAM_TIMEOUT_SECS",
                auth_defaults.upstream_timeout_secs,
            )?,
            migration_event_capacity: auth_defaults.migration_event_capacity,
        };

        Ok(Self {
            db,
            auth,
            shared_namespace: lookup("TENANTGATE_SHARED_NAMESPACE")
                .unwrap_or_else(|| "shared".into()),
            enterprise_namespaces: lookup("TENANTGATE_ENTERPRISE_NAMESPACES")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|ns| !ns.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| "tenantgate=info".into()),
        })
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

/// Token lifetime in seconds: non-zero and no longer than
/// [`AuthConfig::MAX_TOKEN_LIFETIME_SECS`].
fn lifetime(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    let secs = parsed(lookup, key, default)?;
    if secs == 0 || secs > AuthConfig::MAX_TOKEN_LIFETIME_SECS {
        return Err(ConfigError::Invalid {
            key,
            value: secs.to_string(),
        });
    }
    Ok(secs)
}
