//! Authentication configuration.

use std::time::Duration;

/// Configuration for the authentication engine.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for HS256 token signing.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 3600 = 1 hour).
    pub access_token_lifetime_secs: u64,
    /// Refresh token and session lifetime in seconds
    /// (default: 2_592_000 = 30 days).
    pub refresh_token_lifetime_secs: u64,
    /// bcrypt work factor for new and migrated hashes.
    pub bcrypt_cost: u32,
    /// Minimum length of LOGIN usernames and passwords.
    pub min_credential_length: usize,
    /// Upper bound for every downstream call (identity, OTP, OAuth).
    pub upstream_timeout_secs: u64,
    /// Buffer of the hash-migration event channel.
    pub migration_event_capacity: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_lifetime_secs: 3600,
            refresh_token_lifetime_secs: 2_592_000,
            bcrypt_cost: 10,
            min_credential_length: 6,
            upstream_timeout_secs: 10,
            migration_event_capacity: 64,
        }
    }
}

impl AuthConfig {
    /// Upper bound for either token lifetime (ten years).
    pub const MAX_TOKEN_LIFETIME_SECS: u64 = 10 * 365 * 24 * 3600;

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn access_ttl(&self) -> chrono::Duration {
        bounded_ttl(self.access_token_lifetime_secs)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        bounded_ttl(self.refresh_token_lifetime_secs)
    }
}

/// Lifetimes beyond the cap are clamped to it.
fn bounded_ttl(secs: u64) -> chrono::Duration {
    let secs = secs.min(AuthConfig::MAX_TOKEN_LIFETIME_SECS) as i64;
    chrono::Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lifetimes() {
        let config = AuthConfig::default();
        assert_eq!(config.access_ttl(), chrono::Duration::hours(1));
        assert_eq!(config.refresh_ttl(), chrono::Duration::days(30));
    }

    #[test]
    fn oversized_lifetimes_are_clamped() {
        let config = AuthConfig {
            access_token_lifetime_secs: u64::MAX,
            refresh_token_lifetime_secs: u64::MAX,
            ..AuthConfig::default()
        };
        let cap = chrono::Duration::seconds(AuthConfig::MAX_TOKEN_LIFETIME_SECS as i64);
        assert_eq!(config.access_ttl(), cap);
        assert_eq!(config.refresh_ttl(), cap);
    }
}
