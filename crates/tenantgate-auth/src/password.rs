//! Password hashing and verification.
//!
//! Two encodings coexist, selected by the stored [`HashType`]: legacy
//! Argon2id PHC strings and bcrypt. New hashes are always bcrypt; a
//! successful Argon2id verification triggers a background re-hash so
//! accounts move off Argon2id as their owners sign in.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tenantgate_core::error::{GateError, GateResult};
use tenantgate_core::models::user::{HashType, User};
use tenantgate_core::repository::UserRepository;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Crypto(format!("bcrypt hash: {e}")))
}

/// Hash a password as an Argon2id PHC string with explicit parameters.
///
/// Only legacy fixtures and imports need this; live hashing uses bcrypt.
pub fn hash_password_argon2id(password: &str, params: argon2::Params) -> Result<String, AuthError> {
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Crypto(format!("argon2 hash: {e}")))
}

/// Read the tuning parameters embedded in an Argon2id PHC string.
pub fn argon2_params(stored_hash: &str) -> Result<argon2::Params, AuthError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;
    argon2::Params::try_from(&parsed)
        .map_err(|e| AuthError::Crypto(format!("invalid argon2 params: {e}")))
}

/// Compare a candidate password against a stored hash of the given type.
///
/// Returns `Ok(false)` on mismatch and `Err(AuthError::Crypto)` when the
/// stored hash cannot be parsed.
pub fn compare_password(
    hash_type: HashType,
    stored_hash: &str,
    candidate: &str,
) -> Result<bool, AuthError> {
    match hash_type {
        HashType::Argon2id => verify_argon2id(stored_hash, candidate),
        HashType::Bcrypt => bcrypt::verify(candidate, stored_hash)
            .map_err(|e| AuthError::Crypto(format!("bcrypt verify: {e}"))),
    }
}

fn verify_argon2id(stored_hash: &str, candidate: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    // Hashes written under older tuning must keep verifying, so the
    // hasher is built from the stored string rather than from defaults.
    let params = argon2::Params::try_from(&parsed)
        .map_err(|e| AuthError::Crypto(format!("invalid argon2 params: {e}")))?;
    let algorithm = argon2::Algorithm::try_from(parsed.algorithm)
        .map_err(|e| AuthError::Crypto(format!("unsupported algorithm: {e}")))?;
    let version = match parsed.version {
        Some(v) => argon2::Version::try_from(v)
            .map_err(|e| AuthError::Crypto(format!("unsupported version: {e}")))?,
        None => argon2::Version::default(),
    };

    let argon2 = Argon2::new(algorithm, version, params);
    match argon2.verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Outcome of a background hash migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationEvent {
    Migrated { user_id: Uuid },
    Failed { user_id: Uuid, reason: String },
}

/// Verifies user passwords and migrates legacy hashes to bcrypt.
pub struct CredentialVerifier<U: UserRepository> {
    users: U,
    bcrypt_cost: u32,
    events: broadcast::Sender<MigrationEvent>,
}

impl<U: UserRepository + Clone + 'static> CredentialVerifier<U> {
    pub fn new(users: U, config: &AuthConfig) -> Self {
        let (events, _) = broadcast::channel(config.migration_event_capacity.max(1));
        Self {
            users,
            bcrypt_cost: config.bcrypt_cost,
            events,
        }
    }

    /// Receive [`MigrationEvent`]s for migrations started after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MigrationEvent> {
        self.events.subscribe()
    }

    /// Check `candidate` against the user's stored hash.
    ///
    /// Hashing runs on the blocking pool. A match against an Argon2id hash
    /// schedules a detached bcrypt migration; its result never affects the
    /// returned value.
    pub async fn verify(&self, user: &User, candidate: &str) -> GateResult<bool> {
        let hash_type = user.hash_type;
        let stored = user.password_hash.clone();
        let owned = candidate.to_owned();

        let matched =
            tokio::task::spawn_blocking(move || compare_password(hash_type, &stored, &owned))
                .await
                .map_err(|e| GateError::Internal(format!("password check task: {e}")))??;

        if matched && hash_type == HashType::Argon2id {
            self.spawn_migration(user.id, candidate.to_owned());
        }

        Ok(matched)
    }

    /// Spend the same bcrypt work a real check would, for logins that
    /// match no user. Keeps unknown and known logins indistinguishable by
    /// response time.
    pub async fn burn_unknown(&self, candidate: &str) -> GateResult<()> {
        let owned = candidate.to_owned();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || hash_password(&owned, cost))
            .await
            .map_err(|e| GateError::Internal(format!("password check task: {e}")))??;
        Ok(())
    }

    fn spawn_migration(&self, user_id: Uuid, password: String) -> JoinHandle<()> {
        let users = self.users.clone();
        let events = self.events.clone();
        let cost = self.bcrypt_cost;

        debug!(%user_id, "Scheduling bcrypt migration");
        tokio::spawn(async move {
            let outcome = match tokio::task::spawn_blocking(move || hash_password(&password, cost))
                .await
            {
                Ok(Ok(hash)) => users
                    .update_password(user_id, hash, HashType::Bcrypt)
                    .await
                    .map_err(|e| e.to_string()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("hash task: {e}")),
            };

            let event = match outcome {
                Ok(()) => {
                    info!(%user_id, "Migrated password hash to bcrypt");
                    MigrationEvent::Migrated { user_id }
                }
                Err(reason) => {
                    warn!(%user_id, error = %reason, "Password hash migration failed");
                    MigrationEvent::Failed { user_id, reason }
                }
            };
            // Sending fails only when nobody is subscribed.
            let _ = events.send(event);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn bcrypt_hash_then_compare() {
        let hash = hash_password("hunter22", TEST_COST).unwrap();
        assert!(compare_password(HashType::Bcrypt, &hash, "hunter22").unwrap());
        assert!(!compare_password(HashType::Bcrypt, &hash, "hunter23").unwrap());
    }

    #[test]
    fn argon2id_with_default_params() {
        let hash = hash_password_argon2id("hunter22", argon2::Params::default()).unwrap();
        assert!(compare_password(HashType::Argon2id, &hash, "hunter22").unwrap());
        assert!(!compare_password(HashType::Argon2id, &hash, "wrong-one").unwrap());
    }

    #[test]
    fn argon2id_with_non_default_params_still_verifies() {
        let params = argon2::Params::new(8 * 1024, 3, 2, None).unwrap();
        let hash = hash_password_argon2id("hunter22", params).unwrap();
        assert!(hash.contains("m=8192,t=3,p=2"));

        let embedded = argon2_params(&hash).unwrap();
        assert_eq!(embedded.m_cost(), 8 * 1024);
        assert_eq!(embedded.t_cost(), 3);
        assert_eq!(embedded.p_cost(), 2);

        assert!(compare_password(HashType::Argon2id, &hash, "hunter22").unwrap());
        assert!(!compare_password(HashType::Argon2id, &hash, "hunter23").unwrap());
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(compare_password(HashType::Argon2id, "not-a-hash", "pw").is_err());
        assert!(compare_password(HashType::Bcrypt, "not-a-hash", "pw").is_err());
    }

    #[test]
    fn hash_type_mismatch_is_an_error_not_a_match() {
        let bcrypt_hash = hash_password("hunter22", TEST_COST).unwrap();
        assert!(compare_password(HashType::Argon2id, &bcrypt_hash, "hunter22").is_err());
    }
}
