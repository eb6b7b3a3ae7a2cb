//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations live in
//! `tenantgate-db`; the auth layer depends only on these contracts.

use uuid::Uuid;

use crate::error::GateResult;
use crate::models::{
    session::{CreateSession, Session, SessionFilter, UpdateSession},
    user::{CreateUser, HashType, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = GateResult<Session>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GateResult<Session>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateSession,
    ) -> impl Future<Output = GateResult<Session>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = GateResult<()>> + Send;
    fn list(
        &self,
        filter: SessionFilter,
        pagination: Pagination,
    ) -> impl Future<Output = GateResult<PaginatedResult<Session>>> + Send;

    /// Every session of a user, oldest first.
    fn list_by_user(&self, user_id: Uuid) -> impl Future<Output = GateResult<Vec<Session>>> + Send;

    /// Delete the user's sessions whose `expires_at` is in the past.
    /// Returns the number of rows removed.
    fn delete_expired_by_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = GateResult<u64>> + Send;

    /// Set `is_changed` on every session holding `role_id`. Returns the
    /// number of rows touched.
    fn update_by_role_id(
        &self,
        role_id: Uuid,
        is_changed: bool,
    ) -> impl Future<Output = GateResult<u64>> + Send;
}

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = GateResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GateResult<User>> + Send;
    fn get_by_login(&self, login: &str) -> impl Future<Output = GateResult<User>> + Send;

    /// Replace the stored hash, e.g. after migrating to another encoding.
    fn update_password(
        &self,
        id: Uuid,
        password_hash: String,
        hash_type: HashType,
    ) -> impl Future<Output = GateResult<()>> + Send;

    fn set_active(&self, id: Uuid, active: i64) -> impl Future<Output = GateResult<()>> + Send;
}
