//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Encoding of a stored password hash.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HashType {
    /// Legacy Argon2id PHC string.
    Argon2id,
    Bcrypt,
}

impl HashType {
    pub fn code(self) -> i64 {
        match self {
            HashType::Argon2id => 1,
            HashType::Bcrypt => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(HashType::Argon2id),
            2 => Some(HashType::Bcrypt),
            _ => None,
        }
    }
}

/// Account state derived from the stored `active` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    /// `active == 0`: registered but never activated.
    NotActivated,
    /// `active < 0`: switched off by an administrator.
    Deactivated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub login: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub hash_type: HashType,
    pub active: i64,
    pub client_type_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn status(&self) -> UserStatus {
        match self.active {
            a if a > 0 => UserStatus::Active,
            0 => UserStatus::NotActivated,
            _ => UserStatus::Deactivated,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub project_id: Option<Uuid>,
    pub login: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Already-hashed password; hashing belongs to the auth layer.
    pub password_hash: String,
    pub hash_type: HashType,
    pub active: i64,
    pub client_type_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
}
