//! Identity data exchanged with downstream identity services.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub client_type_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientType {
    pub id: Uuid,
    pub name: String,
}

/// Table-level grant as reported by the permission service. Carried,
/// never evaluated, by this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub table_slug: String,
    pub read: bool,
    pub write: bool,
    pub update: bool,
    pub delete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
}

/// Canonical identity resolved by a downstream identity service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityResult {
    pub user_found: bool,
    pub user_id: Option<Uuid>,
    pub role: Option<Role>,
    pub client_type: Option<ClientType>,
    pub permissions: Vec<Permission>,
    pub companies: Vec<Company>,
}

impl IdentityResult {
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// What the identity service should look the user up by.
#[derive(Clone, PartialEq, Eq)]
pub enum IdentityKey {
    /// Locally verified user.
    UserId(Uuid),
    Email(String),
    Phone(String),
    /// Unverified credentials handed through for downstream verification.
    Credentials { login: String, password: String },
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::UserId(id) => f.debug_tuple("UserId").field(id).finish(),
            IdentityKey::Email(email) => f.debug_tuple("Email").field(email).finish(),
            IdentityKey::Phone(phone) => f.debug_tuple("Phone").field(phone).finish(),
            IdentityKey::Credentials { login, .. } => f
                .debug_struct("Credentials")
                .field("login", login)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityQuery {
    pub project_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
    pub client_type_id: Option<Uuid>,
    pub key: IdentityKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_password() {
        let key = IdentityKey::Credentials {
            login: "alice1".into(),
            password: "s3cret-pass".into(),
        };
        let rendered = format!("{key:?}");
        assert!(rendered.contains("alice1"));
        assert!(!rendered.contains("s3cret-pass"));
    }
}
