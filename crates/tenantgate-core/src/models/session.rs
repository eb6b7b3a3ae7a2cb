//! Session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-side record binding a user and tenant context to a token pair.
///
/// A user may hold any number of sessions at once; they are never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
    pub client_platform_id: Option<Uuid>,
    pub client_type_id: Option<Uuid>,
    pub user_id: Uuid,
    pub role_id: Option<Uuid>,
    pub ip: Option<String>,
    /// Opaque payload carried for the client application.
    pub data: serde_json::Value,
    /// Revocation marker; a flagged session fails every access check.
    pub is_changed: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    pub project_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
    pub client_platform_id: Option<Uuid>,
    pub client_type_id: Option<Uuid>,
    pub user_id: Uuid,
    pub role_id: Option<Uuid>,
    pub ip: Option<String>,
    pub data: Option<serde_json::Value>,
    pub expires_at: DateTime<Utc>,
}

/// Partial update of a session. `None` leaves the field untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateSession {
    pub project_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
    pub client_platform_id: Option<Uuid>,
    pub client_type_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub is_changed: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl UpdateSession {
    pub fn is_empty(&self) -> bool {
        self.project_id.is_none()
            && self.env_id.is_none()
            && self.client_platform_id.is_none()
            && self.client_type_id.is_none()
            && self.role_id.is_none()
            && self.is_changed.is_none()
            && self.expires_at.is_none()
    }
}

/// Filters for listing sessions. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
}
