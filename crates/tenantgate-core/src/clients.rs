//! Contracts for downstream collaborators.
//!
//! Transports (gRPC clients, SMS gateways, OAuth providers) are outside
//! this workspace; they plug in through these object-safe traits so a
//! tenant registry can hold heterogeneous clients behind `Arc<dyn _>`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::GateResult;
use crate::models::identity::{IdentityQuery, IdentityResult, Permission};

/// Resolves canonical identity inside a tenant's cluster.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Returns `user_found = false` rather than an error when no user
    /// matches the key.
    async fn lookup(&self, query: IdentityQuery) -> GateResult<IdentityResult>;
}

/// Lists table grants for a role within a project.
#[async_trait]
pub trait PermissionService: Send + Sync {
    async fn role_permissions(
        &self,
        project_id: Option<Uuid>,
        role_id: Uuid,
    ) -> GateResult<Vec<Permission>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpChannel {
    Email,
    Phone,
}

/// One-time code previously sent to a contact.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub channel: OtpChannel,
    pub recipient: String,
    /// Identifier of the delivery request, when the code is bound to one.
    pub request_id: Option<String>,
    pub code: String,
}

/// Confirms one-time codes issued by the SMS/Email service.
#[async_trait]
pub trait OtpVerifier: Send + Sync {
    /// `Ok(false)` means the code did not match.
    async fn confirm(&self, challenge: OtpChallenge) -> GateResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Apple,
}

impl OAuthProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Apple => "apple",
        }
    }
}

/// Exchanges a provider artifact (ID token or authorization code) for the
/// verified email address it belongs to.
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    async fn verified_email(&self, provider: OAuthProvider, artifact: &str) -> GateResult<String>;
}
