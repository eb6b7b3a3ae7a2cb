//! Authentication service — login, refresh and session orchestration.

use std::sync::Arc;

use chrono::Utc;
use tenantgate_core::clients::{OAuthExchange, OtpVerifier};
use tenantgate_core::error::{GateError, GateResult};
use tenantgate_core::models::identity::Permission;
use tenantgate_core::models::session::{CreateSession, Session, SessionFilter};
use tenantgate_core::models::tenant::{NodeType, ResourceType, TenantContext};
use tenantgate_core::repository::{PaginatedResult, Pagination, SessionRepository, UserRepository};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password::MigrationEvent;
use crate::router::ServiceNodes;
use crate::session::{AccessGrant, IssuedSession, RefreshTokenInput, SessionManager};
use crate::strategy::{
    AuthenticatedLogin, LoginOutcome, LoginRequest, LoginStrategy, LoginStrategyDispatcher,
    Resolution, bounded,
};

/// Input for the legacy username/password login.
#[derive(Clone)]
pub struct LoginInput {
    pub login: String,
    pub password: String,
    pub project_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
    pub client_type_id: Option<Uuid>,
    pub client_platform_id: Option<Uuid>,
    pub node_type: NodeType,
    pub resource_type: ResourceType,
    pub ip: Option<String>,
}

impl std::fmt::Debug for LoginInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginInput")
            .field("login", &self.login)
            .field("project_id", &self.project_id)
            .field("node_type", &self.node_type)
            .finish_non_exhaustive()
    }
}

impl From<LoginInput> for LoginRequest {
    fn from(input: LoginInput) -> Self {
        let mut request = LoginRequest::new(LoginStrategy::Login, input.login, input.password);
        request.project_id = input.project_id;
        request.env_id = input.env_id;
        request.client_type_id = input.client_type_id;
        request.client_platform_id = input.client_platform_id;
        request.node_type = input.node_type;
        request.resource_type = input.resource_type;
        request.ip = input.ip;
        request
    }
}

/// Refresh that also reloads the permission set of the pivoted role.
#[derive(Debug, Clone)]
pub struct V2RefreshTokenInput {
    pub refresh: RefreshTokenInput,
    pub node_type: NodeType,
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone)]
pub struct V2RefreshOutput {
    pub issued: IssuedSession,
    /// Empty when the session carries no role.
    pub permissions: Vec<Permission>,
}

/// OTP and OAuth collaborators used by the dispatcher.
#[derive(Clone)]
pub struct Collaborators {
    pub otp: Arc<dyn OtpVerifier>,
    pub oauth: Arc<dyn OAuthExchange>,
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<U: UserRepository, S: SessionRepository> {
    dispatcher: LoginStrategyDispatcher<U>,
    sessions: SessionManager<S>,
    config: AuthConfig,
}

impl<U, S> AuthService<U, S>
where
    U: UserRepository + Clone + 'static,
    S: SessionRepository,
{
    pub fn new(
        user_repo: U,
        session_repo: S,
        router: Arc<ServiceNodes>,
        collaborators: Collaborators,
        config: AuthConfig,
    ) -> Self {
        let dispatcher = LoginStrategyDispatcher::new(
            user_repo,
            router,
            collaborators.otp,
            collaborators.oauth,
            config.clone(),
        );
        let sessions = SessionManager::new(session_repo, config.clone());
        Self {
            dispatcher,
            sessions,
            config,
        }
    }

    pub fn router(&self) -> &ServiceNodes {
        self.dispatcher.router()
    }

    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    pub fn subscribe_migrations(&self) -> broadcast::Receiver<MigrationEvent> {
        self.dispatcher.verifier().subscribe()
    }

    /// Legacy login: LOGIN strategy only, and a verified user the tenant
    /// does not know is an error.
    #[instrument(skip_all, fields(login = %input.login))]
    pub async fn login(&self, input: LoginInput) -> GateResult<LoginOutcome> {
        let outcome = self.v2_login(input.into()).await?;
        if !outcome.user_found() {
            return Err(GateError::NotFound {
                entity: "user".into(),
                id: "login".into(),
            });
        }
        Ok(outcome)
    }

    /// Login with any strategy. A verified contact without a user is
    /// returned as [`LoginOutcome::Unregistered`].
    #[instrument(skip_all, fields(strategy = %request.strategy, project_id = ?request.project_id))]
    pub async fn v2_login(&self, request: LoginRequest) -> GateResult<LoginOutcome> {
        let tenant = request.tenant();

        // 1. Verify the credential and resolve the identity.
        let (user_id, identity, local_user) = match self.dispatcher.dispatch(&request).await? {
            Resolution::Found {
                user_id,
                identity,
                local_user,
            } => (user_id, identity, local_user),
            Resolution::Unregistered { contact } => {
                info!(strategy = %request.strategy, "Verified contact is not registered");
                return Ok(LoginOutcome::Unregistered { contact, tenant });
            }
        };

        // 2. Prefer the tenant's view of role and client type.
        let role_id = identity
            .role
            .as_ref()
            .map(|r| r.id)
            .or_else(|| local_user.as_ref().and_then(|u| u.role_id));
        let client_type_id = identity
            .client_type
            .as_ref()
            .map(|c| c.id)
            .or(request.client_type_id)
            .or_else(|| local_user.as_ref().and_then(|u| u.client_type_id));

        // 3. Purge, create the session and issue tokens.
        let issued = self
            .sessions
            .start(
                CreateSession {
                    project_id: request.project_id,
                    env_id: request.env_id,
                    client_platform_id: request.client_platform_id,
                    client_type_id,
                    user_id,
                    role_id,
                    ip: request.ip.clone(),
                    data: Some(serde_json::json!({ "login_strategy": request.strategy.as_str() })),
                    expires_at: Utc::now() + self.config.refresh_ttl(),
                },
                &request.tables,
                request.login_table_slug.as_deref(),
            )
            .await?;

        info!(%user_id, session_id = %issued.session.id, "Login succeeded");
        Ok(LoginOutcome::Authenticated(Box::new(AuthenticatedLogin {
            user_id,
            issued,
            identity,
            tenant,
        })))
    }

    #[instrument(skip_all)]
    pub async fn refresh_token(&self, input: RefreshTokenInput) -> GateResult<IssuedSession> {
        self.sessions.refresh_token(input).await
    }

    #[instrument(skip_all, fields(node_type = %input.node_type))]
    pub async fn v2_refresh_token(&self, input: V2RefreshTokenInput) -> GateResult<V2RefreshOutput> {
        let issued = self.sessions.refresh_token(input.refresh).await?;

        let permissions = match issued.session.role_id {
            Some(role_id) => {
                let tenant = TenantContext {
                    project_id: issued.session.project_id,
                    env_id: issued.session.env_id,
                    node_type: input.node_type,
                    resource_type: input.resource_type,
                };
                let bundle = self
                    .router()
                    .get_by_node_type(&tenant.namespace(), tenant.node_type)?;
                let clients = bundle.resource(tenant.resource_type)?;
                bounded(
                    self.config.upstream_timeout(),
                    "permissions",
                    clients.permissions.role_permissions(tenant.project_id, role_id),
                )
                .await
                .inspect_err(|e| warn!(%role_id, error = %e, "Permission reload failed"))?
            }
            None => Vec::new(),
        };

        Ok(V2RefreshOutput {
            issued,
            permissions,
        })
    }

    pub async fn has_access(&self, access_token: &str) -> GateResult<AccessGrant> {
        self.sessions.has_access(access_token).await
    }

    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str) -> GateResult<()> {
        self.sessions.logout(access_token).await
    }

    pub async fn session_list(
        &self,
        filter: SessionFilter,
        pagination: Pagination,
    ) -> GateResult<PaginatedResult<Session>> {
        self.sessions.get_list(filter, pagination).await
    }

    pub async fn delete_session(&self, id: Uuid) -> GateResult<()> {
        self.sessions.delete(id).await.map_err(|e| match e {
            GateError::NotFound { .. } => AuthError::SessionNotFound.into(),
            other => other,
        })
    }

    #[instrument(skip(self))]
    pub async fn update_sessions_by_role_id(&self, role_id: Uuid, is_changed: bool) -> GateResult<u64> {
        self.sessions.update_sessions_by_role_id(role_id, is_changed).await
    }
}
