//! Session lifecycle: creation, lazy expiry, context pivots on refresh,
//! role-wide revocation and per-request access checks.
//!
//! There is no background sweeper. Expired rows of a user are purged the
//! next time that user logs in or refreshes. Concurrent logins of one
//! user are not serialised and may leave several live sessions, which is
//! the supported "many devices" behaviour.

use chrono::Utc;
use tenantgate_core::error::{GateError, GateResult};
use tenantgate_core::models::session::{CreateSession, Session, SessionFilter, UpdateSession};
use tenantgate_core::repository::{PaginatedResult, Pagination, SessionRepository};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token::{self, TableRef, TokenPair};

/// Input for the refresh flow. Every `Some` field replaces the session's
/// current value before the new pair is issued.
#[derive(Debug, Clone, Default)]
pub struct RefreshTokenInput {
    pub refresh_token: String,
    pub client_type_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
}

impl RefreshTokenInput {
    fn overrides(&self) -> UpdateSession {
        UpdateSession {
            project_id: self.project_id,
            env_id: self.env_id,
            client_type_id: self.client_type_id,
            role_id: self.role_id,
            ..Default::default()
        }
    }
}

/// A freshly created or refreshed session with its tokens.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    pub token: TokenPair,
    /// The user's live sessions after the purge, including this one.
    pub sessions: Vec<Session>,
    /// Expired sessions removed on the way in.
    pub purged_sessions: u64,
}

/// Context a valid access token grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub client_type_id: Option<Uuid>,
    pub client_platform_id: Option<Uuid>,
    pub tables: Vec<TableRef>,
    pub login_table_slug: Option<String>,
}

pub struct SessionManager<S: SessionRepository> {
    sessions: S,
    config: AuthConfig,
}

impl<S: SessionRepository> SessionManager<S> {
    pub fn new(sessions: S, config: AuthConfig) -> Self {
        Self { sessions, config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub async fn create(&self, input: CreateSession) -> GateResult<Uuid> {
        let session = self.sessions.create(input).await?;
        Ok(session.id)
    }

    pub async fn get(&self, id: Uuid) -> GateResult<Session> {
        self.sessions.get_by_id(id).await
    }

    pub async fn get_list(
        &self,
        filter: SessionFilter,
        pagination: Pagination,
    ) -> GateResult<PaginatedResult<Session>> {
        self.sessions.list(filter, pagination).await
    }

    pub async fn delete(&self, id: Uuid) -> GateResult<()> {
        self.sessions.delete(id).await
    }

    pub async fn delete_expired_user_sessions(&self, user_id: Uuid) -> GateResult<u64> {
        let purged = self.sessions.delete_expired_by_user(user_id).await?;
        if purged > 0 {
            debug!(%user_id, purged, "Purged expired sessions");
        }
        Ok(purged)
    }

    pub async fn user_sessions(&self, user_id: Uuid) -> GateResult<Vec<Session>> {
        self.sessions.list_by_user(user_id).await
    }

    /// Flag (or unflag) every session holding `role_id`. Flagged sessions
    /// fail [`has_access`](Self::has_access) even with unexpired tokens.
    pub async fn update_sessions_by_role_id(
        &self,
        role_id: Uuid,
        is_changed: bool,
    ) -> GateResult<u64> {
        let touched = self.sessions.update_by_role_id(role_id, is_changed).await?;
        info!(%role_id, is_changed, touched, "Updated sessions by role");
        Ok(touched)
    }

    /// Purge the user's expired sessions, create a new one and issue its
    /// token pair.
    pub async fn start(
        &self,
        input: CreateSession,
        tables: &[TableRef],
        login_table_slug: Option<&str>,
    ) -> GateResult<IssuedSession> {
        let user_id = input.user_id;
        let purged_sessions = self.delete_expired_user_sessions(user_id).await?;

        let session = self.sessions.create(input).await?;
        let token = token::issue_pair(&session, tables, login_table_slug, &self.config)?;
        let sessions = self.user_sessions(user_id).await?;

        info!(%user_id, session_id = %session.id, "Session started");
        Ok(IssuedSession {
            session,
            token,
            sessions,
            purged_sessions,
        })
    }

    /// Re-issue both tokens under the same session id, applying any
    /// context overrides first.
    pub async fn refresh_token(&self, input: RefreshTokenInput) -> GateResult<IssuedSession> {
        let claims = token::parse_claims(&input.refresh_token, &self.config.jwt_secret)?;
        let current = self.live_session(claims.id).await?;
        if !claims.belongs_to(current.user_id) {
            return Err(AuthError::TokenInvalid("user does not own the session".into()).into());
        }

        let purged_sessions = self.delete_expired_user_sessions(current.user_id).await?;
        let session = self.sessions.update(current.id, input.overrides()).await?;
        let token = token::issue_pair(
            &session,
            &claims.tables,
            claims.login_table_slug.as_deref(),
            &self.config,
        )?;
        let sessions = self.user_sessions(session.user_id).await?;

        debug!(session_id = %session.id, "Session refreshed");
        Ok(IssuedSession {
            session,
            token,
            sessions,
            purged_sessions,
        })
    }

    /// Validate an access token against its session.
    pub async fn has_access(&self, access_token: &str) -> GateResult<AccessGrant> {
        let claims = token::parse_claims(access_token, &self.config.jwt_secret)?;
        let session = self.live_session(claims.id).await?;
        if !claims.belongs_to(session.user_id) {
            return Err(AuthError::TokenInvalid("user does not own the session".into()).into());
        }

        Ok(AccessGrant {
            session_id: session.id,
            user_id: session.user_id,
            project_id: session.project_id,
            env_id: session.env_id,
            role_id: session.role_id,
            client_type_id: session.client_type_id,
            client_platform_id: session.client_platform_id,
            tables: claims.tables,
            login_table_slug: claims.login_table_slug,
        })
    }

    /// Delete the session an access token refers to. Expired access tokens
    /// are accepted.
    pub async fn logout(&self, access_token: &str) -> GateResult<()> {
        let claims = token::parse_claims_allow_expired(access_token, &self.config.jwt_secret)?;
        match self.sessions.delete(claims.id).await {
            Ok(()) => {
                info!(session_id = %claims.id, user_id = ?claims.user_id, "Logged out");
                Ok(())
            }
            Err(GateError::NotFound { .. }) => Err(AuthError::SessionNotFound.into()),
            Err(e) => Err(e),
        }
    }

    async fn live_session(&self, id: Uuid) -> GateResult<Session> {
        let session = match self.sessions.get_by_id(id).await {
            Ok(session) => session,
            Err(GateError::NotFound { .. }) => return Err(AuthError::SessionNotFound.into()),
            Err(e) => return Err(e),
        };

        if session.is_expired(Utc::now()) {
            return Err(AuthError::SessionExpired.into());
        }
        if session.is_changed {
            return Err(AuthError::SessionRevoked.into());
        }
        Ok(session)
    }
}
