//! SurrealDB implementation of [`SessionRepository`].

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenantgate_core::error::GateResult;
use tenantgate_core::models::session::{CreateSession, Session, SessionFilter, UpdateSession};
use tenantgate_core::repository::{PaginatedResult, Pagination, SessionRepository};
use uuid::Uuid;

use super::{opt_to_string, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

const SESSION_COLUMNS: &str = "meta::id(id) AS record_id, project_id, env_id, \
     client_platform_id, client_type_id, user_id, role_id, ip, data, \
     is_changed, expires_at, created_at, updated_at";

#[derive(Debug, SurrealValue)]
struct SessionRow {
    record_id: String,
    project_id: Option<String>,
    env_id: Option<String>,
    client_platform_id: Option<String>,
    client_type_id: Option<String>,
    user_id: String,
    role_id: Option<String>,
    ip: Option<String>,
    data: serde_json::Value,
    is_changed: bool,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> Result<Session, DbError> {
        Ok(Session {
            id: parse_uuid("session", &self.record_id)?,
            project_id: parse_opt_uuid("project", self.project_id)?,
            env_id: parse_opt_uuid("env", self.env_id)?,
            client_platform_id: parse_opt_uuid("client platform", self.client_platform_id)?,
            client_type_id: parse_opt_uuid("client type", self.client_type_id)?,
            user_id: parse_uuid("user", &self.user_id)?,
            role_id: parse_opt_uuid("role", self.role_id)?,
            ip: self.ip,
            data: self.data,
            is_changed: self.is_changed,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn rows_into_sessions(rows: Vec<SessionRow>) -> Result<Vec<Session>, DbError> {
    rows.into_iter().map(SessionRow::try_into_session).collect()
}

/// SurrealDB implementation of the Session repository.
#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<Session, DbError> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {SESSION_COLUMNS} FROM type::record('session', $id)"
            ))
            .bind(("id", id.to_string()))
            .await?;

        let rows: Vec<SessionRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: id.to_string(),
        })?;

        row.try_into_session()
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: CreateSession) -> GateResult<Session> {
        let id_str = Uuid::new_v4().to_string();
        let data = input
            .data
            .unwrap_or(serde_json::Value::Object(Default::default()));

        self.db
            .query(
                "CREATE type::record('session', $id) SET \
                 project_id = $project_id, \
                 env_id = $env_id, \
                 client_platform_id = $client_platform_id, \
                 client_type_id = $client_type_id, \
                 user_id = $user_id, \
                 role_id = $role_id, \
                 ip = $ip, \
                 data = $data, \
                 is_changed = false, \
                 expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("project_id", opt_to_string(input.project_id)))
            .bind(("env_id", opt_to_string(input.env_id)))
            .bind((
                "client_platform_id",
                opt_to_string(input.client_platform_id),
            ))
            .bind(("client_type_id", opt_to_string(input.client_type_id)))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("role_id", opt_to_string(input.role_id)))
            .bind(("ip", input.ip))
            .bind(("data", data))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(self.fetch(&id_str).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> GateResult<Session> {
        Ok(self.fetch(&id.to_string()).await?)
    }

    async fn update(&self, id: Uuid, input: UpdateSession) -> GateResult<Session> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.project_id.is_some() {
            sets.push("project_id = $project_id");
        }
        if input.env_id.is_some() {
            sets.push("env_id = $env_id");
        }
        if input.client_platform_id.is_some() {
            sets.push("client_platform_id = $client_platform_id");
        }
        if input.client_type_id.is_some() {
            sets.push("client_type_id = $client_type_id");
        }
        if input.role_id.is_some() {
            sets.push("role_id = $role_id");
        }
        if input.is_changed.is_some() {
            sets.push("is_changed = $is_changed");
        }
        if input.expires_at.is_some() {
            sets.push("expires_at = $expires_at");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('session', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(project_id) = input.project_id {
            builder = builder.bind(("project_id", project_id.to_string()));
        }
        if let Some(env_id) = input.env_id {
            builder = builder.bind(("env_id", env_id.to_string()));
        }
        if let Some(client_platform_id) = input.client_platform_id {
            builder = builder.bind(("client_platform_id", client_platform_id.to_string()));
        }
        if let Some(client_type_id) = input.client_type_id {
            builder = builder.bind(("client_type_id", client_type_id.to_string()));
        }
        if let Some(role_id) = input.role_id {
            builder = builder.bind(("role_id", role_id.to_string()));
        }
        if let Some(is_changed) = input.is_changed {
            builder = builder.bind(("is_changed", is_changed));
        }
        if let Some(expires_at) = input.expires_at {
            builder = builder.bind(("expires_at", expires_at));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        // UPDATE on a missing record is a no-op, so the re-read doubles as
        // the existence check.
        Ok(self.fetch(&id_str).await?)
    }

    async fn delete(&self, id: Uuid) -> GateResult<()> {
        let id_str = id.to_string();
        self.fetch(&id_str).await?;

        self.db
            .query("DELETE type::record('session', $id)")
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(())
    }

    async fn list(
        &self,
        filter: SessionFilter,
        pagination: Pagination,
    ) -> GateResult<PaginatedResult<Session>> {
        let mut conditions = Vec::new();
        if filter.user_id.is_some() {
            conditions.push("user_id = $user_id");
        }
        if filter.project_id.is_some() {
            conditions.push("project_id = $project_id");
        }
        if filter.role_id.is_some() {
            conditions.push("role_id = $role_id");
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let count_query =
            format!("SELECT count() AS total FROM session{where_clause} GROUP ALL");
        let list_query = format!(
            "SELECT {SESSION_COLUMNS} FROM session{where_clause} \
             ORDER BY created_at ASC \
             LIMIT $limit START $offset"
        );

        let mut builder = self
            .db
            .query(count_query)
            .query(list_query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        if let Some(user_id) = filter.user_id {
            builder = builder.bind(("user_id", user_id.to_string()));
        }
        if let Some(project_id) = filter.project_id {
            builder = builder.bind(("project_id", project_id.to_string()));
        }
        if let Some(role_id) = filter.role_id {
            builder = builder.bind(("role_id", role_id.to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        let rows: Vec<SessionRow> = result.take(1).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows_into_sessions(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_user(&self, user_id: Uuid) -> GateResult<Vec<Session>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT {SESSION_COLUMNS} FROM session \
                 WHERE user_id = $user_id ORDER BY created_at ASC"
            ))
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_sessions(rows)?)
    }

    async fn delete_expired_by_user(&self, user_id: Uuid) -> GateResult<u64> {
        // A single cut-off keeps the count and the delete in agreement.
        // `check` surfaces a failed DELETE; the count alone would hide it.
        let now = Utc::now();

        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE user_id = $user_id AND expires_at < $now \
                 GROUP ALL",
            )
            .query("DELETE session WHERE user_id = $user_id AND expires_at < $now")
            .bind(("user_id", user_id.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(count_rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn update_by_role_id(&self, role_id: Uuid, is_changed: bool) -> GateResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE role_id = $role_id GROUP ALL",
            )
            .query(
                "UPDATE session SET \
                 is_changed = $is_changed, updated_at = time::now() \
                 WHERE role_id = $role_id",
            )
            .bind(("role_id", role_id.to_string()))
            .bind(("is_changed", is_changed))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(count_rows.first().map(|r| r.total).unwrap_or(0))
    }
}
