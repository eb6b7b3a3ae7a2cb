//! SurrealDB implementation of [`UserRepository`].
//!
//! Hashing happens in the auth layer; rows store the hash together with
//! its encoding code so legacy and current hashes can coexist.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tenantgate_core::error::GateResult;
use tenantgate_core::models::user::{CreateUser, HashType, User};
use tenantgate_core::repository::UserRepository;
use uuid::Uuid;

use super::{opt_to_string, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

const USER_COLUMNS: &str = "meta::id(id) AS record_id, project_id, login, email, \
     phone, password_hash, hash_type, active, client_type_id, role_id, \
     created_at, updated_at";

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    project_id: Option<String>,
    login: String,
    email: Option<String>,
    phone: Option<String>,
    password_hash: String,
    hash_type: i64,
    active: i64,
    client_type_id: Option<String>,
    role_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let hash_type = HashType::from_code(self.hash_type)
            .ok_or_else(|| DbError::Decode(format!("unknown hash type: {}", self.hash_type)))?;
        Ok(User {
            id: parse_uuid("user", &self.record_id)?,
            project_id: parse_opt_uuid("project", self.project_id)?,
            login: self.login,
            email: self.email,
            phone: self.phone,
            password_hash: self.password_hash,
            hash_type,
            active: self.active,
            client_type_id: parse_opt_uuid("client type", self.client_type_id)?,
            role_id: parse_opt_uuid("role", self.role_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(
        &self,
        condition: &str,
        key: &'static str,
        value: String,
    ) -> Result<User, DbError> {
        let mut result = self
            .db
            .query(format!("SELECT {USER_COLUMNS} FROM {condition}"))
            .bind((key, value.clone()))
            .await?;

        let rows: Vec<UserRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: format!("{key}={value}"),
        })?;

        row.try_into_user()
    }

    async fn apply(&self, id: Uuid, assignments: &str, binds: UserBinds) -> Result<(), DbError> {
        let id_str = id.to_string();
        // Existence check: UPDATE on a missing record silently matches
        // nothing.
        self.fetch_one("type::record('user', $id)", "id", id_str.clone())
            .await?;

        let mut builder = self
            .db
            .query(format!(
                "UPDATE type::record('user', $id) SET {assignments}, \
                 updated_at = time::now()"
            ))
            .bind(("id", id_str));
        match binds {
            UserBinds::Password {
                password_hash,
                hash_type,
            } => {
                builder = builder
                    .bind(("password_hash", password_hash))
                    .bind(("hash_type", hash_type));
            }
            UserBinds::Active(active) => {
                builder = builder.bind(("active", active));
            }
        }

        builder
            .await?
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;
        Ok(())
    }
}

enum UserBinds {
    Password {
        password_hash: String,
        hash_type: i64,
    },
    Active(i64),
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> GateResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        self.db
            .query(
                "CREATE type::record('user', $id) SET \
                 project_id = $project_id, \
                 login = $login, email = $email, phone = $phone, \
                 password_hash = $password_hash, \
                 hash_type = $hash_type, \
                 active = $active, \
                 client_type_id = $client_type_id, \
                 role_id = $role_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("project_id", opt_to_string(input.project_id)))
            .bind(("login", input.login))
            .bind(("email", input.email))
            .bind(("phone", input.phone))
            .bind(("password_hash", input.password_hash))
            .bind(("hash_type", input.hash_type.code()))
            .bind(("active", input.active))
            .bind(("client_type_id", opt_to_string(input.client_type_id)))
            .bind(("role_id", opt_to_string(input.role_id)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(self
            .fetch_one("type::record('user', $id)", "id", id_str)
            .await?)
    }

    async fn get_by_id(&self, id: Uuid) -> GateResult<User> {
        Ok(self
            .fetch_one("type::record('user', $id)", "id", id.to_string())
            .await?)
    }

    async fn get_by_login(&self, login: &str) -> GateResult<User> {
        Ok(self
            .fetch_one("user WHERE login = $login", "login", login.to_string())
            .await?)
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: String,
        hash_type: HashType,
    ) -> GateResult<()> {
        Ok(self
            .apply(
                id,
                "password_hash = $password_hash, hash_type = $hash_type",
                UserBinds::Password {
                    password_hash,
                    hash_type: hash_type.code(),
                },
            )
            .await?)
    }

    async fn set_active(&self, id: Uuid, active: i64) -> GateResult<()> {
        Ok(self
            .apply(id, "active = $active", UserBinds::Active(active))
            .await?)
    }
}
