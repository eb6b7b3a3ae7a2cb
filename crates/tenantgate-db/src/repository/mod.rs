//! SurrealDB repository implementations.

mod session;
mod user;

pub use session::SurrealSessionRepository;
pub use user::SurrealUserRepository;

use uuid::Uuid;

use crate::error::DbError;

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

fn parse_opt_uuid(field: &str, raw: Option<String>) -> Result<Option<Uuid>, DbError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| parse_uuid(field, &s))
        .transpose()
}

fn opt_to_string(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}
