//! Database-specific error types and conversions.

use tenantgate_core::error::GateError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Corrupt row: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for GateError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GateError::NotFound { entity, id },
            other => GateError::Database(other.to_string()),
        }
    }
}
