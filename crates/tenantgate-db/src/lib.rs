//! tenantgate database — SurrealDB connection management and repository
//! implementations for sessions and users.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - [`repository`] implementations of the `tenantgate-core` traits

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbCredentials, DbManager};
pub use error::DbError;
pub use schema::{latest_version, run_migrations, schema_v1};
