//! tenantgate core — domain models, error taxonomy, repository traits and
//! downstream collaborator contracts shared by every crate.

pub mod clients;
pub mod error;
pub mod models;
pub mod repository;
