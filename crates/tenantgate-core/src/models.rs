//! Domain models for tenantgate.

pub mod identity;
pub mod session;
pub mod tenant;
pub mod user;
