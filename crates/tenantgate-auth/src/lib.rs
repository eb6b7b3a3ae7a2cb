//! tenantgate auth — credential verification with hash migration, JWT
//! issuance bound to revocable sessions, tenant routing and the login
//! strategy dispatcher.

pub mod config;
pub mod error;
pub mod password;
pub mod router;
pub mod service;
pub mod session;
pub mod strategy;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use password::{CredentialVerifier, MigrationEvent};
pub use router::{NodeError, ResourceClients, ServiceBundle, ServiceNodes};
pub use service::AuthService;
pub use session::SessionManager;
pub use strategy::{
    AuthenticatedLogin, LoginOutcome, LoginRequest, LoginStrategy, LoginStrategyDispatcher,
    VerifiedContact,
};
pub use token::{SessionClaims, TableRef, TokenPair};
