//! Authentication error types.

use tenantgate_core::error::GateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is deactivated")]
    AccountDeactivated,

    #[error("account is not activated")]
    AccountNotActivated,

    #[error("one-time code mismatch")]
    OtpMismatch,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("session has been revoked")]
    SessionRevoked,

    #[error("session has expired")]
    SessionExpired,

    #[error("session not found")]
    SessionNotFound,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for GateError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountDeactivated
            | AuthError::AccountNotActivated
            | AuthError::OtpMismatch
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => GateError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::SessionRevoked => GateError::AuthorizationDenied {
                reason: err.to_string(),
            },
            AuthError::SessionExpired | AuthError::SessionNotFound => GateError::Validation {
                message: err.to_string(),
            },
            AuthError::Crypto(msg) => GateError::Crypto(msg),
        }
    }
}
