//! Error types for the tenantgate system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    /// Malformed or too-short input. Covers the InvalidArgument class,
    /// including references to sessions that are missing or expired.
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Upstream service {service} failed: {message}")]
    Upstream { service: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GateResult<T> = Result<T, GateError>;

impl GateError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Validation and authentication failures are final for the request
    /// that produced them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::AuthenticationFailed { .. }
        )
    }

    /// Generic message shown to end users. The precise cause stays in the
    /// logs.
    pub fn public_message(&self, locale: Locale) -> &'static str {
        match self {
            Self::Validation { .. } => match locale {
                Locale::En => "The submitted data is invalid",
                Locale::Ru => "Отправленные данные некорректны",
                Locale::Uz => "Yuborilgan ma'lumotlar noto'g'ri",
            },
            Self::AuthenticationFailed { .. } | Self::NotFound { .. } => match locale {
                Locale::En => "Incorrect login or password",
                Locale::Ru => "Неверный логин или пароль",
                Locale::Uz => "Login yoki parol noto'g'ri",
            },
            Self::AuthorizationDenied { .. } => match locale {
                Locale::En => "Your session is no longer valid, please sign in again",
                Locale::Ru => "Сессия недействительна, войдите снова",
                Locale::Uz => "Sessiya yaroqsiz, qaytadan kiring",
            },
            Self::AlreadyExists { .. }
            | Self::Upstream { .. }
            | Self::Database(_)
            | Self::Crypto(_)
            | Self::Internal(_) => match locale {
                Locale::En => "Something went wrong, please try again later",
                Locale::Ru => "Что-то пошло не так, попробуйте позже",
                Locale::Uz => "Xatolik yuz berdi, keyinroq urinib ko'ring",
            },
        }
    }
}

/// Languages supported for user-facing error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Ru,
    Uz,
}

impl Locale {
    /// Parse an `Accept-Language`-style tag, falling back to English.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag.split(['-', '_', ',', ';']).next().unwrap_or_default();
        match primary.trim().to_ascii_lowercase().as_str() {
            "ru" => Self::Ru,
            "uz" => Self::Uz,
            _ => Self::En,
        }
    }
}
