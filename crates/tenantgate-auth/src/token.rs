//! HS256 JWT issuance and parsing.
//!
//! Tokens are capability references: the `id` claim names a server-side
//! [`Session`], and a token is only honoured while that session exists
//! and is not flagged. Claim names are fixed for compatibility with
//! tokens already in circulation.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use tenantgate_core::models::session::Session;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Claims layout written by this crate. Tokens without `ver` predate it.
pub const CLAIMS_VERSION: u16 = 2;

fn legacy_version() -> u16 {
    1
}

/// Row reference a client was logged in through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub table_slug: String,
    pub object_id: String,
}

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Session id.
    pub id: Uuid,
    #[serde(default, with = "blank_uuid")]
    pub role_id: Option<Uuid>,
    #[serde(default, with = "blank_uuid")]
    pub project_id: Option<Uuid>,
    #[serde(default, with = "blank_uuid")]
    pub client_platform_id: Option<Uuid>,
    #[serde(default, with = "blank_uuid")]
    pub client_type_id: Option<Uuid>,
    /// Absent (or blank) only in legacy tokens.
    #[serde(default, with = "blank_uuid")]
    pub user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tables: Vec<TableRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_table_slug: Option<String>,
    #[serde(default = "legacy_version")]
    pub ver: u16,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    /// Claims for `session`; `iat`/`exp` are filled in at signing time.
    pub fn for_session(
        session: &Session,
        tables: Vec<TableRef>,
        login_table_slug: Option<String>,
    ) -> Self {
        Self {
            id: session.id,
            role_id: session.role_id,
            project_id: session.project_id,
            client_platform_id: session.client_platform_id,
            client_type_id: session.client_type_id,
            user_id: Some(session.user_id),
            tables,
            login_table_slug,
            ver: CLAIMS_VERSION,
            iat: 0,
            exp: 0,
        }
    }

    /// Whether the token may act for `user_id`. Legacy tokens without a
    /// user claim are bound by their session alone.
    pub fn belongs_to(&self, user_id: Uuid) -> bool {
        self.user_id.is_none_or(|id| id == user_id)
    }
}

/// Legacy tokens encode missing ids as `""`; keep doing so on the way out.
mod blank_uuid {
    use serde::{Deserialize, Deserializer, Serializer};
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(value: &Option<Uuid>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => s.collect_str(id),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Uuid>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => Uuid::parse_str(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<TableRef>, D::Error> {
    Ok(Option::<Vec<TableRef>>::deserialize(d)?.unwrap_or_default())
}

/// Sign `claims` with HS256, stamping `iat` now and `exp` after `ttl`.
pub fn generate_jwt(
    mut claims: SessionClaims,
    ttl: chrono::Duration,
    secret: &str,
) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::Crypto("empty signing secret".into()));
    }

    let now = Utc::now().timestamp();
    claims.iat = now;
    claims.exp = now + ttl.num_seconds();
    claims.ver = CLAIMS_VERSION;

    let key = EncodingKey::from_secret(secret.as_bytes());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Verify signature and expiry, then decode the claims.
pub fn parse_claims(token: &str, secret: &str) -> Result<SessionClaims, AuthError> {
    decode(token, secret, true)
}

/// Like [`parse_claims`] but accepts tokens past `exp`. Used where an
/// expired token still legitimately names its session, e.g. logout.
pub fn parse_claims_allow_expired(token: &str, secret: &str) -> Result<SessionClaims, AuthError> {
    decode(token, secret, false)
}

fn decode(token: &str, secret: &str, validate_exp: bool) -> Result<SessionClaims, AuthError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = validate_exp;
    validation.set_required_spec_claims(&["exp"]);

    jsonwebtoken::decode::<SessionClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid(e.to_string()),
        })
}

/// Access/refresh pair issued for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Session (and refresh token) expiry.
    pub expires_at: DateTime<Utc>,
    /// Seconds until the access token should be refreshed.
    pub refresh_in_seconds: i64,
}

/// Issue both tokens for `session`. They share the session id.
pub fn issue_pair(
    session: &Session,
    tables: &[TableRef],
    login_table_slug: Option<&str>,
    config: &AuthConfig,
) -> Result<TokenPair, AuthError> {
    let claims = SessionClaims::for_session(
        session,
        tables.to_vec(),
        login_table_slug.map(str::to_owned),
    );

    let access_token = generate_jwt(claims.clone(), config.access_ttl(), &config.jwt_secret)?;
    let refresh_token = generate_jwt(claims, config.refresh_ttl(), &config.jwt_secret)?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        created_at: session.created_at,
        updated_at: session.updated_at,
        expires_at: session.expires_at,
        refresh_in_seconds: config.access_ttl().num_seconds(),
    })
}
