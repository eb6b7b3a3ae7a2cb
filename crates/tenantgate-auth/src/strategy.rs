//! Login strategy dispatch.
//!
//! A login attempt moves through: credential submitted → strategy
//! verified (or failed) → identity resolved in the tenant's cluster →
//! either a user is found and a session is issued, or the contact is
//! verified but unregistered. The latter is a normal outcome that lets
//! client apps continue into registration with an already-verified email
//! or phone.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tenantgate_core::clients::{OAuthExchange, OAuthProvider, OtpChallenge, OtpChannel, OtpVerifier};
use tenantgate_core::error::{GateError, GateResult};
use tenantgate_core::models::identity::{IdentityKey, IdentityQuery, IdentityResult};
use tenantgate_core::models::tenant::{NodeType, ResourceType, TenantContext};
use tenantgate_core::models::user::{User, UserStatus};
use tenantgate_core::repository::UserRepository;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password::CredentialVerifier;
use crate::router::ServiceNodes;
use crate::session::IssuedSession;
use crate::token::TableRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginStrategy {
    /// Username + password, verified against the local user store.
    Login,
    /// Email + code bound to a delivery request id.
    Email,
    /// Email + code bound to the address alone.
    EmailOtp,
    Phone,
    PhoneOtp,
    GoogleAuth,
    AppleAuth,
    /// Credentials handed to the tenant's identity service unverified.
    Default,
}

impl LoginStrategy {
    /// Parse a wire tag. Unknown tags select [`LoginStrategy::Default`].
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "LOGIN" => LoginStrategy::Login,
            "EMAIL" => LoginStrategy::Email,
            "EMAIL_OTP" => LoginStrategy::EmailOtp,
            "PHONE" => LoginStrategy::Phone,
            "PHONE_OTP" => LoginStrategy::PhoneOtp,
            "GOOGLE_AUTH" => LoginStrategy::GoogleAuth,
            "APPLE_AUTH" => LoginStrategy::AppleAuth,
            _ => LoginStrategy::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoginStrategy::Login => "LOGIN",
            LoginStrategy::Email => "EMAIL",
            LoginStrategy::EmailOtp => "EMAIL_OTP",
            LoginStrategy::Phone => "PHONE",
            LoginStrategy::PhoneOtp => "PHONE_OTP",
            LoginStrategy::GoogleAuth => "GOOGLE_AUTH",
            LoginStrategy::AppleAuth => "APPLE_AUTH",
            LoginStrategy::Default => "DEFAULT",
        }
    }
}

impl fmt::Display for LoginStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A login attempt as submitted by a client.
#[derive(Clone)]
pub struct LoginRequest {
    pub strategy: LoginStrategy,
    /// Login, email or phone, depending on the strategy. Unused by OAuth.
    pub identifier: String,
    /// Password, one-time code or OAuth artifact.
    pub secret: String,
    /// Delivery request the code was sent under (`Email`/`Phone`).
    pub otp_request_id: Option<String>,
    pub project_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
    pub client_type_id: Option<Uuid>,
    pub client_platform_id: Option<Uuid>,
    pub node_type: NodeType,
    pub resource_type: ResourceType,
    pub ip: Option<String>,
    pub tables: Vec<TableRef>,
    pub login_table_slug: Option<String>,
}

impl LoginRequest {
    pub fn new(strategy: LoginStrategy, identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            strategy,
            identifier: identifier.into(),
            secret: secret.into(),
            otp_request_id: None,
            project_id: None,
            env_id: None,
            client_type_id: None,
            client_platform_id: None,
            node_type: NodeType::Low,
            resource_type: ResourceType::Document,
            ip: None,
            tables: Vec::new(),
            login_table_slug: None,
        }
    }

    pub fn tenant(&self) -> TenantContext {
        TenantContext {
            project_id: self.project_id,
            env_id: self.env_id,
            node_type: self.node_type,
            resource_type: self.resource_type,
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("strategy", &self.strategy)
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("node_type", &self.node_type)
            .field("resource_type", &self.resource_type)
            .finish_non_exhaustive()
    }
}

/// Validated credential for one strategy.
#[derive(Clone)]
pub enum Credential {
    Password { login: String, password: String },
    Otp(OtpChallenge),
    OAuth { provider: OAuthProvider, artifact: String },
    Passthrough { login: String, password: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password { login, .. } => {
                f.debug_struct("Password").field("login", login).finish_non_exhaustive()
            }
            Credential::Otp(challenge) => f
                .debug_struct("Otp")
                .field("channel", &challenge.channel)
                .field("recipient", &challenge.recipient)
                .finish_non_exhaustive(),
            Credential::OAuth { provider, .. } => {
                f.debug_struct("OAuth").field("provider", provider).finish_non_exhaustive()
            }
            Credential::Passthrough { login, .. } => f
                .debug_struct("Passthrough")
                .field("login", login)
                .finish_non_exhaustive(),
        }
    }
}

/// Contact proven by the strategy but not known to the tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifiedContact {
    Login(String),
    Email(String),
    Phone(String),
}

/// Result of dispatching a login attempt up to identity resolution.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found {
        user_id: Uuid,
        identity: IdentityResult,
        /// Present for strategies verified against the local store.
        local_user: Option<User>,
    },
    Unregistered {
        contact: VerifiedContact,
    },
}

/// Successful login with an issued session.
#[derive(Debug, Clone)]
pub struct AuthenticatedLogin {
    pub user_id: Uuid,
    pub issued: IssuedSession,
    pub identity: IdentityResult,
    pub tenant: TenantContext,
}

/// Terminal state of a login attempt.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(Box<AuthenticatedLogin>),
    /// The contact was proven but no user exists for it in the tenant.
    Unregistered {
        contact: VerifiedContact,
        tenant: TenantContext,
    },
}

impl LoginOutcome {
    pub fn user_found(&self) -> bool {
        matches!(self, LoginOutcome::Authenticated(_))
    }

    pub fn authenticated(&self) -> Option<&AuthenticatedLogin> {
        match self {
            LoginOutcome::Authenticated(login) => Some(login),
            LoginOutcome::Unregistered { .. } => None,
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if digits.len() >= 7 && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(cleaned)
    } else {
        None
    }
}

fn non_empty(value: &str, what: &str) -> GateResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GateError::validation(format!("{what} is required")));
    }
    Ok(trimmed.to_string())
}

/// Check the request's shape for its strategy.
pub fn validate(request: &LoginRequest, min_credential_length: usize) -> GateResult<Credential> {
    match request.strategy {
        LoginStrategy::Login => {
            let login = request.identifier.trim();
            if login.chars().count() < min_credential_length
                || request.secret.chars().count() < min_credential_length
            {
                return Err(GateError::validation(format!(
                    "login and password must be at least {min_credential_length} characters"
                )));
            }
            Ok(Credential::Password {
                login: login.to_string(),
                password: request.secret.clone(),
            })
        }
        LoginStrategy::Email | LoginStrategy::EmailOtp => {
            let email = request.identifier.trim().to_lowercase();
            if !is_valid_email(&email) {
                return Err(GateError::validation("invalid email address"));
            }
            let request_id = match request.strategy {
                LoginStrategy::Email => Some(non_empty(
                    request.otp_request_id.as_deref().unwrap_or_default(),
                    "otp request id",
                )?),
                _ => None,
            };
            Ok(Credential::Otp(OtpChallenge {
                channel: OtpChannel::Email,
                recipient: email,
                request_id,
                code: non_empty(&request.secret, "one-time code")?,
            }))
        }
        LoginStrategy::Phone | LoginStrategy::PhoneOtp => {
            let phone = normalize_phone(&request.identifier)
                .ok_or_else(|| GateError::validation("invalid phone number"))?;
            let request_id = match request.strategy {
                LoginStrategy::Phone => Some(non_empty(
                    request.otp_request_id.as_deref().unwrap_or_default(),
                    "otp request id",
                )?),
                _ => None,
            };
            Ok(Credential::Otp(OtpChallenge {
                channel: OtpChannel::Phone,
                recipient: phone,
                request_id,
                code: non_empty(&request.secret, "one-time code")?,
            }))
        }
        LoginStrategy::GoogleAuth => Ok(Credential::OAuth {
            provider: OAuthProvider::Google,
            artifact: non_empty(&request.secret, "google token")?,
        }),
        LoginStrategy::AppleAuth => Ok(Credential::OAuth {
            provider: OAuthProvider::Apple,
            artifact: non_empty(&request.secret, "apple code")?,
        }),
        LoginStrategy::Default => {
            if request.secret.is_empty() {
                return Err(GateError::validation("password is required"));
            }
            Ok(Credential::Passthrough {
                login: non_empty(&request.identifier, "login")?,
                password: request.secret.clone(),
            })
        }
    }
}

/// Run a downstream call under the configured deadline.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    service: &'static str,
    call: impl Future<Output = GateResult<T>>,
) -> GateResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GateError::upstream(service, "deadline exceeded")),
    }
}

/// Verifies a credential with the matching strategy and resolves the
/// canonical identity in the tenant's cluster.
pub struct LoginStrategyDispatcher<U: UserRepository> {
    users: U,
    verifier: CredentialVerifier<U>,
    router: Arc<ServiceNodes>,
    otp: Arc<dyn OtpVerifier>,
    oauth: Arc<dyn OAuthExchange>,
    config: AuthConfig,
}

impl<U: UserRepository + Clone + 'static> LoginStrategyDispatcher<U> {
    pub fn new(
        users: U,
        router: Arc<ServiceNodes>,
        otp: Arc<dyn OtpVerifier>,
        oauth: Arc<dyn OAuthExchange>,
        config: AuthConfig,
    ) -> Self {
        let verifier = CredentialVerifier::new(users.clone(), &config);
        Self {
            users,
            verifier,
            router,
            otp,
            oauth,
            config,
        }
    }

    pub fn verifier(&self) -> &CredentialVerifier<U> {
        &self.verifier
    }

    pub fn router(&self) -> &Arc<ServiceNodes> {
        &self.router
    }

    pub async fn dispatch(&self, request: &LoginRequest) -> GateResult<Resolution> {
        let credential = validate(request, self.config.min_credential_length)?;
        let passthrough = matches!(credential, Credential::Passthrough { .. });

        let (key, contact, local_user) = self.verify(credential).await.inspect_err(|e| {
            warn!(strategy = %request.strategy, error = %e, "Login strategy failed");
        })?;
        debug!(strategy = %request.strategy, "Login strategy verified");

        let identity = self.resolve(request, key).await?;
        if !identity.user_found {
            if passthrough {
                return Err(AuthError::InvalidCredentials.into());
            }
            debug!(strategy = %request.strategy, "Verified contact has no user");
            return Ok(Resolution::Unregistered { contact });
        }

        let user_id = identity
            .user_id
            .or_else(|| local_user.as_ref().map(|u| u.id))
            .ok_or_else(|| GateError::upstream("identity", "user found without an id"))?;

        Ok(Resolution::Found {
            user_id,
            identity,
            local_user,
        })
    }

    async fn verify(
        &self,
        credential: Credential,
    ) -> GateResult<(IdentityKey, VerifiedContact, Option<User>)> {
        match credential {
            Credential::Password { login, password } => {
                let user = match self.users.get_by_login(&login).await {
                    Ok(user) => user,
                    Err(GateError::NotFound { .. }) => {
                        self.verifier.burn_unknown(&password).await?;
                        return Err(AuthError::InvalidCredentials.into());
                    }
                    Err(e) => return Err(e),
                };

                if !self.verifier.verify(&user, &password).await? {
                    return Err(AuthError::InvalidCredentials.into());
                }

                match user.status() {
                    UserStatus::Active => {}
                    UserStatus::NotActivated => return Err(AuthError::AccountNotActivated.into()),
                    UserStatus::Deactivated => return Err(AuthError::AccountDeactivated.into()),
                }

                Ok((
                    IdentityKey::UserId(user.id),
                    VerifiedContact::Login(user.login.clone()),
                    Some(user),
                ))
            }
            Credential::Otp(challenge) => {
                let channel = challenge.channel;
                let recipient = challenge.recipient.clone();
                let confirmed =
                    bounded(self.config.upstream_timeout(), "otp", self.otp.confirm(challenge))
                        .await?;
                if !confirmed {
                    return Err(AuthError::OtpMismatch.into());
                }

                Ok(match channel {
                    OtpChannel::Email => (
                        IdentityKey::Email(recipient.clone()),
                        VerifiedContact::Email(recipient),
                        None,
                    ),
                    OtpChannel::Phone => (
                        IdentityKey::Phone(recipient.clone()),
                        VerifiedContact::Phone(recipient),
                        None,
                    ),
                })
            }
            Credential::OAuth { provider, artifact } => {
                let email = bounded(
                    self.config.upstream_timeout(),
                    "oauth",
                    self.oauth.verified_email(provider, &artifact),
                )
                .await?;
                let email = email.trim().to_lowercase();
                if !is_valid_email(&email) {
                    return Err(GateError::upstream(
                        provider.as_str(),
                        "provider returned no usable email",
                    ));
                }

                Ok((
                    IdentityKey::Email(email.clone()),
                    VerifiedContact::Email(email),
                    None,
                ))
            }
            Credential::Passthrough { login, password } => Ok((
                IdentityKey::Credentials {
                    login: login.clone(),
                    password,
                },
                VerifiedContact::Login(login),
                None,
            )),
        }
    }

    async fn resolve(&self, request: &LoginRequest, key: IdentityKey) -> GateResult<IdentityResult> {
        let tenant = request.tenant();
        let bundle = self
            .router
            .get_by_node_type(&tenant.namespace(), tenant.node_type)?;
        let clients = bundle.resource(tenant.resource_type)?;

        let query = IdentityQuery {
            project_id: request.project_id,
            env_id: request.env_id,
            client_type_id: request.client_type_id,
            key,
        };

        bounded(
            self.config.upstream_timeout(),
            "identity",
            clients.identity.lookup(query),
        )
        .await
        .inspect_err(|e| {
            warn!(
                project_id = ?tenant.project_id,
                node_type = %tenant.node_type,
                resource_type = ?tenant.resource_type,
                error = %e,
                "Identity lookup failed"
            );
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(strategy: LoginStrategy, identifier: &str, secret: &str) -> LoginRequest {
        LoginRequest::new(strategy, identifier, secret)
    }

    #[test]
    fn tags_map_to_strategies() {
        assert_eq!(LoginStrategy::from_tag("LOGIN"), LoginStrategy::Login);
        assert_eq!(LoginStrategy::from_tag("email_otp"), LoginStrategy::EmailOtp);
        assert_eq!(LoginStrategy::from_tag("PHONE"), LoginStrategy::Phone);
        assert_eq!(LoginStrategy::from_tag("GOOGLE_AUTH"), LoginStrategy::GoogleAuth);
        assert_eq!(LoginStrategy::from_tag("APPLE_AUTH"), LoginStrategy::AppleAuth);
        assert_eq!(LoginStrategy::from_tag("whatever"), LoginStrategy::Default);
    }

    #[test]
    fn login_requires_minimum_lengths() {
        assert!(validate(&request(LoginStrategy::Login, "alice1", "secret"), 6).is_ok());
        assert!(matches!(
            validate(&request(LoginStrategy::Login, "alice", "secret1"), 6),
            Err(GateError::Validation { .. })
        ));
        assert!(matches!(
            validate(&request(LoginStrategy::Login, "alice1", "short"), 6),
            Err(GateError::Validation { .. })
        ));
    }

    #[test]
    fn email_strategies() {
        let mut req = request(LoginStrategy::Email, " Alice@Example.com ", "123456");
        assert!(validate(&req, 6).is_err(), "request id is required");

        req.otp_request_id = Some("sms-1".into());
        match validate(&req, 6).unwrap() {
            Credential::Otp(challenge) => {
                assert_eq!(challenge.channel, OtpChannel::Email);
                assert_eq!(challenge.recipient, "alice@example.com");
                assert_eq!(challenge.request_id.as_deref(), Some("sms-1"));
            }
            other => panic!("unexpected credential: {other:?}"),
        }

        let req = request(LoginStrategy::EmailOtp, "alice@example.com", "123456");
        assert!(validate(&req, 6).is_ok());

        let req = request(LoginStrategy::EmailOtp, "not-an-email", "123456");
        assert!(validate(&req, 6).is_err());
    }

    #[test]
    fn phone_strategies() {
        let req = request(LoginStrategy::PhoneOtp, "+998 (90) 123-45-67", "1111");
        match validate(&req, 6).unwrap() {
            Credential::Otp(challenge) => assert_eq!(challenge.recipient, "+998901234567"),
            other => panic!("unexpected credential: {other:?}"),
        }

        assert!(validate(&request(LoginStrategy::PhoneOtp, "12ab", "1111"), 6).is_err());
        assert!(validate(&request(LoginStrategy::PhoneOtp, "+998901234567", " "), 6).is_err());
    }

    #[test]
    fn oauth_needs_artifact() {
        assert!(validate(&request(LoginStrategy::GoogleAuth, "", "id-token"), 6).is_ok());
        assert!(validate(&request(LoginStrategy::AppleAuth, "", ""), 6).is_err());
    }

    #[test]
    fn default_passthrough_needs_both_fields() {
        assert!(validate(&request(LoginStrategy::Default, "bob", "pw"), 6).is_ok());
        assert!(validate(&request(LoginStrategy::Default, "", "pw"), 6).is_err());
        assert!(validate(&request(LoginStrategy::Default, "bob", ""), 6).is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let req = request(LoginStrategy::Login, "alice1", "super-secret");
        assert!(!format!("{req:?}").contains("super-secret"));
        let credential = validate(&req, 6).unwrap();
        assert!(!format!("{credential:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn bounded_reports_deadline() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, GateError>(())
        };
        let err = bounded(Duration::from_millis(10), "identity", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Upstream { .. }));
    }
}
