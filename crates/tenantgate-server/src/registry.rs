//! Tenant cluster registration at startup.
//!
//! Every configured namespace gets a bundle for both resource types. Until
//! the gRPC identity and permission clients exist, those bundles answer
//! with an upstream error instead of leaving the namespace unregistered.

use std::sync::Arc;

use async_trait::async_trait;
use tenantgate_auth::{NodeError, ResourceClients, ServiceBundle, ServiceNodes};
use tenantgate_core::clients::{
    IdentityService, OAuthExchange, OAuthProvider, OtpChallenge, OtpVerifier, PermissionService,
};
use tenantgate_core::error::{GateError, GateResult};
use tenantgate_core::models::identity::{IdentityQuery, IdentityResult, Permission};
use tracing::info;
use uuid::Uuid;

use crate::config::ServerConfig;

/// Downstream stand-in that reports itself as not configured.
pub struct Unconfigured;

#[async_trait]
impl IdentityService for Unconfigured {
    async fn lookup(&self, _query: IdentityQuery) -> GateResult<IdentityResult> {
        Err(GateError::upstream("identity", "no identity client configured"))
    }
}

#[async_trait]
impl PermissionService for Unconfigured {
    async fn role_permissions(
        &self,
        _project_id: Option<Uuid>,
        _role_id: Uuid,
    ) -> GateResult<Vec<Permission>> {
        Err(GateError::upstream("permissions", "no permission client configured"))
    }
}

#[async_trait]
impl OtpVerifier for Unconfigured {
    async fn confirm(&self, _challenge: OtpChallenge) -> GateResult<bool> {
        Err(GateError::upstream("otp", "no OTP transport configured"))
    }
}

#[async_trait]
impl OAuthExchange for Unconfigured {
    async fn verified_email(&self, provider: OAuthProvider, _artifact: &str) -> GateResult<String> {
        Err(GateError::upstream(provider.as_str(), "no OAuth exchange configured"))
    }
}

// TODO: build real bundles from the cluster's gRPC endpoints once those
// clients live in this workspace.
fn bundle_for(_namespace: &str) -> ServiceBundle {
    let clients = ResourceClients {
        identity: Arc::new(Unconfigured),
        permissions: Arc::new(Unconfigured),
    };
    ServiceBundle::new()
        .with_document(clients.clone())
        .with_relational(clients)
}

/// Registry with the shared cluster plus every configured enterprise
/// namespace.
pub fn build_registry(config: &ServerConfig) -> Result<Arc<ServiceNodes>, NodeError> {
    let nodes = ServiceNodes::new(config.shared_namespace.clone());
    nodes.add(Arc::new(bundle_for(&config.shared_namespace)), &config.shared_namespace)?;

    for namespace in &config.enterprise_namespaces {
        nodes.add(Arc::new(bundle_for(namespace)), namespace)?;
    }

    info!(nodes = nodes.len(), shared = %config.shared_namespace, "Tenant registry built");
    Ok(Arc::new(nodes))
}

#[cfg(test)]
mod tests {
    use tenantgate_core::models::identity::IdentityKey;
    use tenantgate_core::models::tenant::{NodeType, ResourceType};

    use super::*;

    fn config(enterprise: &[&str]) -> ServerConfig {
        ServerConfig {
            db: Default::default(),
            auth: Default::default(),
            shared_namespace: "shared".into(),
            enterprise_namespaces: enterprise.iter().map(|s| s.to_string()).collect(),
            log_filter: "info".into(),
        }
    }

    #[test]
    fn shared_cluster_is_registered() {
        let nodes = build_registry(&config(&[])).unwrap();
        assert_eq!(nodes.namespaces(), vec!["shared".to_string()]);

        let bundle = nodes.get_by_node_type("any-project", NodeType::Low).unwrap();
        assert!(bundle.resource(ResourceType::Document).is_ok());
        assert!(bundle.resource(ResourceType::Relational).is_ok());
    }

    #[test]
    fn enterprise_namespaces_are_registered() {
        let nodes = build_registry(&config(&["acme", "globex"])).unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(nodes.get_by_node_type("acme", NodeType::Enterprise).is_ok());
        assert!(matches!(
            nodes.get_by_node_type("initech", NodeType::Enterprise),
            Err(NodeError::NodeNotExists(_))
        ));
    }

    #[test]
    fn namespace_clash_fails() {
        assert!(matches!(
            build_registry(&config(&["shared"])),
            Err(NodeError::NodeExists(_))
        ));
    }

    #[tokio::test]
    async fn placeholder_clients_report_upstream_errors() {
        let nodes = build_registry(&config(&[])).unwrap();
        let bundle = nodes.shared().unwrap();
        let clients = bundle.resource(ResourceType::Document).unwrap();

        let err = clients
            .identity
            .lookup(IdentityQuery {
                project_id: None,
                env_id: None,
                client_type_id: None,
                key: IdentityKey::Email("a@example.com".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Upstream { .. }));
    }
}
