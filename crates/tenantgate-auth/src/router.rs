//! Tenant routing: namespace → downstream service bundle.
//!
//! Shared-tier tenants (LOW and HIGH) are all served by the single bundle
//! registered under the shared namespace; enterprise tenants get their own
//! bundle keyed by project id. Entries are added at startup or on
//! reconfiguration, so one coarse lock over the map is enough.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tenantgate_core::clients::{IdentityService, PermissionService};
use tenantgate_core::error::GateError;
use tenantgate_core::models::tenant::{NodeType, ResourceType};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("service node already exists: {0}")]
    NodeExists(String),

    #[error("service node does not exist: {0}")]
    NodeNotExists(String),

    /// The bundle carries no downstream clients at all.
    #[error("service bundle has no clients")]
    NilService,

    /// The namespace key is empty.
    #[error("service node namespace is empty")]
    NilPool,

    #[error("no {0:?} clients configured for this node")]
    ResourceUnavailable(ResourceType),
}

impl From<NodeError> for GateError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::NodeNotExists(namespace) => GateError::NotFound {
                entity: "service node".into(),
                id: namespace,
            },
            NodeError::NodeExists(namespace) => GateError::AlreadyExists {
                entity: format!("service node {namespace}"),
            },
            NodeError::NilService | NodeError::NilPool => GateError::Validation {
                message: err.to_string(),
            },
            NodeError::ResourceUnavailable(_) => GateError::Internal(err.to_string()),
        }
    }
}

/// Downstream clients for one storage engine variant.
#[derive(Clone)]
pub struct ResourceClients {
    pub identity: Arc<dyn IdentityService>,
    pub permissions: Arc<dyn PermissionService>,
}

/// Everything a tenant's cluster exposes, per [`ResourceType`].
#[derive(Clone, Default)]
pub struct ServiceBundle {
    document: Option<ResourceClients>,
    relational: Option<ResourceClients>,
}

impl ServiceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, clients: ResourceClients) -> Self {
        self.document = Some(clients);
        self
    }

    pub fn with_relational(mut self, clients: ResourceClients) -> Self {
        self.relational = Some(clients);
        self
    }

    pub fn resource(&self, resource_type: ResourceType) -> Result<&ResourceClients, NodeError> {
        let clients = match resource_type {
            ResourceType::Document => self.document.as_ref(),
            ResourceType::Relational => self.relational.as_ref(),
        };
        clients.ok_or(NodeError::ResourceUnavailable(resource_type))
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_none() && self.relational.is_none()
    }
}

impl fmt::Debug for ServiceBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBundle")
            .field("document", &self.document.is_some())
            .field("relational", &self.relational.is_some())
            .finish()
    }
}

/// Registry of service bundles keyed by namespace.
pub struct ServiceNodes {
    shared_namespace: String,
    nodes: Mutex<HashMap<String, Arc<ServiceBundle>>>,
}

impl ServiceNodes {
    /// `shared_namespace` is the key the shared default bundle is, or
    /// will be, registered under.
    pub fn new(shared_namespace: impl Into<String>) -> Self {
        Self {
            shared_namespace: shared_namespace.into(),
            nodes: Mutex::new(HashMap::new()),
        }
    }

    pub fn shared_namespace(&self) -> &str {
        &self.shared_namespace
    }

    pub fn add(&self, bundle: Arc<ServiceBundle>, namespace: &str) -> Result<(), NodeError> {
        if namespace.trim().is_empty() {
            return Err(NodeError::NilPool);
        }
        if bundle.is_empty() {
            return Err(NodeError::NilService);
        }

        let mut nodes = self.nodes.lock();
        if nodes.contains_key(namespace) {
            return Err(NodeError::NodeExists(namespace.to_string()));
        }
        nodes.insert(namespace.to_string(), bundle);
        info!(namespace, total = nodes.len(), "Registered service node");
        Ok(())
    }

    pub fn get(&self, namespace: &str) -> Result<Arc<ServiceBundle>, NodeError> {
        self.nodes
            .lock()
            .get(namespace)
            .cloned()
            .ok_or_else(|| NodeError::NodeNotExists(namespace.to_string()))
    }

    pub fn remove(&self, namespace: &str) -> Result<Arc<ServiceBundle>, NodeError> {
        let removed = self
            .nodes
            .lock()
            .remove(namespace)
            .ok_or_else(|| NodeError::NodeNotExists(namespace.to_string()))?;
        info!(namespace, "Removed service node");
        Ok(removed)
    }

    /// The shared default bundle.
    pub fn shared(&self) -> Result<Arc<ServiceBundle>, NodeError> {
        self.get(&self.shared_namespace)
    }

    /// Resolve the bundle serving `namespace` at tier `node_type`.
    ///
    /// Shared tiers ignore `namespace` and always resolve to the shared
    /// bundle. Enterprise resolves only a bundle registered under the
    /// literal namespace.
    pub fn get_by_node_type(
        &self,
        namespace: &str,
        node_type: NodeType,
    ) -> Result<Arc<ServiceBundle>, NodeError> {
        match node_type {
            NodeType::Low | NodeType::High => self.shared(),
            NodeType::Enterprise => self.get(namespace),
        }
    }

    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self.nodes.lock().keys().cloned().collect();
        namespaces.sort();
        namespaces
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tenantgate_core::error::GateResult;
    use tenantgate_core::models::identity::{IdentityQuery, IdentityResult, Permission};
    use uuid::Uuid;

    struct Nobody;

    #[async_trait]
    impl IdentityService for Nobody {
        async fn lookup(&self, _query: IdentityQuery) -> GateResult<IdentityResult> {
            Ok(IdentityResult::not_found())
        }
    }

    #[async_trait]
    impl PermissionService for Nobody {
        async fn role_permissions(
            &self,
            _project_id: Option<Uuid>,
            _role_id: Uuid,
        ) -> GateResult<Vec<Permission>> {
            Ok(vec![])
        }
    }

    fn clients() -> ResourceClients {
        ResourceClients {
            identity: Arc::new(Nobody),
            permissions: Arc::new(Nobody),
        }
    }

    fn bundle() -> Arc<ServiceBundle> {
        Arc::new(ServiceBundle::new().with_document(clients()))
    }

    #[test]
    fn add_twice_fails_node_exists() {
        let nodes = ServiceNodes::new("shared");
        nodes.add(bundle(), "tenant-1").unwrap();
        assert_eq!(
            nodes.add(bundle(), "tenant-1"),
            Err(NodeError::NodeExists("tenant-1".into()))
        );
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn get_unknown_fails_node_not_exists() {
        let nodes = ServiceNodes::new("shared");
        assert_eq!(
            nodes.get("unknown").unwrap_err(),
            NodeError::NodeNotExists("unknown".into())
        );
    }

    #[test]
    fn invalid_input_rejected() {
        let nodes = ServiceNodes::new("shared");
        assert_eq!(nodes.add(bundle(), "  "), Err(NodeError::NilPool));
        assert_eq!(
            nodes.add(Arc::new(ServiceBundle::new()), "tenant-1"),
            Err(NodeError::NilService)
        );
        assert!(nodes.is_empty());
    }

    #[test]
    fn remove_then_get_fails() {
        let nodes = ServiceNodes::new("shared");
        nodes.add(bundle(), "tenant-1").unwrap();
        nodes.remove("tenant-1").unwrap();
        assert!(nodes.get("tenant-1").is_err());
        assert_eq!(
            nodes.remove("tenant-1").unwrap_err(),
            NodeError::NodeNotExists("tenant-1".into())
        );
    }

    #[test]
    fn shared_tiers_always_resolve_to_shared_bundle() {
        let nodes = ServiceNodes::new("shared");
        let shared = bundle();
        let dedicated = bundle();
        nodes.add(shared.clone(), "shared").unwrap();
        nodes.add(dedicated.clone(), "tenant-1").unwrap();

        for namespace in ["tenant-1", "tenant-2", "", "shared"] {
            for tier in [NodeType::Low, NodeType::High] {
                let resolved = nodes.get_by_node_type(namespace, tier).unwrap();
                assert!(Arc::ptr_eq(&resolved, &shared), "{namespace} {tier}");
            }
        }
    }

    #[test]
    fn enterprise_resolves_literal_namespace_only() {
        let nodes = ServiceNodes::new("shared");
        let dedicated = bundle();
        nodes.add(bundle(), "shared").unwrap();
        nodes.add(dedicated.clone(), "tenant-1").unwrap();

        let resolved = nodes
            .get_by_node_type("tenant-1", NodeType::Enterprise)
            .unwrap();
        assert!(Arc::ptr_eq(&resolved, &dedicated));

        assert_eq!(
            nodes
                .get_by_node_type("tenant-2", NodeType::Enterprise)
                .unwrap_err(),
            NodeError::NodeNotExists("tenant-2".into())
        );
    }

    #[test]
    fn missing_shared_bundle_reported() {
        let nodes = ServiceNodes::new("shared");
        assert_eq!(
            nodes.get_by_node_type("tenant-1", NodeType::Low).unwrap_err(),
            NodeError::NodeNotExists("shared".into())
        );
    }

    #[test]
    fn bundle_resource_variants() {
        let bundle = ServiceBundle::new().with_relational(clients());
        assert!(bundle.resource(ResourceType::Relational).is_ok());
        assert!(matches!(
            bundle.resource(ResourceType::Document),
            Err(NodeError::ResourceUnavailable(ResourceType::Document))
        ));
    }

    #[test]
    fn namespaces_are_sorted() {
        let nodes = ServiceNodes::new("shared");
        nodes.add(bundle(), "b").unwrap();
        nodes.add(bundle(), "a").unwrap();
        assert_eq!(nodes.namespaces(), vec!["a".to_string(), "b".to_string()]);
    }
}
