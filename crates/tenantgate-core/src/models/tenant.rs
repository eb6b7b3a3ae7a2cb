//! Tenant routing vocabulary.
//!
//! A tenant is served either by the shared multi-tenant cluster (LOW and
//! HIGH tiers) or by a dedicated enterprise cluster registered under the
//! project's own namespace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeType {
    Low,
    High,
    Enterprise,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Low => "LOW",
            NodeType::High => "HIGH",
            NodeType::Enterprise => "ENTERPRISE",
        }
    }

    /// Whether the tier runs on the shared default cluster.
    pub fn is_shared(self) -> bool {
        match self {
            NodeType::Low | NodeType::High => true,
            NodeType::Enterprise => false,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(NodeType::Low),
            "HIGH" => Ok(NodeType::High),
            "ENTERPRISE" => Ok(NodeType::Enterprise),
            other => Err(format!("unknown node type: {other}")),
        }
    }
}

/// Storage engine variant serving a tenant's data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Document store (code 1).
    Document,
    /// Relational store (code 3).
    Relational,
}

impl ResourceType {
    pub fn code(self) -> i32 {
        match self {
            ResourceType::Document => 1,
            ResourceType::Relational => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ResourceType::Document),
            3 => Some(ResourceType::Relational),
            _ => None,
        }
    }
}

/// Tenant context returned alongside a login or refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantContext {
    pub project_id: Option<Uuid>,
    pub env_id: Option<Uuid>,
    pub node_type: NodeType,
    pub resource_type: ResourceType,
}

impl TenantContext {
    /// Registry namespace for this tenant: the project id, or empty when
    /// no project is selected.
    pub fn namespace(&self) -> String {
        self.project_id.map(|id| id.to_string()).unwrap_or_default()
    }
}
