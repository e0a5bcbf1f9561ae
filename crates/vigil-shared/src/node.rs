//! Nodes and the per-run inventory.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role tag of a cluster node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    ControlPlane,
    Worker,
    Storage,
    Infra,
}

impl NodeRole {
    /// Infer a role from common node naming conventions.
    ///
    /// Matching is case-insensitive on substrings: `master`/`control` for
    /// control-plane, `worker`/`compute` for workers, `storage`/`ocs`/`odf`
    /// for storage and `infra` for infrastructure nodes.
    pub fn infer(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.contains("master") || lower.contains("control") {
            Some(Self::ControlPlane)
        } else if lower.contains("worker") || lower.contains("compute") {
            Some(Self::Worker)
        } else if lower.contains("storage") || lower.contains("ocs") || lower.contains("odf") {
            Some(Self::Storage)
        } else if lower.contains("infra") {
            Some(Self::Infra)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ControlPlane => "control-plane",
            Self::Worker => "worker",
            Self::Storage => "storage",
            Self::Infra => "infra",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub role: Option<NodeRole>,
}

impl Node {
    /// Node with an explicit role (or none)
    pub fn new(name: impl Into<String>, role: Option<NodeRole>) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    /// Node whose role is inferred from its name
    pub fn inferred(name: impl Into<String>) -> Self {
        let name = name.into();
        let role = NodeRole::infer(&name);
        Self { name, role }
    }

    pub fn is_control_plane(&self) -> bool {
        self.role == Some(NodeRole::ControlPlane)
    }

    pub fn is_worker(&self) -> bool {
        self.role == Some(NodeRole::Worker)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The set of nodes discovered for one run. Never mutated after discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub cluster_name: String,
    nodes: Vec<Node>,
}

impl Inventory {
    pub fn new(cluster_name: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            nodes,
        }
    }

    /// Nodes in discovery order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn by_role(&self, role: NodeRole) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.role == Some(role))
    }

    pub fn control_plane(&self) -> Vec<&Node> {
        self.by_role(NodeRole::ControlPlane).collect()
    }

    pub fn workers(&self) -> Vec<&Node> {
        self.by_role(NodeRole::Worker).collect()
    }
}
