//! Ephemeral resources created as a side effect of probing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of object a tracked identifier refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceKind {
    Namespace,
    Pod { namespace: String },
    /// Deletion command template; `{id}` is replaced by the identifier
    Custom { delete_command: String },
}

/// An ephemeral object that must be deleted at the end of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EphemeralResource {
    pub id: String,
    pub kind: ResourceKind,
}

impl EphemeralResource {
    pub fn namespace(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ResourceKind::Namespace,
        }
    }

    pub fn pod(id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ResourceKind::Pod {
                namespace: namespace.into(),
            },
        }
    }

    pub fn custom(id: impl Into<String>, delete_command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ResourceKind::Custom {
                delete_command: delete_command.into(),
            },
        }
    }

    /// Command that releases this resource
    pub fn deletion_command(&self) -> String {
        match &self.kind {
            ResourceKind::Namespace => {
                format!("oc delete namespace {} --ignore-not-found --wait=false", self.id)
            }
            ResourceKind::Pod { namespace } => format!(
                "oc delete pod {} -n {} --ignore-not-found --wait=false",
                self.id, namespace
            ),
            ResourceKind::Custom { delete_command } => delete_command.replace("{id}", &self.id),
        }
    }
}

impl fmt::Display for EphemeralResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ResourceKind::Namespace => write!(f, "namespace/{}", self.id),
            ResourceKind::Pod { namespace } => write!(f, "pod/{} ({})", self.id, namespace),
            ResourceKind::Custom { .. } => write!(f, "{}", self.id),
        }
    }
}
