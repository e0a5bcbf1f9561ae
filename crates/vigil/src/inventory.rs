//! Inventory sources - where the cluster name and node list come from.

use crate::config::InventoryConfig;
use crate::runner::CommandRunner;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use vigil_shared::{Command, Inventory, Node, NodeRole, Result, VigilError};

/// Cluster name used when discovery prints nothing
pub const UNKNOWN_CLUSTER: &str = "unknown-cluster";

#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Discover the inventory. Any failure is fatal for the run.
    async fn discover(&self, runner: &dyn CommandRunner) -> Result<Inventory>;
}

/// Discovers nodes by running the configured commands
pub struct CommandInventory {
    cluster_name_command: String,
    nodes_command: String,
    roles: HashMap<String, NodeRole>,
}

impl CommandInventory {
    pub fn new(cluster_name_command: impl Into<String>, nodes_command: impl Into<String>) -> Self {
        Self {
            cluster_name_command: cluster_name_command.into(),
            nodes_command: nodes_command.into(),
            roles: HashMap::new(),
        }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        Self::new(&config.cluster_name_command, &config.nodes_command)
            .with_roles(config.roles.clone())
    }

    /// Explicit roles take precedence over name based inference
    pub fn with_roles(mut self, roles: HashMap<String, NodeRole>) -> Self {
        self.roles = roles;
        self
    }

    async fn query(&self, runner: &dyn CommandRunner, text: &str) -> Result<String> {
        let outcome = runner.run(&Command::new(text)).await?;
        if !outcome.success() {
            return Err(VigilError::Infrastructure(format!(
                "inventory command '{}' failed: {}",
                text,
                outcome.combined_output()
            )));
        }
        Ok(outcome.stdout().to_string())
    }
}

#[async_trait]
impl InventorySource for CommandInventory {
    async fn discover(&self, runner: &dyn CommandRunner) -> Result<Inventory> {
        let raw_name = self.query(runner, &self.cluster_name_command).await?;
        let mut cluster_name = strip_quotes(raw_name.trim()).to_string();
        if cluster_name.is_empty() {
            warn!("Cluster name command printed nothing, using {}", UNKNOWN_CLUSTER);
            cluster_name = UNKNOWN_CLUSTER.to_string();
        }

        let raw_nodes = self.query(runner, &self.nodes_command).await?;
        let names = parse_node_names(&raw_nodes);
        if names.is_empty() {
            return Err(VigilError::Infrastructure(
                "node discovery returned no nodes".to_string(),
            ));
        }

        let nodes = names
            .into_iter()
            .map(|name| {
                let role = self.roles.get(&name).copied().or_else(|| NodeRole::infer(&name));
                Node::new(name, role)
            })
            .collect::<Vec<_>>();

        info!("Discovered {} node(s) in {}", nodes.len(), cluster_name);
        Ok(Inventory::new(cluster_name, nodes))
    }
}

/// Fixed inventory; runs nothing
pub struct StaticInventory {
    inventory: Inventory,
}

impl StaticInventory {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        let mut seen = HashSet::new();
        let nodes = config
            .nodes
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty() && seen.insert(name.to_string()))
            .map(|name| {
                let role = config.roles.get(name).copied().or_else(|| NodeRole::infer(name));
                Node::new(name, role)
            })
            .collect();
        let cluster_name = config
            .cluster_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_CLUSTER.to_string());
        Self::new(Inventory::new(cluster_name, nodes))
    }
}

#[async_trait]
impl InventorySource for StaticInventory {
    async fn discover(&self, _runner: &dyn CommandRunner) -> Result<Inventory> {
        if self.inventory.is_empty() {
            return Err(VigilError::Infrastructure(
                "static inventory has no nodes".to_string(),
            ));
        }
        Ok(self.inventory.clone())
    }
}

/// Source chosen by the config: a fixed node list wins over discovery
pub fn from_config(config: &InventoryConfig) -> Box<dyn InventorySource> {
    if config.nodes.is_empty() {
        Box::new(CommandInventory::from_config(config))
    } else {
        Box::new(StaticInventory::from_config(config))
    }
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '\'' || c == '"')
}

/// Whitespace separated names, quotes stripped, duplicates dropped
fn parse_node_names(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split_whitespace()
        .map(strip_quotes)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{expected_edges, ConnectivityMode};
    use crate::fake_runner::{FakeResponse, FakeRunner};

    fn source() -> CommandInventory {
        CommandInventory::new("get-name", "get-nodes")
    }

    #[test]
    fn test_parse_node_names() {
        assert_eq!(
            parse_node_names("'master-0 worker-0\nworker-0  infra-1'"),
            vec!["master-0", "worker-0", "infra-1"]
        );
        assert!(parse_node_names("  \n").is_empty());
    }

    #[tokio::test]
    async fn test_discover_infers_and_overrides_roles() {
        let runner = FakeRunner::new()
            .on("get-name", FakeResponse::ok("'ocp-lab'\n"))
            .on("get-nodes", FakeResponse::ok("master-0 worker-0 node-x"));
        let mut roles = HashMap::new();
        roles.insert("node-x".to_string(), NodeRole::Storage);

        let inv = source().with_roles(roles).discover(&runner).await.unwrap();
        assert_eq!(inv.cluster_name, "ocp-lab");
        assert_eq!(inv.len(), 3);
        assert_eq!(inv.nodes()[0].role, Some(NodeRole::ControlPlane));
        assert_eq!(inv.nodes()[1].role, Some(NodeRole::Worker));
        assert_eq!(inv.nodes()[2].role, Some(NodeRole::Storage));
    }

    #[tokio::test]
    async fn test_failed_discovery_is_infrastructure() {
        let runner = FakeRunner::new()
            .on("get-name", FakeResponse::ok("lab"))
            .on("get-nodes", FakeResponse::fail(1, "Unauthorized"));
        let err = source().discover(&runner).await.unwrap_err();
        assert!(err.is_infrastructure());
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[tokio::test]
    async fn test_empty_node_list_is_infrastructure() {
        let runner = FakeRunner::new()
            .on("get-name", FakeResponse::ok("lab"))
            .on("get-nodes", FakeResponse::ok(""));
        assert!(source().discover(&runner).await.unwrap_err().is_infrastructure());
    }

    #[tokio::test]
    async fn test_empty_cluster_name_falls_back() {
        let runner = FakeRunner::new()
            .on("get-name", FakeResponse::ok(""))
            .on("get-nodes", FakeResponse::ok("w1"));
        let inv = source().discover(&runner).await.unwrap();
        assert_eq!(inv.cluster_name, UNKNOWN_CLUSTER);
    }

    #[tokio::test]
    async fn test_static_inventory_from_config() {
        let config = InventoryConfig {
            nodes: vec!["master-1".into(), "worker-1".into()],
            cluster_name: Some("lab".into()),
            ..InventoryConfig::default()
        };
        let runner = FakeRunner::new();
        let inv = from_config(&config).discover(&runner).await.unwrap();
        assert_eq!(inv.cluster_name, "lab");
        assert_eq!(inv.control_plane().len(), 1);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_static_inventory_drops_duplicate_names() {
        let config = InventoryConfig {
            nodes: vec![
                "master-1".into(),
                "worker-1".into(),
                "master-1".into(),
                " worker-1 ".into(),
                "worker-2".into(),
            ],
            ..InventoryConfig::default()
        };
        let inv = from_config(&config).discover(&FakeRunner::new()).await.unwrap();
        let names: Vec<_> = inv.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["master-1", "worker-1", "worker-2"]);
        assert_eq!(expected_edges(&inv, ConnectivityMode::AllPairs), 3 * 2);
    }
}
