//! Node-to-node connectivity matrix.
//!
//! Every edge is one `ping` issued from the source node's debug shell. The
//! number of edges grows with the square of the node count in all-pairs
//! mode, so large inventories get a warning and role-partitioned mode exists
//! to test only control plane to worker paths.

use crate::config::ConnectivityConfig;
use crate::registry::{Probe, ProbeContext};
use async_trait::async_trait;
use comfy_table::{presets::ASCII_FULL, ContentArrangement, Table};
use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use vigil_shared::{
    Classifier, ConnectivityEdge, Inventory, Node, ProbeResult, Result, Status, VigilError,
};

/// Which ordered node pairs are tested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectivityMode {
    /// Every ordered pair of distinct nodes
    #[default]
    AllPairs,
    /// Control plane to worker only
    RolePartitioned,
}

impl ConnectivityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllPairs => "all-pairs",
            Self::RolePartitioned => "role-partitioned",
        }
    }
}

impl fmt::Display for ConnectivityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectivityMode {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all-pairs" => Ok(Self::AllPairs),
            "role-partitioned" => Ok(Self::RolePartitioned),
            other => Err(VigilError::Config(format!(
                "unknown connectivity mode '{}' (expected all-pairs or role-partitioned)",
                other
            ))),
        }
    }
}

/// Ordered `(from, to)` pairs to test, source-major in inventory order
pub fn pairs(inventory: &Inventory, mode: ConnectivityMode) -> Vec<(Node, Node)> {
    match mode {
        ConnectivityMode::AllPairs => {
            let nodes = inventory.nodes();
            nodes
                .iter()
                .flat_map(|from| {
                    nodes
                        .iter()
                        .filter(move |to| to.name != from.name)
                        .map(move |to| (from.clone(), to.clone()))
                })
                .collect()
        }
        ConnectivityMode::RolePartitioned => {
            let workers = inventory.workers();
            inventory
                .control_plane()
                .into_iter()
                .flat_map(|from| {
                    workers
                        .iter()
                        .filter(move |to| to.name != from.name)
                        .map(move |to| (from.clone(), (*to).clone()))
                })
                .collect()
        }
    }
}

/// Number of edges `pairs` would produce
pub fn expected_edges(inventory: &Inventory, mode: ConnectivityMode) -> usize {
    pairs(inventory, mode).len()
}

fn ping_command(to: &Node) -> String {
    format!("ping -c 1 -W 2 {}", to.name)
}

// ============================================================================
// Builder
// ============================================================================

pub struct ConnectivityMatrixBuilder {
    mode: ConnectivityMode,
    timeout: Duration,
    parallelism: usize,
    warn_above_edges: usize,
}

impl ConnectivityMatrixBuilder {
    pub fn new(mode: ConnectivityMode) -> Self {
        Self::from_config(&ConnectivityConfig {
            mode,
            ..ConnectivityConfig::default()
        })
    }

    pub fn from_config(config: &ConnectivityConfig) -> Self {
        Self {
            mode: config.mode,
            timeout: Duration::from_secs(config.timeout_secs),
            parallelism: config.parallelism.max(1),
            warn_above_edges: config.warn_above_edges,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn mode(&self) -> ConnectivityMode {
        self.mode
    }

    /// Test every edge. Only a runner failure is an `Err`.
    pub async fn build(&self, ctx: &ProbeContext) -> Result<ConnectivityMatrix> {
        let pairs = pairs(&ctx.inventory, self.mode);
        if pairs.len() > self.warn_above_edges {
            warn!(
                "Connectivity matrix has {} edges ({} nodes, {}); this will take a while",
                pairs.len(),
                ctx.inventory.len(),
                self.mode
            );
        } else {
            info!("Testing {} connectivity edge(s), {}", pairs.len(), self.mode);
        }

        let total = pairs.len();
        let cancel = ctx.cancel.clone();
        // Cancellation stops new edges; edges in flight finish
        let edges: Vec<ConnectivityEdge> = stream::iter(pairs)
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(|(from, to)| self.test_edge(ctx, from, to))
            .buffered(self.parallelism)
            .try_collect()
            .await?;
        if edges.len() < total {
            warn!("Connectivity cancelled after {} of {} edges", edges.len(), total);
        }

        Ok(ConnectivityMatrix {
            nodes: ctx.inventory.nodes().to_vec(),
            edges,
            planned: total,
        })
    }

    async fn test_edge(
        &self,
        ctx: &ProbeContext,
        from: Node,
        to: Node,
    ) -> Result<ConnectivityEdge> {
        let outcome = ctx
            .run_on_node_with_timeout(&from, &ping_command(&to), self.timeout)
            .await?;
        let verdict = Classifier::PacketsReceived.classify(&outcome);
        debug!("{} -> {}: {}", from.name, to.name, verdict.body);

        Ok(ConnectivityEdge {
            reachable: verdict.status == Status::Ok,
            timed_out: outcome.timed_out(),
            raw_output: outcome.combined_output(),
            from,
            to,
        })
    }
}

// ============================================================================
// Matrix
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityMatrix {
    nodes: Vec<Node>,
    edges: Vec<ConnectivityEdge>,
    planned: usize,
}

impl ConnectivityMatrix {
    pub fn edges(&self) -> &[ConnectivityEdge] {
        &self.edges
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&ConnectivityEdge> {
        self.edges
            .iter()
            .find(|e| e.from.name == from && e.to.name == to)
    }

    /// Edges the mode called for, tested or not
    pub fn planned(&self) -> usize {
        self.planned
    }

    /// Edges skipped because the run was cancelled
    pub fn untested(&self) -> usize {
        self.planned.saturating_sub(self.edges.len())
    }

    pub fn is_complete(&self) -> bool {
        self.untested() == 0
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &ConnectivityEdge> {
        self.edges.iter().filter(|e| !e.reachable)
    }

    /// One row per edge, in test order
    pub fn results(&self) -> Vec<ProbeResult> {
        self.edges.iter().map(ConnectivityEdge::to_result).collect()
    }

    /// Source by destination grid; `-` marks self and untested pairs
    pub fn grid(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(ASCII_FULL)
            .set_content_arrangement(ContentArrangement::Disabled);

        let mut header = vec!["from \\ to".to_string()];
        header.extend(self.nodes.iter().map(|n| n.name.clone()));
        table.set_header(header);

        for from in &self.nodes {
            let mut row = vec![from.name.clone()];
            for to in &self.nodes {
                let cell = match self.edge(&from.name, &to.name) {
                    Some(e) if e.reachable => "ok",
                    Some(_) => "FAIL",
                    None => "-",
                };
                row.push(cell.to_string());
            }
            table.add_row(row);
        }
        table
    }
}

// ============================================================================
// Probe
// ============================================================================

pub struct ConnectivityProbe {
    builder: ConnectivityMatrixBuilder,
}

impl ConnectivityProbe {
    pub fn new(builder: ConnectivityMatrixBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Probe for ConnectivityProbe {
    fn title(&self) -> &str {
        "Node connectivity"
    }

    fn headers(&self) -> [&str; 2] {
        ["Nodes", "Result"]
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>> {
        let matrix = self.builder.build(ctx).await?;
        if matrix.edges().is_empty() && ctx.cancel.is_cancelled() {
            return Ok(vec![ProbeResult::warning("-", "not run: run cancelled")]);
        }
        if matrix.edges().is_empty() {
            return Ok(vec![ProbeResult::warning(
                "-",
                format!("no node pairs to test in {} mode", self.builder.mode()),
            )]);
        }
        let mut results = matrix.results();
        if !matrix.is_complete() {
            results.push(ProbeResult::warning(
                "-",
                format!(
                    "{} of {} edges not tested: run cancelled",
                    matrix.untested(),
                    matrix.planned()
                ),
            ));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_shared::NodeRole;

    fn inventory() -> Inventory {
        Inventory::new(
            "lab",
            vec![
                Node::new("m1", Some(NodeRole::ControlPlane)),
                Node::new("m2", Some(NodeRole::ControlPlane)),
                Node::new("w1", Some(NodeRole::Worker)),
                Node::new("w2", Some(NodeRole::Worker)),
                Node::new("w3", Some(NodeRole::Worker)),
            ],
        )
    }

    #[test]
    fn test_all_pairs_excludes_self() {
        let pairs = pairs(&inventory(), ConnectivityMode::AllPairs);
        assert_eq!(pairs.len(), 5 * 4);
        assert!(pairs.iter().all(|(a, b)| a.name != b.name));
        assert_eq!(pairs[0].0.name, "m1");
        assert_eq!(pairs[0].1.name, "m2");
        assert_eq!(pairs[4].0.name, "m2");
    }

    #[test]
    fn test_role_partitioned_pairs() {
        let pairs = pairs(&inventory(), ConnectivityMode::RolePartitioned);
        assert_eq!(pairs.len(), 2 * 3);
        assert!(pairs.iter().all(|(a, b)| a.is_control_plane() && b.is_worker()));
    }

    #[test]
    fn test_single_node_has_no_edges() {
        let inv = Inventory::new("lab", vec![Node::inferred("m1")]);
        assert_eq!(expected_edges(&inv, ConnectivityMode::AllPairs), 0);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("all-pairs".parse::<ConnectivityMode>().unwrap(), ConnectivityMode::AllPairs);
        assert_eq!(
            "role-partitioned".parse::<ConnectivityMode>().unwrap(),
            ConnectivityMode::RolePartitioned
        );
        assert!("mesh".parse::<ConnectivityMode>().is_err());
        assert_eq!(ConnectivityMode::RolePartitioned.to_string(), "role-partitioned");
    }
}
