//! Cluster-wide facts and local disk usage.

use crate::registry::{Probe, ProbeContext};
use async_trait::async_trait;
use vigil_shared::{Classifier, NodeRole, ProbeResult, Status};

const VERSION_COMMAND: &str = "oc version | grep 'Server Version' | awk '{print $3}'";
const PLATFORM_COMMAND: &str =
    "oc get infrastructure cluster -o jsonpath='{.status.platformStatus.type}'";

/// Cluster name, server version, platform and node counts
pub struct ClusterInfoProbe;

#[async_trait]
impl Probe for ClusterInfoProbe {
    fn title(&self) -> &str {
        "Cluster"
    }

    fn headers(&self) -> [&str; 2] {
        ["Property", "Value"]
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>> {
        let inventory = &ctx.inventory;
        let mut rows = vec![ProbeResult::ok("Name", &inventory.cluster_name)];

        let version = ctx.run(&ctx.command(VERSION_COMMAND)).await?;
        rows.push(ProbeResult::from_outcome(
            "Server version",
            &version,
            &Classifier::ExitStatus,
        ));

        let platform = ctx.run(&ctx.command(PLATFORM_COMMAND)).await?;
        rows.push(ProbeResult::from_outcome(
            "Platform",
            &platform,
            &Classifier::WarnOnEmpty,
        ));

        let unassigned = inventory.nodes().iter().filter(|n| n.role.is_none()).count();
        let counts = format!(
            "{} total, {} control-plane, {} worker, {} storage, {} infra, {} unassigned",
            inventory.len(),
            inventory.by_role(NodeRole::ControlPlane).count(),
            inventory.by_role(NodeRole::Worker).count(),
            inventory.by_role(NodeRole::Storage).count(),
            inventory.by_role(NodeRole::Infra).count(),
            unassigned,
        );
        let status = if inventory.control_plane().is_empty() {
            Status::Warning
        } else {
            Status::Ok
        };
        rows.push(ProbeResult::new("Nodes", status, counts));

        Ok(rows)
    }
}

/// `df -hT` on the host running vigil
pub struct DiskUsageProbe;

#[async_trait]
impl Probe for DiskUsageProbe {
    fn title(&self) -> &str {
        "Storage"
    }

    fn headers(&self) -> [&str; 2] {
        ["Component", "State"]
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>> {
        let outcome = ctx.run(&ctx.command("df -hT")).await?;
        Ok(vec![ProbeResult::from_outcome(
            "Disk usage",
            &outcome,
            &Classifier::ExitStatus,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_runner::{FakeResponse, FakeRunner};
    use std::sync::Arc;
    use vigil_shared::{Inventory, Node};

    fn ctx(runner: FakeRunner) -> ProbeContext {
        ProbeContext::new(
            Arc::new(runner),
            Inventory::new(
                "ocp-lab",
                vec![
                    Node::inferred("master-0"),
                    Node::inferred("worker-0"),
                    Node::inferred("edge-7"),
                ],
            ),
        )
    }

    #[tokio::test]
    async fn test_cluster_info_rows() {
        let runner = FakeRunner::new()
            .on("Server Version", FakeResponse::ok("4.14.12\n"))
            .on("platformStatus", FakeResponse::ok("VSphere"));
        let rows = ClusterInfoProbe.run(&ctx(runner)).await.unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].body, "ocp-lab");
        assert_eq!(rows[1].body, "4.14.12");
        assert_eq!(rows[2].body, "VSphere");
        assert!(rows[3].body.starts_with("3 total, 1 control-plane, 1 worker"));
        assert!(rows[3].body.ends_with("1 unassigned"));
    }

    #[tokio::test]
    async fn test_disk_usage_failure_is_error_row() {
        let runner = FakeRunner::new().on("df -hT", FakeResponse::fail(1, "df: permission denied"));
        let rows = DiskUsageProbe.run(&ctx(runner)).await.unwrap();
        assert_eq!(rows[0].status, Status::Error);
        assert!(rows[0].body.contains("permission denied"));
    }
}
