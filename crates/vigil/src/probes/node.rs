//! Per-node probes. Each emits one row per node, in inventory order.

use super::on_every_node;
use crate::registry::{Probe, ProbeContext};
use async_trait::async_trait;
use vigil_shared::{Classifier, CommandOutcome, ProbeResult, Status, Verdict};

/// Clock synchronization via `timedatectl`
pub struct NtpProbe;

fn classify_ntp(outcome: &CommandOutcome) -> Verdict {
    if !outcome.success() {
        return Classifier::ExitStatus.classify(outcome);
    }
    let synced = outcome
        .stdout()
        .lines()
        .find_map(|line| line.trim().strip_prefix("System clock synchronized:"))
        .map(str::trim);
    match synced {
        Some("yes") => Verdict::new(Status::Ok, "synchronized"),
        Some("no") => Verdict::new(Status::Warning, "clock not synchronized"),
        _ => Verdict::new(Status::Error, format!("unexpected output: {}", outcome.stdout().trim())),
    }
}

#[async_trait]
impl Probe for NtpProbe {
    fn title(&self) -> &str {
        "NTP"
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>> {
        let classifier = Classifier::Custom(classify_ntp);
        Ok(on_every_node(ctx, |_| "timedatectl".to_string())
            .await?
            .iter()
            .map(|(node, outcome)| ProbeResult::from_outcome(&node.name, outcome, &classifier))
            .collect())
    }
}

/// Interface MTU on every node
pub struct MtuProbe {
    interface: String,
    expected: Option<u32>,
}

impl MtuProbe {
    pub fn new(interface: impl Into<String>, expected: Option<u32>) -> Self {
        Self {
            interface: interface.into(),
            expected,
        }
    }

    fn row(&self, node: &str, outcome: &CommandOutcome) -> ProbeResult {
        let verdict = Classifier::Numeric.classify(outcome);
        if verdict.status != Status::Ok {
            return ProbeResult::new(node, verdict.status, verdict.body);
        }
        let body = format!("MTU: {}", verdict.body);
        match (self.expected, verdict.body.parse::<u32>()) {
            (Some(expected), Ok(actual)) if actual != expected => {
                ProbeResult::warning(node, format!("{} (expected {})", body, expected))
            }
            _ => ProbeResult::ok(node, body),
        }
    }
}

#[async_trait]
impl Probe for MtuProbe {
    fn title(&self) -> &str {
        "MTU"
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>> {
        let inner = format!("cat /sys/class/net/{}/mtu", self.interface);
        Ok(on_every_node(ctx, |_| inner.clone())
            .await?
            .iter()
            .map(|(node, outcome)| self.row(&node.name, outcome))
            .collect())
    }
}

/// `oc adm top node`; runs from the host, not the node
pub struct NodeResourcesProbe;

#[async_trait]
impl Probe for NodeResourcesProbe {
    fn title(&self) -> &str {
        "Node resources"
    }

    fn headers(&self) -> [&str; 2] {
        ["Node", "Resources"]
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>> {
        let mut rows = Vec::with_capacity(ctx.inventory.len());
        for node in ctx.inventory.nodes() {
            let command = ctx
                .command(format!("oc adm top node {}", node.name))
                .target(node.name.clone());
            let outcome = ctx.run(&command).await?;
            rows.push(ProbeResult::from_outcome(
                &node.name,
                &outcome,
                &Classifier::ExitStatus,
            ));
        }
        Ok(rows)
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
                "lab",
                vec![Node::inferred("m1"), Node::inferred("w1"), Node::inferred("w2")],
            ),
        )
    }

    #[tokio::test]
    async fn test_ntp_rows_follow_inventory_order() {
        let runner = FakeRunner::new()
            .on(
                "node/m1 ",
                FakeResponse::ok("   System clock synchronized: yes\n NTP service: active"),
            )
            .on(
                "node/w1 ",
                FakeResponse::ok("System clock synchronized: no").delayed(std::time::Duration::from_millis(20)),
            )
            .on("node/w2 ", FakeResponse::timed_out());
        let rows = NtpProbe.run(&ctx(runner)).await.unwrap();

        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["m1", "w1", "w2"]);
        assert_eq!(rows[0].status, Status::Ok);
        assert_eq!(rows[1].status, Status::Warning);
        assert_eq!(rows[2].status, Status::Error);
        assert!(rows[2].body.starts_with("[timed out]"));
    }

    #[tokio::test]
    async fn test_mtu_expected_mismatch_warns() {
        let runner = FakeRunner::new()
            .on("node/m1 ", FakeResponse::ok("1500\n"))
            .on("node/w1 ", FakeResponse::ok("9000\n"))
            .on("node/w2 ", FakeResponse::fail(1, "No such file or directory"));
        let rows = MtuProbe::new("br-ex", Some(1500)).run(&ctx(runner)).await.unwrap();

        assert_eq!(rows[0], ProbeResult::ok("m1", "MTU: 1500"));
        assert_eq!(rows[1].status, Status::Warning);
        assert_eq!(rows[1].body, "MTU: 9000 (expected 1500)");
        assert_eq!(rows[2].status, Status::Error);
    }

    #[tokio::test]
    async fn test_mtu_reads_configured_interface() {
        let runner = Arc::new(FakeRunner::new().default_response(FakeResponse::ok("1500")));
        let ctx = ProbeContext::new(runner.clone(), Inventory::new("lab", vec![Node::inferred("w1")]));
        MtuProbe::new("ens192", None).run(&ctx).await.unwrap();
        assert_eq!(runner.call_count("cat /sys/class/net/ens192/mtu"), 1);
    }

    #[tokio::test]
    async fn test_node_resources() {
        let runner = FakeRunner::new()
            .on("top node m1", FakeResponse::ok("NAME CPU(cores)\nm1   512m"))
            .on("top node w1", FakeResponse::fail(1, "error: metrics not available yet"));
        let rows = NodeResourcesProbe.run(&ctx(runner)).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        assert_eq!(rows[1].status, Status::Error);
    }
}
