//! Ceph health through the rook operator pod.

use crate::registry::{Probe, ProbeContext};
use async_trait::async_trait;
use vigil_shared::{Classifier, CommandOutcome, ProbeResult, Status, Verdict};

pub struct CephProbe {
    namespace: String,
}

impl CephProbe {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn operator_pod_command(&self) -> String {
        format!(
            "oc -n {} get pod -l app=rook-ceph-operator -o jsonpath='{{.items[0].metadata.name}}'",
            self.namespace
        )
    }

    fn status_command(&self, pod: &str) -> String {
        let ns = &self.namespace;
        format!(
            "oc exec {pod} -n {ns} -- ceph -s --cluster={ns} \
             --conf=/var/lib/rook/{ns}/{ns}.config \
             --keyring=/var/lib/rook/{ns}/client.admin.keyring"
        )
    }
}

fn classify_ceph(outcome: &CommandOutcome) -> Verdict {
    if !outcome.success() {
        return Classifier::ExitStatus.classify(outcome);
    }
    let body = outcome.stdout().trim();
    let status = if body.contains("HEALTH_ERR") {
        Status::Error
    } else if body.contains("HEALTH_WARN") {
        Status::Warning
    } else if body.contains("HEALTH_OK") {
        Status::Ok
    } else {
        Status::Error
    };
    Verdict::new(status, body)
}

#[async_trait]
impl Probe for CephProbe {
    fn title(&self) -> &str {
        "Ceph status"
    }

    fn headers(&self) -> [&str; 2] {
        ["Component", "State"]
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>> {
        let lookup = ctx.run(&ctx.command(self.operator_pod_command())).await?;
        let pod = lookup.stdout().trim().trim_matches('\'');
        if !lookup.success() || pod.is_empty() {
            let detail = lookup.combined_output();
            let detail = if detail.is_empty() { "no pod found".to_string() } else { detail };
            return Ok(vec![ProbeResult::error(
                "Operator pod",
                format!("cannot find the rook-ceph operator pod: {}", detail),
            )]);
        }

        let outcome = ctx.run(&ctx.command(self.status_command(pod))).await?;
        Ok(vec![ProbeResult::from_outcome(
            "Ceph",
            &outcome,
            &Classifier::Custom(classify_ceph),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_runner::{FakeResponse, FakeRunner};
    use std::sync::Arc;
    use vigil_shared::{Inventory, Node};

    fn ctx(runner: Arc<FakeRunner>) -> ProbeContext {
        ProbeContext::new(runner, Inventory::new("lab", vec![Node::inferred("m1")]))
    }

    #[tokio::test]
    async fn test_missing_operator_pod_is_single_error() {
        let runner = Arc::new(FakeRunner::new().on("rook-ceph-operator", FakeResponse::ok("")));
        let rows = CephProbe::new("openshift-storage").run(&ctx(runner.clone())).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, Status::Error);
        assert_eq!(runner.call_count("ceph -s"), 0);
    }

    #[tokio::test]
    async fn test_health_warn_is_warning() {
        let runner = Arc::new(
            FakeRunner::new()
                .on("rook-ceph-operator", FakeResponse::ok("rook-ceph-operator-5c7d"))
                .on("ceph -s", FakeResponse::ok("  cluster:\n    health: HEALTH_WARN\n")),
        );
        let rows = CephProbe::new("openshift-storage").run(&ctx(runner.clone())).await.unwrap();
        assert_eq!(rows[0].status, Status::Warning);
        let calls = runner.calls();
        assert!(calls[1].text.starts_with("oc exec rook-ceph-operator-5c7d -n openshift-storage"));
        assert!(calls[1]
            .text
            .contains("--keyring=/var/lib/rook/openshift-storage/client.admin.keyring"));
    }
}
