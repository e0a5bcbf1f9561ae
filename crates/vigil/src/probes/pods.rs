use crate::registry::{Probe, ProbeContext};
use async_trait::async_trait;
use vigil_shared::{Classifier, ProbeResult};

/// Pod listing of one namespace; an empty namespace is a warning
pub struct NamespacePodsProbe {
    title: String,
    namespace: String,
}

impl NamespacePodsProbe {
    pub fn new(title: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl Probe for NamespacePodsProbe {
    fn title(&self) -> &str {
        &self.title
    }

    fn headers(&self) -> [&str; 2] {
        ["Component", "State"]
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>> {
        let command = ctx.command(format!("oc get pods -n {} -o wide", self.namespace));
        let outcome = ctx.run(&command).await?;
        Ok(vec![ProbeResult::from_outcome(
            format!("{} pods", self.namespace),
            &outcome,
            &Classifier::WarnOnEmpty,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_runner::{FakeResponse, FakeRunner};
    use std::sync::Arc;
    use vigil_shared::{Inventory, Node, Status};

    #[tokio::test]
    async fn test_empty_namespace_is_warning() {
        let runner = FakeRunner::new().on(
            "-n openshift-sso",
            FakeResponse::output(0, "", "No resources found in openshift-sso namespace."),
        );
        let ctx = ProbeContext::new(Arc::new(runner), Inventory::new("lab", vec![Node::inferred("m1")]));
        let rows = NamespacePodsProbe::new("SSO status", "openshift-sso")
            .run(&ctx)
            .await
            .unwrap();
        assert_eq!(rows[0].title, "openshift-sso pods");
        assert_eq!(rows[0].status, Status::Warning);
    }
}
