//! Node debug shell - runs host commands on a node through `oc debug`.
//!
//! With an ephemeral namespace enabled, the first node command of a run
//! creates `{prefix}-{id}` and registers it with the resource tracker, so
//! leftover debug pods (for example from timed-out sessions) go away with it.

use crate::runner::CommandRunner;
use crate::tracker::ResourceTracker;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use vigil_shared::{Command, EphemeralResource, Node};

/// Timeout for namespace bookkeeping commands
const NAMESPACE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct NodeShell {
    ephemeral_namespace: bool,
    namespace_prefix: String,
    namespace: OnceCell<Option<String>>,
}

impl NodeShell {
    pub fn new(ephemeral_namespace: bool, namespace_prefix: impl Into<String>) -> Self {
        Self {
            ephemeral_namespace,
            namespace_prefix: namespace_prefix.into(),
            namespace: OnceCell::new(),
        }
    }

    /// Debug pods go to the default namespace; nothing is created
    pub fn disabled() -> Self {
        Self::new(false, "")
    }

    /// Wrap `inner` so it runs in the host root of `node`
    pub async fn command(
        &self,
        runner: &dyn CommandRunner,
        tracker: &ResourceTracker,
        node: &Node,
        inner: &str,
        timeout: Duration,
    ) -> Command {
        let namespace = self.namespace(runner, tracker).await;
        Command::new(debug_command_text(&node.name, namespace.as_deref(), inner))
            .timeout(timeout)
            .target(node.name.clone())
    }

    /// The run's debug namespace, created on first use
    pub async fn namespace(
        &self,
        runner: &dyn CommandRunner,
        tracker: &ResourceTracker,
    ) -> Option<String> {
        if !self.ephemeral_namespace {
            return None;
        }
        self.namespace
            .get_or_init(|| self.create_namespace(runner, tracker))
            .await
            .clone()
    }

    async fn create_namespace(
        &self,
        runner: &dyn CommandRunner,
        tracker: &ResourceTracker,
    ) -> Option<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}", self.namespace_prefix, &id[..8]);

        let create = Command::new(format!("oc create namespace {}", name)).timeout(NAMESPACE_TIMEOUT);
        let outcome = match runner.run(&create).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Cannot create debug namespace {}: {}", name, e);
                return None;
            }
        };

        // A timed-out create may still have happened, so track it anyway
        if outcome.success() || outcome.timed_out() {
            tracker.track(EphemeralResource::namespace(&name));
        }
        if !outcome.success() {
            warn!(
                "Cannot create debug namespace {}, using default: {}",
                name,
                outcome.combined_output()
            );
            return None;
        }

        let label = Command::new(format!(
            "oc label namespace {} pod-security.kubernetes.io/enforce=privileged --overwrite",
            name
        ))
        .timeout(NAMESPACE_TIMEOUT);
        match runner.run(&label).await {
            Ok(o) if o.success() => {}
            Ok(o) => warn!("Cannot label {}: {}", name, o.combined_output()),
            Err(e) => warn!("Cannot label {}: {}", name, e),
        }

        info!("Debug pods will run in namespace {}", name);
        Some(name)
    }
}

/// `oc debug node/{node} [--to-namespace=ns] -- chroot /host {inner}`
pub fn debug_command_text(node: &str, namespace: Option<&str>, inner: &str) -> String {
    match namespace {
        Some(ns) => format!(
            "oc debug node/{} --to-namespace={} -- chroot /host {}",
            node, ns, inner
        ),
        None => format!("oc debug node/{} -- chroot /host {}", node, inner),
    }
}
