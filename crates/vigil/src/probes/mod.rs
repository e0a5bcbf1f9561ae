//! Built-in probe catalog.
//!
//! Registration order below is the section order of the report.

mod cluster;
mod node;
mod pods;
mod storage;

pub use cluster::{ClusterInfoProbe, DiskUsageProbe};
pub use node::{MtuProbe, NodeResourcesProbe, NtpProbe};
pub use pods::NamespacePodsProbe;
pub use storage::CephProbe;

use crate::config::Config;
use crate::connectivity::{ConnectivityMatrixBuilder, ConnectivityProbe};
use crate::registry::{ProbeContext, ProbeRegistry};
use futures::stream::{self, StreamExt, TryStreamExt};
use vigil_shared::{CommandOutcome, Node, Result, VigilError};

/// Names of the built-in probes, in report order
pub const DEFAULT_PROBE_ORDER: &[&str] = &[
    "cluster-info",
    "ntp",
    "ceph",
    "mtu",
    "node-resources",
    "odf",
    "sso",
    "3scale",
    "connectivity",
    "disk-usage",
];

/// Node commands of one probe in flight at once
const NODE_FANOUT: usize = 8;

/// Registry holding every built-in probe, narrowed to `probes.enabled`
pub fn default_registry(config: &Config) -> Result<ProbeRegistry> {
    let probes = &config.probes;
    let mut registry = ProbeRegistry::new().with_concurrency(config.run.concurrency);

    registry.register("cluster-info", ClusterInfoProbe)?;
    registry.register("ntp", NtpProbe)?;
    registry.register("ceph", CephProbe::new(&probes.storage_namespace))?;
    registry.register(
        "mtu",
        MtuProbe::new(&probes.mtu_interface, probes.expected_mtu),
    )?;
    registry.register("node-resources", NodeResourcesProbe)?;
    registry.register(
        "odf",
        NamespacePodsProbe::new("ODF status", &probes.storage_namespace),
    )?;
    registry.register(
        "sso",
        NamespacePodsProbe::new("SSO status", &probes.sso_namespace),
    )?;
    registry.register(
        "3scale",
        NamespacePodsProbe::new("3scale status", &probes.threescale_namespace),
    )?;
    registry.register(
        "connectivity",
        ConnectivityProbe::new(ConnectivityMatrixBuilder::from_config(&config.connectivity)),
    )?;
    registry.register("disk-usage", DiskUsageProbe)?;

    registry.select(&probes.enabled)
}

/// Run `inner` on every node; outcomes come back in inventory order
pub(crate) async fn on_every_node<F>(
    ctx: &ProbeContext,
    inner: F,
) -> Result<Vec<(Node, CommandOutcome)>>
where
    F: Fn(&Node) -> String,
{
    let inner = &inner;
    stream::iter(ctx.inventory.nodes().iter().cloned())
        .map(|node| async move {
            let outcome = ctx.run_on_node(&node, &inner(&node)).await?;
            Ok::<_, VigilError>((node, outcome))
        })
        .buffered(NODE_FANOUT)
        .try_collect()
        .await
}
