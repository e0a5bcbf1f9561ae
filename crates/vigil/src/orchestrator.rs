//! Orchestrator - one end-to-end diagnostic run.
//!
//! discover -> probe -> assemble -> persist, then cleanup. Cleanup runs on
//! every exit path once discovery succeeded, including a panicking probe
//! phase; the panic is resumed after the tracked resources are released.

use crate::config::{Config, ConnectivityConfig};
use crate::connectivity::{ConnectivityMatrix, ConnectivityMatrixBuilder, ConnectivityMode};
use crate::inventory::{self, InventorySource};
use crate::node_shell::NodeShell;
use crate::probes::default_registry;
use crate::registry::{ProbeContext, ProbeRegistry, ProbeSection};
use crate::runner::{CommandRunner, ShellRunner, ThrottledRunner};
use crate::tracker::{CleanupSummary, ResourceTracker};
use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vigil_shared::{Inventory, Report, ReportAssembler, Result, Status};

/// What a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub cluster_name: String,
    pub report_path: PathBuf,
    pub json_path: Option<PathBuf>,
    pub sections: Vec<ProbeSection>,
    pub cleanup: CleanupSummary,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Worst status over every row of the report
    pub fn worst_status(&self) -> Status {
        self.sections
            .iter()
            .map(ProbeSection::worst_status)
            .max()
            .unwrap_or(Status::Ok)
    }

    /// Number of rows with `status`
    pub fn count(&self, status: Status) -> usize {
        self.sections
            .iter()
            .flat_map(|s| s.results.iter())
            .filter(|r| r.status == status)
            .count()
    }
}

struct Persisted {
    sections: Vec<ProbeSection>,
    report_path: PathBuf,
    json_path: Option<PathBuf>,
}

pub struct Orchestrator {
    config: Config,
    runner: Arc<dyn CommandRunner>,
    inventory_source: Box<dyn InventorySource>,
    registry: ProbeRegistry,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        inventory_source: Box<dyn InventorySource>,
        registry: ProbeRegistry,
    ) -> Self {
        Self {
            config,
            runner,
            inventory_source,
            registry,
            cancel: CancellationToken::new(),
        }
    }

    /// Production wiring: shell runner behind the command pool, inventory
    /// and probe catalog from the config
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let runner = ThrottledRunner::new(
            ShellRunner::with_shell(&config.run.shell),
            config.run.max_concurrent_commands,
        );
        let registry = default_registry(&config)?;
        let source = inventory::from_config(&config.inventory);
        Ok(Self::new(config, Arc::new(runner), source, registry))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// Cancelling stops scheduling probes; cleanup still runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let inventory = self.inventory_source.discover(&*self.runner).await?;
        let cluster_name = inventory.cluster_name.clone();
        info!(
            "Cluster {}: {} node(s), {} probe(s)",
            cluster_name,
            inventory.len(),
            self.registry.len()
        );

        let (ctx, tracker) = self.context(inventory);
        let deadline = self.arm_deadline(&ctx.cancel);

        let outcome = self.guarded(&tracker, deadline, self.probe_and_persist(&ctx)).await;
        let (persisted, cleanup) = outcome?;

        let summary = RunSummary {
            cluster_name,
            report_path: persisted.report_path,
            json_path: persisted.json_path,
            sections: persisted.sections,
            cleanup,
            elapsed: start.elapsed(),
        };
        info!(
            "Run finished in {:.1}s: {} ok, {} warning, {} error",
            summary.elapsed.as_secs_f64(),
            summary.count(Status::Ok),
            summary.count(Status::Warning),
            summary.count(Status::Error)
        );
        Ok(summary)
    }

    /// Build only the connectivity matrix, with the same cleanup guarantee
    pub async fn connectivity_matrix(
        &self,
        mode: ConnectivityMode,
    ) -> Result<(ConnectivityMatrix, CleanupSummary)> {
        let inventory = self.inventory_source.discover(&*self.runner).await?;
        let (ctx, tracker) = self.context(inventory);
        let builder = ConnectivityMatrixBuilder::from_config(&ConnectivityConfig {
            mode,
            ..self.config.connectivity.clone()
        });
        self.guarded(&tracker, None, builder.build(&ctx)).await
    }

    fn context(&self, inventory: Inventory) -> (ProbeContext, Arc<ResourceTracker>) {
        let tracker = Arc::new(ResourceTracker::new());
        let debug = &self.config.debug;
        let ctx = ProbeContext::new(self.runner.clone(), inventory)
            .with_tracker(tracker.clone())
            .with_node_shell(NodeShell::new(debug.ephemeral_namespace, &debug.namespace_prefix))
            .with_timeout(self.config.run.command_timeout())
            .with_cancel(self.cancel.child_token());
        (ctx, tracker)
    }

    fn arm_deadline(&self, cancel: &CancellationToken) -> Option<JoinHandle<()>> {
        let limit = self.config.run.deadline()?;
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {
                    warn!("Run deadline of {:?} reached, no further probes will start", limit);
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        }))
    }

    /// Run `work`, then always release tracked resources
    async fn guarded<T>(
        &self,
        tracker: &ResourceTracker,
        deadline: Option<JoinHandle<()>>,
        work: impl Future<Output = Result<T>>,
    ) -> Result<(T, CleanupSummary)> {
        let outcome = AssertUnwindSafe(work).catch_unwind().await;
        if let Some(handle) = deadline {
            handle.abort();
        }

        let records = tracker
            .cleanup_all(&*self.runner, self.config.run.cleanup_timeout())
            .await;
        let cleanup = CleanupSummary::new(records);
        if !cleanup.is_clean() {
            warn!("{} ephemeral resource(s) could not be deleted", cleanup.failed().len());
        }

        match outcome {
            Ok(Ok(value)) => Ok((value, cleanup)),
            Ok(Err(e)) => Err(e),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn probe_and_persist(&self, ctx: &ProbeContext) -> Result<Persisted> {
        let sections = self.registry.run_all(ctx).await?;

        let mut assembler = ReportAssembler::new(&ctx.inventory.cluster_name);
        for section in &sections {
            assembler.add_section(
                &section.title,
                [section.headers[0].as_str(), section.headers[1].as_str()],
                section.results.clone(),
            );
        }
        let report = assembler.finish();

        let report_path = report.persist(&self.config.run.output_dir)?;
        info!("Report written to {}", report_path.display());

        let json_path = if self.config.run.write_json {
            persist_json_beside(&report, &report_path)
        } else {
            None
        };

        Ok(Persisted {
            sections,
            report_path,
            json_path,
        })
    }
}

/// The text report is the run's artifact; a failed JSON copy only warns
fn persist_json_beside(report: &Report, report_path: &Path) -> Option<PathBuf> {
    match report.persist_json(report_path) {
        Ok(path) => {
            info!("JSON report written to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("JSON report not written: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_runner::FakeRunner;
    use crate::inventory::StaticInventory;
    use vigil_shared::{EphemeralResource, Node, VigilError};

    fn orchestrator(runner: Arc<FakeRunner>) -> Orchestrator {
        Orchestrator::new(
            Config::default(),
            runner,
            Box::new(StaticInventory::new(Inventory::new(
                "lab",
                vec![Node::inferred("m1")],
            ))),
            ProbeRegistry::new(),
        )
    }

    #[test]
    fn test_failed_json_keeps_text_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let report = ReportAssembler::new("lab").finish();
        let text_path = report.persist(dir.path()).unwrap();
        std::fs::create_dir(text_path.with_extension("json")).unwrap();

        assert!(persist_json_beside(&report, &text_path).is_none());
        assert!(text_path.is_file());

        let other = ReportAssembler::new("lab2").finish();
        let other_text = other.persist(dir.path()).unwrap();
        let json = persist_json_beside(&other, &other_text).unwrap();
        assert!(json.is_file());
    }

    #[tokio::test]
    async fn test_panic_is_resumed_after_cleanup() {
        let runner = Arc::new(FakeRunner::new());
        let orch = orchestrator(runner.clone());
        let tracker = ResourceTracker::new();
        tracker.track(EphemeralResource::namespace("vigil-debug-x"));

        let work = async {
            if tracker.len() == 1 {
                panic!("assembly exploded");
            }
            Ok::<(), VigilError>(())
        };
        let caught = AssertUnwindSafe(orch.guarded(&tracker, None, work))
            .catch_unwind()
            .await;

        assert!(caught.is_err());
        assert!(tracker.is_empty());
        assert_eq!(runner.call_count("oc delete namespace vigil-debug-x"), 1);
    }

    #[tokio::test]
    async fn test_error_returned_after_cleanup() {
        let runner = Arc::new(FakeRunner::new());
        let orch = orchestrator(runner.clone());
        let tracker = ResourceTracker::new();
        tracker.track(EphemeralResource::namespace("vigil-debug-y"));

        let result = orch
            .guarded(&tracker, None, async {
                Err::<(), _>(VigilError::Report("disk full".into()))
            })
            .await;
        assert!(matches!(result, Err(VigilError::Report(_))));
        assert_eq!(runner.call_count("delete namespace vigil-debug-y"), 1);
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary {
            cluster_name: "lab".into(),
            report_path: PathBuf::from("lab.txt"),
            json_path: None,
            sections: vec![ProbeSection {
                name: "ntp".into(),
                title: "NTP".into(),
                headers: ["Node".into(), "Result".into()],
                results: vec![
                    vigil_shared::ProbeResult::ok("m1", "synchronized"),
                    vigil_shared::ProbeResult::warning("w1", "clock not synchronized"),
                ],
                elapsed_ms: 3,
            }],
            cleanup: CleanupSummary::default(),
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(summary.worst_status(), Status::Warning);
        assert_eq!(summary.count(Status::Ok), 1);
        assert_eq!(summary.count(Status::Error), 0);
    }
}
