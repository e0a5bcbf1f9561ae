//! Probe registry - ordered, independent diagnostic units.
//!
//! Probes run on tokio tasks with a bounded degree of concurrency. Each
//! probe's output lands in the slot of its registration index, so report
//! order never depends on completion order. A probe that fails or panics
//! becomes a single error row naming it; the run continues.

use crate::node_shell::NodeShell;
use crate::runner::CommandRunner;
use crate::tracker::ResourceTracker;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vigil_shared::command::DEFAULT_TIMEOUT;
use vigil_shared::{
    worst_status, Command, CommandOutcome, Inventory, Node, ProbeResult, Result, Status,
    VigilError,
};

/// Default number of probes running at once
pub const DEFAULT_CONCURRENCY: usize = 4;

// ============================================================================
// Probe Context
// ============================================================================

/// Capabilities handed to every probe. Cheap to clone.
#[derive(Clone)]
pub struct ProbeContext {
    pub runner: Arc<dyn CommandRunner>,
    pub tracker: Arc<ResourceTracker>,
    pub inventory: Arc<Inventory>,
    pub node_shell: Arc<NodeShell>,
    pub command_timeout: Duration,
    pub cancel: CancellationToken,
}

impl ProbeContext {
    pub fn new(runner: Arc<dyn CommandRunner>, inventory: Inventory) -> Self {
        Self {
            runner,
            tracker: Arc::new(ResourceTracker::new()),
            inventory: Arc::new(inventory),
            node_shell: Arc::new(NodeShell::disabled()),
            command_timeout: DEFAULT_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<ResourceTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_node_shell(mut self, node_shell: NodeShell) -> Self {
        self.node_shell = Arc::new(node_shell);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Command with the run's default timeout
    pub fn command(&self, text: impl Into<String>) -> Command {
        Command::new(text).timeout(self.command_timeout)
    }

    pub async fn run(&self, command: &Command) -> Result<CommandOutcome> {
        self.runner.run(command).await
    }

    /// Run `inner` in the host root of `node` with the default timeout
    pub async fn run_on_node(&self, node: &Node, inner: &str) -> Result<CommandOutcome> {
        self.run_on_node_with_timeout(node, inner, self.command_timeout)
            .await
    }

    pub async fn run_on_node_with_timeout(
        &self,
        node: &Node,
        inner: &str,
        timeout: Duration,
    ) -> Result<CommandOutcome> {
        let command = self
            .node_shell
            .command(&*self.runner, &self.tracker, node, inner, timeout)
            .await;
        self.runner.run(&command).await
    }
}

// ============================================================================
// Probe Trait
// ============================================================================

/// An independent diagnostic unit producing one or more rows
#[async_trait]
pub trait Probe: Send + Sync {
    /// Section title in the report
    fn title(&self) -> &str;

    /// Key and value column headers
    fn headers(&self) -> [&str; 2] {
        ["Node", "Result"]
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>>;
}

type ProbeFn =
    dyn Fn(ProbeContext) -> BoxFuture<'static, anyhow::Result<Vec<ProbeResult>>> + Send + Sync;

/// Probe backed by a closure
pub struct FnProbe {
    title: String,
    headers: [String; 2],
    func: Box<ProbeFn>,
}

impl FnProbe {
    pub fn new<F>(title: impl Into<String>, headers: [&str; 2], func: F) -> Self
    where
        F: Fn(ProbeContext) -> BoxFuture<'static, anyhow::Result<Vec<ProbeResult>>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            title: title.into(),
            headers: [headers[0].to_string(), headers[1].to_string()],
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Probe for FnProbe {
    fn title(&self) -> &str {
        &self.title
    }

    fn headers(&self) -> [&str; 2] {
        [self.headers[0].as_str(), self.headers[1].as_str()]
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<Vec<ProbeResult>> {
        (self.func)(ctx.clone()).await
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Output of one registered probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeSection {
    pub name: String,
    pub title: String,
    pub headers: [String; 2],
    pub results: Vec<ProbeResult>,
    pub elapsed_ms: u64,
}

impl ProbeSection {
    pub fn worst_status(&self) -> Status {
        worst_status(&self.results)
    }
}

struct Registered {
    name: String,
    probe: Arc<dyn Probe>,
}

enum Slot {
    Spawned(JoinHandle<(anyhow::Result<Vec<ProbeResult>>, Duration)>),
    NotScheduled,
}

/// Ordered list of named probes
pub struct ProbeRegistry {
    probes: Vec<Registered>,
    concurrency: usize,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self {
            probes: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Probes running at once; 1 runs them strictly one after another
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Append a probe; names must be unique
    pub fn register(&mut self, name: &str, probe: impl Probe + 'static) -> Result<&mut Self> {
        if self.probes.iter().any(|p| p.name == name) {
            return Err(VigilError::Config(format!(
                "probe '{}' is already registered",
                name
            )));
        }
        self.probes.push(Registered {
            name: name.to_string(),
            probe: Arc::new(probe),
        });
        Ok(self)
    }

    /// Append a closure probe
    pub fn register_fn<F>(
        &mut self,
        name: &str,
        title: &str,
        headers: [&str; 2],
        func: F,
    ) -> Result<&mut Self>
    where
        F: Fn(ProbeContext) -> BoxFuture<'static, anyhow::Result<Vec<ProbeResult>>>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, FnProbe::new(title, headers, func))
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.probes.iter().map(|p| p.name.as_str()).collect()
    }

    /// `(name, title)` pairs, in registration order
    pub fn entries(&self) -> Vec<(&str, &str)> {
        self.probes
            .iter()
            .map(|p| (p.name.as_str(), p.probe.title()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Keep only `names`, preserving registration order
    pub fn select<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        for name in names {
            if !self.probes.iter().any(|p| p.name == name.as_ref()) {
                return Err(VigilError::Config(format!(
                    "unknown probe '{}' (available: {})",
                    name.as_ref(),
                    self.names().join(", ")
                )));
            }
        }
        self.probes
            .retain(|p| names.iter().any(|n| n.as_ref() == p.name));
        Ok(self)
    }

    /// Run every probe and return one section per probe, in registration order.
    ///
    /// Returns `Err` only for an infrastructure failure, after all started
    /// probes have finished.
    pub async fn run_all(&self, ctx: &ProbeContext) -> Result<Vec<ProbeSection>> {
        info!(
            "Running {} probe(s), concurrency {}",
            self.probes.len(),
            self.concurrency
        );
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut slots = Vec::with_capacity(self.probes.len());

        // Scheduling follows registration order
        for entry in &self.probes {
            let permit = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                permit = permits.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                slots.push(Slot::NotScheduled);
                continue;
            };

            let probe = entry.probe.clone();
            let ctx = ctx.clone();
            let name = entry.name.clone();
            slots.push(Slot::Spawned(tokio::spawn(async move {
                let _permit = permit;
                info!("Running probe: {}", name);
                let start = Instant::now();
                let result = probe.run(&ctx).await;
                (result, start.elapsed())
            })));
        }

        let mut sections = Vec::with_capacity(self.probes.len());
        let mut fatal = None;
        for (entry, slot) in self.probes.iter().zip(slots) {
            let (results, elapsed) = match slot {
                Slot::NotScheduled => {
                    warn!("Probe {} not run: run cancelled", entry.name);
                    (
                        vec![ProbeResult::warning(&entry.name, "not run: run cancelled")],
                        Duration::ZERO,
                    )
                }
                Slot::Spawned(handle) => match handle.await {
                    Ok((Ok(results), elapsed)) => (results, elapsed),
                    Ok((Err(e), elapsed)) => {
                        let infrastructure = e
                            .downcast_ref::<VigilError>()
                            .is_some_and(VigilError::is_infrastructure);
                        if infrastructure {
                            error!("Probe {} hit an infrastructure failure: {:#}", entry.name, e);
                            if fatal.is_none() {
                                fatal = Some(VigilError::Infrastructure(format!(
                                    "probe '{}': {:#}",
                                    entry.name, e
                                )));
                            }
                        } else {
                            warn!("Probe {} failed: {:#}", entry.name, e);
                        }
                        (vec![internal_error(&entry.name, format!("{:#}", e))], elapsed)
                    }
                    Err(join_error) => {
                        let message = if join_error.is_panic() {
                            format!("panicked: {}", panic_message(join_error.into_panic()))
                        } else {
                            "task cancelled".to_string()
                        };
                        error!("Probe {} {}", entry.name, message);
                        (vec![internal_error(&entry.name, message)], Duration::ZERO)
                    }
                },
            };

            sections.push(ProbeSection {
                name: entry.name.clone(),
                title: entry.probe.title().to_string(),
                headers: entry.probe.headers().map(str::to_string),
                results,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(sections),
        }
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn internal_error(probe: &str, message: String) -> ProbeResult {
    let err = VigilError::InternalProbe {
        probe: probe.to_string(),
        message,
    };
    ProbeResult::error(probe, err.to_string())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
