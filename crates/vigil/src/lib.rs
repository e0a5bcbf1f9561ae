//! Vigil engine - runs diagnostic probes against a cluster and writes the
//! report. Exposes modules for testing.

pub mod config;
pub mod connectivity;
pub mod fake_runner;
pub mod inventory;
pub mod node_shell;
pub mod orchestrator;
pub mod probes;
pub mod registry;
pub mod runner;
pub mod tracker;

pub use config::Config;
pub use connectivity::{ConnectivityMatrix, ConnectivityMatrixBuilder, ConnectivityMode};
pub use fake_runner::{FakeResponse, FakeRunner};
pub use inventory::{CommandInventory, InventorySource, StaticInventory};
pub use orchestrator::{Orchestrator, RunSummary};
pub use registry::{Probe, ProbeContext, ProbeRegistry, ProbeSection};
pub use runner::{CommandRunner, ShellRunner, ThrottledRunner};
pub use tracker::{CleanupRecord, CleanupSummary, ResourceTracker};
