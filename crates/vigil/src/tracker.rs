//! Resource tracker - ephemeral objects created while probing.
//!
//! Entries are append-only while probes run. `cleanup_all` drains the set
//! and makes exactly one deletion attempt per resource; a second call finds
//! nothing to do. Deletion failures are recorded, never escalated.

use crate::runner::CommandRunner;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use vigil_shared::{Command, CommandOutcome, EphemeralResource};

/// Result of one deletion attempt
#[derive(Debug, Clone, Serialize)]
pub struct CleanupRecord {
    pub resource: EphemeralResource,
    pub outcome: CommandOutcome,
}

impl CleanupRecord {
    pub fn deleted(&self) -> bool {
        self.outcome.success()
    }
}

/// All deletion attempts of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
    pub records: Vec<CleanupRecord>,
}

impl CleanupSummary {
    pub fn new(records: Vec<CleanupRecord>) -> Self {
        Self { records }
    }

    pub fn deleted(&self) -> usize {
        self.records.iter().filter(|r| r.deleted()).count()
    }

    pub fn failed(&self) -> Vec<&CleanupRecord> {
        self.records.iter().filter(|r| !r.deleted()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.records.iter().all(|r| r.deleted())
    }

    /// Short text block for terminal output
    pub fn render(&self) -> String {
        if self.records.is_empty() {
            return "Cleanup: no ephemeral resources created\n".to_string();
        }
        let mut out = format!(
            "Cleanup: {} deleted, {} failed\n",
            self.deleted(),
            self.records.len() - self.deleted()
        );
        for record in self.failed() {
            out.push_str(&format!(
                "  FAILED {}: {}\n",
                record.resource,
                record.outcome.combined_output()
            ));
        }
        out
    }
}

/// Run-scoped, thread-safe registry of ephemeral resources
#[derive(Debug, Default)]
pub struct ResourceTracker {
    resources: Mutex<Vec<EphemeralResource>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resource that must be released at the end of the run
    pub fn track(&self, resource: EphemeralResource) {
        debug!("Tracking ephemeral resource {}", resource);
        self.lock().push(resource);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Currently tracked resources, in tracking order
    pub fn snapshot(&self) -> Vec<EphemeralResource> {
        self.lock().clone()
    }

    /// Attempt deletion of every tracked resource, once
    pub async fn cleanup_all(
        &self,
        runner: &dyn CommandRunner,
        timeout: Duration,
    ) -> Vec<CleanupRecord> {
        let drained = std::mem::take(&mut *self.lock());
        if drained.is_empty() {
            return Vec::new();
        }

        info!("Cleaning up {} ephemeral resource(s)", drained.len());
        let mut records = Vec::with_capacity(drained.len());
        for resource in drained {
            let command = Command::new(resource.deletion_command()).timeout(timeout);
            let outcome = match runner.run(&command).await {
                Ok(outcome) => outcome,
                Err(e) => CommandOutcome::not_run(&command, e.to_string()),
            };
            if outcome.success() {
                debug!("Deleted {}", resource);
            } else {
                warn!(
                    "Failed to delete {}: {}",
                    resource,
                    outcome.combined_output()
                );
            }
            records.push(CleanupRecord { resource, outcome });
        }
        records
    }

    // Nothing holds the lock across a panic point, so a poisoned guard is usable
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EphemeralResource>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_runner::{FakeResponse, FakeRunner};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let tracker = ResourceTracker::new();
        tracker.track(EphemeralResource::namespace("vigil-debug-a"));
        tracker.track(EphemeralResource::pod("dbg-1", "default"));
        let runner = FakeRunner::new();

        let first = tracker.cleanup_all(&runner, Duration::from_secs(5)).await;
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|r| r.deleted()));
        assert_eq!(first[0].resource.id, "vigil-debug-a");

        let second = tracker.cleanup_all(&runner, Duration::from_secs(5)).await;
        assert!(second.is_empty());
        assert_eq!(runner.calls().len(), 2);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_failed_deletion_is_recorded_not_retried() {
        let tracker = ResourceTracker::new();
        tracker.track(EphemeralResource::namespace("stuck"));
        tracker.track(EphemeralResource::namespace("fine"));
        let runner = FakeRunner::new()
            .on("namespace stuck", FakeResponse::fail(1, "forbidden"))
            .on("namespace fine", FakeResponse::ok("namespace \"fine\" deleted"));

        let summary = CleanupSummary::new(tracker.cleanup_all(&runner, Duration::from_secs(5)).await);
        assert_eq!(summary.deleted(), 1);
        assert_eq!(summary.failed().len(), 1);
        assert!(!summary.is_clean());
        assert!(summary.render().contains("FAILED namespace/stuck: forbidden"));
        assert_eq!(runner.call_count("namespace stuck"), 1);
    }

    #[tokio::test]
    async fn test_runner_error_becomes_failed_record() {
        let tracker = ResourceTracker::new();
        tracker.track(EphemeralResource::namespace("gone"));
        let runner = FakeRunner::new().default_response(FakeResponse::spawn_failure());
        let records = tracker.cleanup_all(&runner, Duration::from_secs(1)).await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].deleted());
    }

    #[tokio::test]
    async fn test_concurrent_tracking() {
        let tracker = Arc::new(ResourceTracker::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker.track(EphemeralResource::pod(format!("p{}", i), "default"));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(tracker.len(), 16);
    }

    #[test]
    fn test_empty_summary() {
        assert!(CleanupSummary::default().is_clean());
        assert!(CleanupSummary::default().render().contains("no ephemeral"));
    }
}
