//! Probe results - the common row type every check produces.

use crate::classify::Classifier;
use crate::command::CommandOutcome;
use serde::{Deserialize, Serialize};

/// Status of one finding (stable ordering: Ok < Warning < Error)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Warning,
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Row key (node name, component, "m1 -> w1", ...)
    pub title: String,
    pub status: Status,
    pub body: String,
}

impl ProbeResult {
    pub fn new(title: impl Into<String>, status: Status, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status,
            body: body.into(),
        }
    }

    pub fn ok(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, Status::Ok, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, Status::Warning, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, Status::Error, body)
    }

    /// Classify an outcome into a row
    pub fn from_outcome(
        title: impl Into<String>,
        outcome: &CommandOutcome,
        classifier: &Classifier,
    ) -> Self {
        let verdict = classifier.classify(outcome);
        Self::new(title, verdict.status, verdict.body)
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// Worst status of a batch (Ok for an empty batch)
pub fn worst_status(results: &[ProbeResult]) -> Status {
    results
        .iter()
        .map(|r| r.status)
        .max()
        .unwrap_or(Status::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(Status::Error > Status::Warning);
        assert!(Status::Warning > Status::Ok);
    }

    #[test]
    fn test_worst_status() {
        let rows = vec![
            ProbeResult::ok("a", "fine"),
            ProbeResult::warning("b", "hmm"),
        ];
        assert_eq!(worst_status(&rows), Status::Warning);
        assert_eq!(worst_status(&[]), Status::Ok);
    }
}
