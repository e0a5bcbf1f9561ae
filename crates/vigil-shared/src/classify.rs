//! Outcome classifiers.
//!
//! Remote tools signal failure in different ways, so every probe names the
//! classifier that turns its command outcome into a status. The matching
//! rule of each variant is part of that probe's contract.

use crate::command::{CommandOutcome, ERROR_MARKER};
use crate::result::Status;
use once_cell::sync::Lazy;
use regex::Regex;

static PACKETS_RECEIVED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s+(?:packets\s+)?received").expect("static regex")
});

const NO_RESOURCES: &str = "No resources found";

/// Classified status and display body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: Status,
    pub body: String,
}

impl Verdict {
    pub fn new(status: Status, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Rule used to classify one kind of command
#[derive(Debug, Clone)]
pub enum Classifier {
    /// Ok iff the command exited 0, printed something, and stdout carries
    /// no `Error` marker.
    ExitStatus,
    /// Like `ExitStatus`, but empty output or "No resources found" is a
    /// Warning instead of an Error.
    WarnOnEmpty,
    /// Ok iff stdout or stderr contains the needle. Exit code ignored.
    Contains(String),
    /// Ok iff the output reports at least one received packet
    /// (`1 received`, `1 packets received`). Exit code ignored, since
    /// debug wrappers exit non-zero for unrelated reasons.
    PacketsReceived,
    /// Ok iff the command exited 0 and stdout is a single integer.
    Numeric,
    /// Caller supplied rule
    Custom(fn(&CommandOutcome) -> Verdict),
}

impl Classifier {
    pub fn classify(&self, outcome: &CommandOutcome) -> Verdict {
        if outcome.timed_out() {
            return Verdict::new(Status::Error, format!("[timed out] {}", outcome.stderr().trim()));
        }

        match self {
            Self::ExitStatus => classify_exit_status(outcome, Status::Error),
            Self::WarnOnEmpty => classify_exit_status(outcome, Status::Warning),
            Self::Contains(needle) => {
                let output = outcome.combined_output();
                if output.contains(needle.as_str()) {
                    Verdict::new(Status::Ok, outcome.stdout().trim())
                } else {
                    Verdict::new(Status::Error, failure_body(outcome))
                }
            }
            Self::PacketsReceived => match packets_received(&outcome.combined_output()) {
                Some(n) if n > 0 => Verdict::new(Status::Ok, "reachable"),
                _ => Verdict::new(Status::Error, "unreachable"),
            },
            Self::Numeric => {
                if !outcome.success() {
                    return Verdict::new(Status::Error, failure_body(outcome));
                }
                let value = outcome.stdout().trim();
                if value.parse::<u64>().is_ok() {
                    Verdict::new(Status::Ok, value)
                } else {
                    Verdict::new(Status::Error, format!("unexpected output: {}", value))
                }
            }
            Self::Custom(rule) => rule(outcome),
        }
    }
}

fn classify_exit_status(outcome: &CommandOutcome, on_empty: Status) -> Verdict {
    if !outcome.success() {
        return Verdict::new(Status::Error, failure_body(outcome));
    }

    let stdout = outcome.stdout().trim();
    if stdout.contains(NO_RESOURCES) || outcome.stderr().contains(NO_RESOURCES) {
        return Verdict::new(on_empty, NO_RESOURCES);
    }
    if stdout.is_empty() {
        return Verdict::new(on_empty, "no output");
    }
    if stdout.contains(ERROR_MARKER) {
        return Verdict::new(Status::Error, stdout);
    }
    Verdict::new(Status::Ok, stdout)
}

fn failure_body(outcome: &CommandOutcome) -> String {
    let output = outcome.combined_output();
    if output.is_empty() {
        format!("exit code {}", outcome.exit_code())
    } else {
        output
    }
}

/// Number of received packets reported by ping, if any line says so
pub fn packets_received(output: &str) -> Option<u32> {
    PACKETS_RECEIVED
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use std::time::Duration;

    fn outcome(exit: i32, stdout: &str, stderr: &str) -> CommandOutcome {
        CommandOutcome::completed(&Command::new("test"), exit, stdout, stderr, 1)
    }

    #[test]
    fn test_exit_status_rules() {
        let c = Classifier::ExitStatus;
        assert_eq!(c.classify(&outcome(0, "HEALTH_OK\n", "")).status, Status::Ok);
        assert_eq!(c.classify(&outcome(0, "", "")).status, Status::Error);
        assert_eq!(c.classify(&outcome(0, "Error from server", "")).status, Status::Error);
        let v = c.classify(&outcome(1, "", "forbidden"));
        assert_eq!(v.status, Status::Error);
        assert_eq!(v.body, "forbidden");
        assert_eq!(c.classify(&outcome(2, "", "")).body, "exit code 2");
    }

    #[test]
    fn test_warn_on_empty() {
        let c = Classifier::WarnOnEmpty;
        let v = c.classify(&outcome(0, "", "No resources found in 3scale namespace."));
        assert_eq!(v.status, Status::Warning);
        assert_eq!(c.classify(&outcome(0, "NAME READY\npod 1/1", "")).status, Status::Ok);
    }

    #[test]
    fn test_packets_received_ignores_exit_code() {
        let c = Classifier::PacketsReceived;
        let linux = "1 packets transmitted, 1 received, 0% packet loss, time 0ms";
        assert_eq!(c.classify(&outcome(1, linux, "Removing debug pod ...")).status, Status::Ok);
        let bsd = "1 packets transmitted, 1 packets received, 0.0% packet loss";
        assert_eq!(c.classify(&outcome(0, bsd, "")).status, Status::Ok);
        let lost = "1 packets transmitted, 0 received, 100% packet loss";
        assert_eq!(c.classify(&outcome(0, lost, "")).status, Status::Error);
        assert_eq!(c.classify(&outcome(0, "", "")).body, "unreachable");
    }

    #[test]
    fn test_numeric() {
        let c = Classifier::Numeric;
        assert_eq!(c.classify(&outcome(0, "1500\n", "")).body, "1500");
        assert_eq!(c.classify(&outcome(0, "cat: no such file", "")).status, Status::Error);
    }

    #[test]
    fn test_contains() {
        let c = Classifier::Contains("synchronized: yes".to_string());
        assert_eq!(c.classify(&outcome(0, "System clock synchronized: yes", "")).status, Status::Ok);
        assert_eq!(c.classify(&outcome(0, "System clock synchronized: no", "")).status, Status::Error);
    }

    #[test]
    fn test_timeout_always_error() {
        let cmd = Command::new("ping").timeout(Duration::from_millis(50));
        let v = Classifier::PacketsReceived.classify(&CommandOutcome::expired(&cmd, 50));
        assert_eq!(v.status, Status::Error);
        assert!(v.body.starts_with("[timed out] TimedOut"));
    }

    #[test]
    fn test_custom() {
        fn always_warn(_: &CommandOutcome) -> Verdict {
            Verdict {
                status: Status::Warning,
                body: "custom".to_string(),
            }
        }
        let c = Classifier::Custom(always_warn);
        assert_eq!(c.classify(&outcome(0, "x", "")).status, Status::Warning);
    }
}
