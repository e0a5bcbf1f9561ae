//! Commands and their outcomes.
//!
//! A `Command` is a value object: text, timeout and optional node target.
//! Each execution produces exactly one `CommandOutcome`, also for failures.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Marker placed at the start of `stderr` for commands that hit their deadline
pub const TIMED_OUT_MARKER: &str = "TimedOut";

/// Cluster CLIs print this and still exit 0 on some failures
pub const ERROR_MARKER: &str = "Error";

/// Default command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A textual invocation scoped to an optional node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub text: String,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    pub target: Option<String>,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timeout: DEFAULT_TIMEOUT,
            target: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(mut self, node: impl Into<String>) -> Self {
        self.target = Some(node.into());
        self
    }
}

/// Why an outcome is not a success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The command ran and exited non-zero
    NonZeroExit(i32),
    /// The command was killed at its deadline
    TimedOut,
    /// Exit 0, but stdout carries the error marker
    ErrorMarker,
}

/// Structured result of running one command.
///
/// Built only through the constructors below and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    command: String,
    target: Option<String>,
    success: bool,
    stdout: String,
    stderr: String,
    exit_code: i32,
    duration_ms: u64,
    timed_out: bool,
}

impl CommandOutcome {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Exited 0 within its timeout
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// `-1` on timeout, `-2` when never run
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Outcome of a process that ran to completion
    pub fn completed(
        command: &Command,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            command: command.text.clone(),
            target: command.target.clone(),
            success: exit_code == 0,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            duration_ms,
            timed_out: false,
        }
    }

    /// Outcome of a process killed at its deadline
    pub fn expired(command: &Command, duration_ms: u64) -> Self {
        Self {
            command: command.text.clone(),
            target: command.target.clone(),
            success: false,
            stdout: String::new(),
            stderr: format!(
                "{} after {}ms",
                TIMED_OUT_MARKER,
                command.timeout.as_millis()
            ),
            exit_code: -1,
            duration_ms,
            timed_out: true,
        }
    }

    /// Outcome for a command that could not be executed at all
    pub fn not_run(command: &Command, reason: impl Into<String>) -> Self {
        Self {
            command: command.text.clone(),
            target: command.target.clone(),
            success: false,
            stdout: String::new(),
            stderr: reason.into(),
            exit_code: -2,
            duration_ms: 0,
            timed_out: false,
        }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        if self.timed_out {
            Some(FailureKind::TimedOut)
        } else if !self.success {
            Some(FailureKind::NonZeroExit(self.exit_code))
        } else if self.stdout.contains(ERROR_MARKER) {
            Some(FailureKind::ErrorMarker)
        } else {
            None
        }
    }

    /// stdout and stderr joined, trimmed
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (false, false) => format!("{}\n{}", stdout, stderr),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (true, true) => String::new(),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let cmd = Command::new("ping -c 1 w1")
            .timeout(Duration::from_secs(5))
            .target("m1");
        assert_eq!(cmd.timeout, Duration::from_secs(5));
        assert_eq!(cmd.target.as_deref(), Some("m1"));
    }

    #[test]
    fn test_timed_out_is_distinct_from_non_zero() {
        let cmd = Command::new("sleep 10").timeout(Duration::from_millis(100));
        let slow = CommandOutcome::expired(&cmd, 100);
        let broken = CommandOutcome::completed(&cmd, 1, "", "boom", 3);

        assert!(!slow.success);
        assert!(slow.stderr.starts_with(TIMED_OUT_MARKER));
        assert_eq!(slow.failure(), Some(FailureKind::TimedOut));
        assert_eq!(broken.failure(), Some(FailureKind::NonZeroExit(1)));
    }

    #[test]
    fn test_outcome_is_read_through_accessors() {
        let cmd = Command::new("oc adm top node w1").target("w1");
        let out = CommandOutcome::completed(&cmd, 0, "w1 12% 40%", "", 87);
        assert_eq!(out.command(), "oc adm top node w1");
        assert_eq!(out.target(), Some("w1"));
        assert!(out.success());
        assert_eq!(out.stdout(), "w1 12% 40%");
        assert_eq!(out.exit_code(), 0);
        assert_eq!(out.duration_ms(), 87);
        assert!(!out.timed_out());

        let never = CommandOutcome::not_run(&cmd, "spawn failed");
        assert_eq!(never.exit_code(), -2);
        assert_eq!(never.stderr(), "spawn failed");

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["stdout"], "w1 12% 40%");
    }

    #[test]
    fn test_error_marker_on_clean_exit() {
        let cmd = Command::new("oc get pods");
        let out = CommandOutcome::completed(&cmd, 0, "Error from server (NotFound)", "", 4);
        assert!(out.success);
        assert_eq!(out.failure(), Some(FailureKind::ErrorMarker));
        let fine = CommandOutcome::completed(&cmd, 0, "pod-a Running", "", 4);
        assert_eq!(fine.failure(), None);
    }

    #[test]
    fn test_combined_output() {
        let cmd = Command::new("x");
        let out = CommandOutcome::completed(&cmd, 0, " a \n", "", 1);
        assert_eq!(out.combined_output(), "a");
        let out = CommandOutcome::completed(&cmd, 1, "a", "b", 1);
        assert_eq!(out.combined_output(), "a\nb");
    }
}
