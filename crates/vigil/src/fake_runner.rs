//! Fake command runner for deterministic testing.
//!
//! Provides scripted outcomes without running any process.
//!
//! ```rust,ignore
//! let fake = FakeRunner::new()
//!     .on("ping -c 1 w1", FakeResponse::ok("1 packets transmitted, 1 received"))
//!     .on("ping -c 1 m2", FakeResponse::ok("1 packets transmitted, 0 received"));
//! ```

use crate::runner::CommandRunner;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use vigil_shared::{Command, CommandOutcome, Result, VigilError};

/// Scripted reaction to a command
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Output {
        exit_code: i32,
        stdout: String,
        stderr: String,
        delay: Option<Duration>,
    },
    TimedOut,
    SpawnFailure,
}

impl FakeResponse {
    pub fn ok(stdout: &str) -> Self {
        Self::Output {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            delay: None,
        }
    }

    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Self::Output {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            delay: None,
        }
    }

    pub fn output(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self::Output {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            delay: None,
        }
    }

    pub fn timed_out() -> Self {
        Self::TimedOut
    }

    pub fn spawn_failure() -> Self {
        Self::SpawnFailure
    }

    /// Sleep before answering (only affects `Output`)
    pub fn delayed(self, by: Duration) -> Self {
        match self {
            Self::Output {
                exit_code,
                stdout,
                stderr,
                ..
            } => Self::Output {
                exit_code,
                stdout,
                stderr,
                delay: Some(by),
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Contains(String),
}

impl Matcher {
    fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Exact(s) => text == s,
            Matcher::Contains(s) => text.contains(s.as_str()),
        }
    }
}

/// Fake runner; the first matching rule wins, in the order rules were added
pub struct FakeRunner {
    rules: Vec<(Matcher, FakeResponse)>,
    default_response: FakeResponse,
    calls: Mutex<Vec<Command>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRunner {
    /// Every command succeeds with `ok` unless a rule says otherwise
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_response: FakeResponse::ok("ok"),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Respond to commands containing `pattern`
    pub fn on(mut self, pattern: &str, response: FakeResponse) -> Self {
        self.rules
            .push((Matcher::Contains(pattern.to_string()), response));
        self
    }

    /// Respond to commands equal to `text`
    pub fn on_exact(mut self, text: &str, response: FakeResponse) -> Self {
        self.rules.push((Matcher::Exact(text.to_string()), response));
        self
    }

    pub fn default_response(mut self, response: FakeResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Every command received, in arrival order
    pub fn calls(&self) -> Vec<Command> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of received commands containing `pattern`
    pub fn call_count(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.text.contains(pattern))
            .count()
    }

    /// Highest number of commands that were in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn response_for(&self, text: &str) -> FakeResponse {
        self.rules
            .iter()
            .find(|(m, _)| m.matches(text))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| self.default_response.clone())
    }
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &Command) -> Result<CommandOutcome> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = match self.response_for(&command.text) {
            FakeResponse::Output {
                exit_code,
                stdout,
                stderr,
                delay,
            } => {
                let delay_ms = match delay {
                    Some(d) => {
                        tokio::time::sleep(d).await;
                        d.as_millis() as u64
                    }
                    None => 0,
                };
                Ok(CommandOutcome::completed(
                    command, exit_code, stdout, stderr, delay_ms,
                ))
            }
            FakeResponse::TimedOut => Ok(CommandOutcome::expired(
                command,
                command.timeout.as_millis() as u64,
            )),
            FakeResponse::SpawnFailure => Err(VigilError::Infrastructure(format!(
                "cannot spawn '{}'",
                command.text
            ))),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
