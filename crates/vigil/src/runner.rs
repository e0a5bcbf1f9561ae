//! Command runner - the probe executor boundary.
//!
//! A runner executes one `Command` with its timeout and returns exactly one
//! `CommandOutcome`. A command that runs and fails is a normal outcome; only
//! the inability to start a process at all is an `Err`.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};
use vigil_shared::{Command, CommandOutcome, Result, VigilError};

/// Maximum output length kept per stream
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Trait abstraction for command execution
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion or until its timeout
    async fn run(&self, command: &Command) -> Result<CommandOutcome>;
}

#[async_trait]
impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    async fn run(&self, command: &Command) -> Result<CommandOutcome> {
        (**self).run(command).await
    }
}

// ============================================================================
// Shell Runner (Production)
// ============================================================================

/// Runs command text through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &Command) -> Result<CommandOutcome> {
        let start = Instant::now();
        debug!("  Executing: {}", command.text);

        let mut process = tokio::process::Command::new(&self.shell);
        process
            .arg("-c")
            .arg(&command.text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so a timeout can take down the whole pipeline
        #[cfg(unix)]
        process.process_group(0);

        let child = process.spawn().map_err(|e| {
            VigilError::Infrastructure(format!("cannot spawn '{}': {}", self.shell, e))
        })?;
        let pid = child.id();

        // Dropping the wait future on timeout kills the shell itself
        match timeout(command.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                let exit_code = output.status.code().unwrap_or(-1);
                if exit_code != 0 {
                    debug!("  Command exited {}: {}", exit_code, command.text);
                }
                Ok(CommandOutcome::completed(
                    command,
                    exit_code,
                    truncate_output(&output.stdout),
                    truncate_output(&output.stderr),
                    duration_ms,
                ))
            }
            Ok(Err(e)) => {
                warn!("  Lost output of '{}': {}", command.text, e);
                Ok(CommandOutcome::not_run(
                    command,
                    format!("failed to collect output: {}", e),
                ))
            }
            Err(_) => {
                warn!("  Command timed out after {:?}: {}", command.timeout, command.text);
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                Ok(CommandOutcome::expired(
                    command,
                    start.elapsed().as_millis() as u64,
                ))
            }
        }
    }
}

/// SIGKILL every process left in the command's group
#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    // SAFETY: killpg only sends a signal; the group id came from our own spawn
    let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "  killpg({}) failed: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

/// Lossy UTF-8 decode, cut at `MAX_OUTPUT_BYTES` on a char boundary
fn truncate_output(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.into_owned();
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n... (truncated)", &text[..cut])
}

// ============================================================================
// Throttled Runner
// ============================================================================

/// Bounds the number of commands executing at once across all callers
pub struct ThrottledRunner<R> {
    inner: R,
    permits: Arc<Semaphore>,
}

impl<R: CommandRunner> ThrottledRunner<R> {
    pub fn new(inner: R, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl<R: CommandRunner> CommandRunner for ThrottledRunner<R> {
    async fn run(&self, command: &Command) -> Result<CommandOutcome> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| VigilError::Infrastructure("command pool closed".to_string()))?;
        self.inner.run(command).await
    }
}
