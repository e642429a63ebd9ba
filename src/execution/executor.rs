//! Command execution engine.
//!
//! The wait protocol is a small state machine driven by polling:
//!
//! ```text
//! Running ──exit──────────────────────────────▶ Exited
//!    │ deadline (SIGTERM)
//!    ▼
//! TimedOutGrace ──exit────────────────────────▶ Exited
//!    │ grace window expired (SIGKILL)
//!    ▼
//! TimedOutForce ──reaped──────────────────────▶ Exited
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::command::Command;
use super::drainer::DEFAULT_CHUNK_SIZE;
use super::process::ProcessHandle;
use super::result::CommandResult;
use super::sink::{SharedSink, TracingSink};
use crate::error::{IntegrityViolation, RunprocError};
use crate::Result;

/// Default time a terminated process gets before it is killed.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(1);

/// Default sleep between exit-status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default bound on joining each drainer thread.
pub const DEFAULT_DRAIN_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Tunables for the wait protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Time between SIGTERM and SIGKILL.
    pub grace_window: Duration,
    /// Sleep between exit-status polls.
    pub poll_interval: Duration,
    /// Bound on joining each drainer, and on reaping after SIGKILL.
    pub drain_join_timeout: Duration,
    /// Size of a single pipe read.
    pub chunk_size: usize,
    /// Timeout applied to commands that don't carry their own.
    pub default_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            grace_window: DEFAULT_GRACE_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_join_timeout: DEFAULT_DRAIN_JOIN_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            default_timeout: None,
        }
    }
}

impl ExecutorConfig {
    /// Set the grace window.
    pub fn with_grace_window(mut self, grace: Duration) -> Self {
        self.grace_window = grace;
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the drainer join bound.
    pub fn with_drain_join_timeout(mut self, bound: Duration) -> Self {
        self.drain_join_timeout = bound;
        self
    }
}

/// Where the wait protocol currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// The child is running and its deadline has not passed.
    Running,
    /// SIGTERM sent; waiting out the grace window.
    TimedOutGrace,
    /// SIGKILL sent; waiting to reap.
    TimedOutForce,
    /// Exit status obtained.
    Exited(i32),
}

impl WaitState {
    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WaitState::Exited(_))
    }
}

/// Runs commands through the spawn / wait / escalate / drain protocol.
#[derive(Clone)]
pub struct CommandExecutor {
    config: ExecutorConfig,
    sink: SharedSink,
}

impl CommandExecutor {
    /// Create an executor that echoes to `tracing`.
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replace the log sink.
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Spawn `command` and start draining its output.
    pub fn spawn(&self, command: &Command) -> Result<ProcessHandle> {
        ProcessHandle::spawn(command, &self.config, &self.sink)
    }

    /// Advance the wait protocol by one transition.
    pub fn step(
        &self,
        handle: &mut ProcessHandle,
        state: WaitState,
        timeout: Option<Duration>,
    ) -> Result<WaitState> {
        let next = match state {
            WaitState::Running => match timeout {
                None => WaitState::Exited(handle.wait_blocking()?),
                Some(timeout) => match handle.started_at().checked_add(timeout) {
                    // Beyond what `Instant` can represent; the deadline never comes.
                    None => WaitState::Exited(handle.wait_blocking()?),
                    Some(deadline) => match self.poll_until(handle, Some(deadline))? {
                        Some(code) => WaitState::Exited(code),
                        None => {
                            info!(pid = handle.pid(), ?timeout, "timeout expired, terminating");
                            handle.terminate();
                            WaitState::TimedOutGrace
                        }
                    },
                },
            },
            WaitState::TimedOutGrace => {
                let deadline = Instant::now().checked_add(self.config.grace_window);
                match self.poll_until(handle, deadline)? {
                    Some(code) => WaitState::Exited(code),
                    None => {
                        warn!(pid = handle.pid(), "still running after grace window, killing");
                        handle.kill();
                        WaitState::TimedOutForce
                    }
                }
            }
            WaitState::TimedOutForce => {
                let deadline = Instant::now().checked_add(self.config.drain_join_timeout);
                match self.poll_until(handle, deadline)? {
                    Some(code) => WaitState::Exited(code),
                    None => {
                        return Err(IntegrityViolation::Unreaped {
                            pid: handle.pid(),
                            command: handle.command().to_string(),
                        }
                        .into())
                    }
                }
            }
            exited @ WaitState::Exited(_) => exited,
        };

        debug!(pid = handle.pid(), from = ?state, to = ?next, "wait transition");
        Ok(next)
    }

    /// Drive `handle` to an exit status, escalating on timeout.
    pub fn wait(&self, handle: &mut ProcessHandle, timeout: Option<Duration>) -> Result<i32> {
        let mut state = WaitState::Running;
        loop {
            state = self.step(handle, state, timeout)?;
            if let WaitState::Exited(code) = state {
                return Ok(code);
            }
        }
    }

    /// Poll until the child exits or `deadline` passes. `None` never passes.
    fn poll_until(
        &self,
        handle: &mut ProcessHandle,
        deadline: Option<Instant>,
    ) -> Result<Option<i32>> {
        loop {
            if let Some(code) = handle.poll()? {
                return Ok(Some(code));
            }
            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.config.poll_interval.min(deadline - now)
                }
                None => self.config.poll_interval,
            };
            std::thread::sleep(pause);
        }
    }

    /// Execute the full protocol, returning the result whatever the exit status.
    pub fn execute(&self, command: &Command) -> Result<CommandResult> {
        let timeout = command.timeout.or(self.config.default_timeout);
        let mut handle = self.spawn(command)?;

        let outcome = match self.wait(&mut handle, timeout) {
            Ok(_) => {
                let duration = handle.elapsed();
                handle.into_result(duration)
            }
            Err(e) => Err(e),
        };

        if let Err(RunprocError::Integrity(violation)) = &outcome {
            error!(command = %command.command_line, "{}", violation);
        }
        outcome
    }

    /// Execute `command`, failing on non-zero exit unless it ignores status.
    pub fn run(&self, command: &Command) -> Result<CommandResult> {
        let result = self.execute(command)?;
        if !result.success() && !command.ignore_status {
            return Err(RunprocError::CommandFailed(Box::new(result)));
        }
        Ok(result)
    }

    /// Execute `command` and return only its exit status.
    pub fn system(&self, command: &Command) -> Result<i32> {
        self.run(command).map(|r| r.exit_status())
    }

    /// Execute `command` and return only its standard output.
    pub fn system_output(&self, command: &Command) -> Result<Vec<u8>> {
        self.run(command).map(CommandResult::into_stdout)
    }

    /// Run `command` on the blocking thread pool of the current tokio runtime.
    pub async fn run_async(&self, command: Command) -> Result<CommandResult> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.run(&command))
            .await
            .map_err(|e| RunprocError::TaskJoin(e.to_string()))?
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn build(
    command_line: &str,
    timeout: Option<Duration>,
    verbose: bool,
    ignore_status: bool,
) -> Command {
    Command::new(command_line)
        .maybe_timeout(timeout)
        .verbose(verbose)
        .ignore_status(ignore_status)
}

/// Run a command line, returning the full result.
///
/// Fails with [`RunprocError::CommandFailed`] on non-zero exit unless
/// `ignore_status` is set.
pub fn run(
    command_line: &str,
    timeout: Option<Duration>,
    verbose: bool,
    ignore_status: bool,
) -> Result<CommandResult> {
    CommandExecutor::default().run(&build(command_line, timeout, verbose, ignore_status))
}

/// Run a command line, returning its exit status.
pub fn system(
    command_line: &str,
    timeout: Option<Duration>,
    verbose: bool,
    ignore_status: bool,
) -> Result<i32> {
    run(command_line, timeout, verbose, ignore_status).map(|r| r.exit_status())
}

/// Run a command line, returning its standard output.
pub fn system_output(
    command_line: &str,
    timeout: Option<Duration>,
    verbose: bool,
    ignore_status: bool,
) -> Result<Vec<u8>> {
    run(command_line, timeout, verbose, ignore_status).map(CommandResult::into_stdout)
}

/// Async variant of [`run`] for callers inside a tokio runtime.
pub async fn run_async(command: Command) -> Result<CommandResult> {
    CommandExecutor::default().run_async(command).await
}
