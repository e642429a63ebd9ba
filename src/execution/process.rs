//! Live child process with its two output drainers.

use std::process::{Child, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, Level};

use super::buffer::OutputBuffer;
use super::command::Command;
use super::drainer::StreamDrainer;
use super::executor::{CommandExecutor, ExecutorConfig};
use super::result::{CommandResult, StreamKind};
use super::sink::SharedSink;
use crate::error::{IntegrityViolation, RunprocError};
use crate::Result;

/// A spawned child whose stdout and stderr are being captured.
///
/// Both drainers are started inside [`ProcessHandle::spawn`], before any
/// caller can wait on the child, so neither pipe can fill up unread.
pub struct ProcessHandle {
    command: String,
    child: Child,
    pid: u32,
    started_at: Instant,
    exit_status: Option<i32>,
    escalated: bool,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
    drainers: Vec<StreamDrainer>,
    config: ExecutorConfig,
}

impl ProcessHandle {
    /// Spawn `command` with both output streams piped and drained.
    pub fn spawn(command: &Command, config: &ExecutorConfig, sink: &SharedSink) -> Result<Self> {
        let argv = command.argv()?;

        if command.verbose {
            sink.log(Level::INFO, &format!("Running '{}'", command.command_line));
        }

        let child = std::process::Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunprocError::Spawn {
                command: command.command_line.clone(),
                source,
            })?;

        let started_at = Instant::now();
        let pid = child.id();
        debug!(pid, command = %command.command_line, "process spawned");

        let mut handle = Self {
            command: command.command_line.clone(),
            child,
            pid,
            started_at,
            exit_status: None,
            escalated: false,
            stdout: OutputBuffer::new(),
            stderr: OutputBuffer::new(),
            drainers: Vec::with_capacity(2),
            config: *config,
        };

        // On any error below the handle is dropped, which kills and reaps the child.
        let echo = command.verbose.then(|| sink.clone());
        let stdout_pipe = handle.child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr_pipe = handle.child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        handle.drainers.push(StreamDrainer::spawn(
            stdout_pipe,
            StreamKind::Stdout,
            handle.stdout.clone(),
            echo.clone(),
            config.chunk_size,
            format!("{}-stdout", handle.command),
        )?);
        handle.drainers.push(StreamDrainer::spawn(
            stderr_pipe,
            StreamKind::Stderr,
            handle.stderr.clone(),
            echo,
            config.chunk_size,
            format!("{}-stderr", handle.command),
        )?);

        Ok(handle)
    }

    /// OS process id of the child.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// The command line this process was started from.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Instant the child was spawned.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Wall-clock time since spawn.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Standard output captured so far.
    pub fn stdout(&self) -> Vec<u8> {
        self.stdout.snapshot()
    }

    /// Standard error captured so far.
    pub fn stderr(&self) -> Vec<u8> {
        self.stderr.snapshot()
    }

    /// Exit status, if the child has already been reaped.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    /// Non-blocking check for the exit status.
    pub fn poll(&mut self) -> Result<Option<i32>> {
        if self.exit_status.is_none() {
            if let Some(status) = self.child.try_wait()? {
                self.record_exit(status);
            }
        }
        Ok(self.exit_status)
    }

    /// Block until the child exits.
    pub fn wait_blocking(&mut self) -> Result<i32> {
        if let Some(code) = self.exit_status {
            return Ok(code);
        }
        let status = self.child.wait()?;
        Ok(self.record_exit(status))
    }

    /// Drive the child to an exit status with the configuration it was
    /// spawned with, escalating from SIGTERM to SIGKILL once `timeout` expires.
    ///
    /// See [`CommandExecutor::wait`].
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<i32> {
        CommandExecutor::new(self.config).wait(self, timeout)
    }

    fn record_exit(&mut self, status: ExitStatus) -> i32 {
        let code = exit_code(status);
        debug!(pid = self.pid, exit_status = code, "process exited");
        self.exit_status = Some(code);
        code
    }

    /// Ask the child to exit (SIGTERM on Unix).
    ///
    /// A no-op once the child has been reaped; delivery failures are ignored.
    pub fn terminate(&mut self) {
        #[cfg(unix)]
        self.send_signal(libc::SIGTERM);

        #[cfg(not(unix))]
        self.force_kill();
    }

    /// Forcefully kill the child (SIGKILL on Unix).
    ///
    /// A no-op once the child has been reaped; delivery failures are ignored.
    pub fn kill(&mut self) {
        self.escalated = true;

        #[cfg(unix)]
        self.send_signal(libc::SIGKILL);

        #[cfg(not(unix))]
        self.force_kill();
    }

    #[cfg(unix)]
    fn send_signal(&self, signal: libc::c_int) {
        // The child is not reaped yet, so its pid cannot have been reused.
        if self.exit_status.is_some() {
            return;
        }

        info!(pid = self.pid, signal, "sending signal");
        // SAFETY: kill(2) takes plain integers and has no memory-safety requirements.
        let rc = unsafe { libc::kill(self.pid as libc::pid_t, signal) };
        if rc != 0 {
            debug!(
                pid = self.pid,
                signal,
                "signal not delivered: {}",
                std::io::Error::last_os_error()
            );
        }
    }

    #[cfg(not(unix))]
    fn force_kill(&mut self) {
        if self.exit_status.is_some() {
            return;
        }
        if let Err(e) = self.child.kill() {
            debug!(pid = self.pid, "kill not delivered: {}", e);
        }
    }

    /// Join both drainers, each bounded by the configured join timeout.
    pub fn join_drainers(&mut self) -> std::result::Result<(), IntegrityViolation> {
        for drainer in std::mem::take(&mut self.drainers) {
            let stream = drainer.kind();
            if !drainer.join_within(self.config.drain_join_timeout, self.config.poll_interval) {
                return Err(IntegrityViolation::DrainerStuck {
                    pid: self.pid,
                    stream,
                });
            }
        }
        Ok(())
    }

    /// Tear the handle down into the final result.
    ///
    /// Joins the drainers, checks that an exit status was obtained, and
    /// snapshots both buffers. The pipes were closed by the drainers at
    /// end-of-stream.
    pub fn into_result(mut self, duration: Duration) -> Result<CommandResult> {
        self.join_drainers()?;

        let exit_status = self.exit_status.ok_or_else(|| IntegrityViolation::Unreaped {
            pid: self.pid,
            command: self.command.clone(),
        })?;

        Ok(CommandResult::new(
            self.command.clone(),
            exit_status,
            self.stdout.snapshot(),
            self.stderr.snapshot(),
            duration,
        ))
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.exit_status.is_some() {
            return;
        }
        // Dropped mid-protocol: don't leave a zombie behind. After a failed
        // escalation a blocking wait could hang, so only reap opportunistically.
        let _ = self.child.kill();
        if self.escalated {
            let _ = self.child.try_wait();
        } else {
            let _ = self.child.wait();
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .field("exit_status", &self.exit_status)
            .finish_non_exhaustive()
    }
}

fn missing_pipe(stream: &str) -> RunprocError {
    RunprocError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("child {stream} was not piped"),
    ))
}

/// Integer exit status; signal deaths map to the negated signal number.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}
