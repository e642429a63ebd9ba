//! Execution result types.

use std::fmt;
use std::time::Duration;

/// Immutable outcome of one command execution.
///
/// Built exactly once, at the end of the wait protocol, after the child has
/// been reaped and both output streams have been drained. The exit status is
/// therefore always known; children killed by a signal report the negated
/// signal number (`-15` for SIGTERM, `-9` for SIGKILL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    command: String,
    exit_status: i32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    duration: Duration,
}

impl CommandResult {
    /// Create a new command result.
    pub fn new(
        command: impl Into<String>,
        exit_status: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        duration: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            exit_status,
            stdout,
            stderr,
            duration,
        }
    }

    /// The command line as given by the caller.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Exit status of the process.
    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// Everything the process wrote to standard output.
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Everything the process wrote to standard error.
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    /// Wall-clock time from spawn to exit.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Standard output decoded as UTF-8 (lossy).
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error decoded as UTF-8 (lossy).
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Check if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// Consume the result, keeping only standard output.
    pub fn into_stdout(self) -> Vec<u8> {
        self.stdout
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        writeln!(f, "Exit status: {}", self.exit_status)?;
        writeln!(f, "Duration: {:.3}s", self.duration.as_secs_f64())?;
        writeln!(f, "Stdout:\n{}", String::from_utf8_lossy(&self.stdout))?;
        writeln!(f, "Stderr:\n{}", String::from_utf8_lossy(&self.stderr))
    }
}

/// Which pipe of the child a piece of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl StreamKind {
    /// Lowercase stream name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
