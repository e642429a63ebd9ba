//! Command building and representation.

use std::time::Duration;

use crate::error::RunprocError;
use crate::Result;

/// A command line to execute, with its execution options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The command line to execute.
    pub command_line: String,
    /// Deadline measured from spawn. `None` waits indefinitely; zero
    /// terminates immediately unless the process has already exited.
    pub timeout: Option<Duration>,
    /// Whether to log the launch and echo captured lines.
    pub verbose: bool,
    /// Whether a non-zero exit status is returned as a normal result.
    pub ignore_status: bool,
}

impl Command {
    /// Create a new command with the given command line.
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            timeout: None,
            verbose: true,
            ignore_status: false,
        }
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set or clear the execution timeout.
    pub fn maybe_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout = duration;
        self
    }

    /// Set whether to log the command and its output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set whether a non-zero exit status is tolerated.
    pub fn ignore_status(mut self, ignore: bool) -> Self {
        self.ignore_status = ignore;
        self
    }

    /// Split the command line into program and arguments.
    ///
    /// Follows POSIX shell quoting: single and double quotes group words,
    /// backslash escapes the next character. No expansion is performed.
    pub fn argv(&self) -> Result<Vec<String>> {
        let words = shlex::split(&self.command_line).ok_or_else(|| {
            RunprocError::InvalidCommand(format!(
                "unbalanced quoting in '{}'",
                self.command_line
            ))
        })?;

        if words.is_empty() {
            return Err(RunprocError::InvalidCommand("empty command line".into()));
        }

        Ok(words)
    }
}

impl Default for Command {
    fn default() -> Self {
        Self::new("")
    }
}

impl From<&str> for Command {
    fn from(command_line: &str) -> Self {
        Self::new(command_line)
    }
}
