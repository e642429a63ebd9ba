//! Error types for runproc.

use std::path::PathBuf;

use thiserror::Error;

use crate::execution::{CommandResult, StreamKind};

/// Main error type for runproc operations.
#[derive(Error, Debug)]
pub enum RunprocError {
    /// A bare command name could not be resolved on the search path.
    #[error("command '{command}' could not be found in any of the PATH dirs: {paths:?}")]
    CommandNotFound {
        command: String,
        paths: Vec<PathBuf>,
    },

    /// The command exited with a non-zero status.
    ///
    /// Carries the full result so captured output can be inspected.
    #[error("command '{}' failed with exit status {}", .0.command(), .0.exit_status())]
    CommandFailed(Box<CommandResult>),

    /// Fatal internal-consistency failure. See [`IntegrityViolation`].
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityViolation),

    /// The command line could not be split into a program and arguments.
    #[error("invalid command line: {0}")]
    InvalidCommand(String),

    /// The OS refused to start the program.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task could not be joined by the async runtime.
    #[error("task join error: {0}")]
    TaskJoin(String),
}

impl RunprocError {
    /// The captured result, if this is a [`RunprocError::CommandFailed`].
    pub fn result(&self) -> Option<&CommandResult> {
        match self {
            Self::CommandFailed(result) => Some(result),
            _ => None,
        }
    }
}

/// A child is still unreaped, or one of its pipes is still held open.
///
/// Never part of the normal contract: this points at the host environment
/// (e.g. a grandchild that inherited a pipe) and the captured output cannot
/// be trusted as complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// No exit status after the full escalation sequence.
    #[error("zombie process {pid} ('{command}'): no exit status after kill")]
    Unreaped { pid: u32, command: String },

    /// A drainer thread did not reach end-of-stream within its join bound.
    #[error("{stream} drainer for process {pid} is still alive")]
    DrainerStuck { pid: u32, stream: StreamKind },
}

/// Convenience Result type for runproc operations.
pub type Result<T> = std::result::Result<T, RunprocError>;
