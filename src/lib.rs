//! # runproc
//!
//! Run external commands and capture what they do.
//!
//! A command line is split with POSIX shell quoting rules and spawned with
//! its stdout and stderr piped. Each pipe is read by its own drainer thread
//! while the caller waits, so a chatty child can never deadlock on a full
//! pipe. An optional timeout terminates the child, escalating from SIGTERM
//! to SIGKILL after a grace window. The outcome is a single immutable
//! [`CommandResult`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use runproc::{Command, CommandExecutor, RunprocError};
//!
//! fn main() -> runproc::Result<()> {
//!     runproc::logging::try_init().ok();
//!
//!     let result = runproc::run("echo hello", None, true, false)?;
//!     assert_eq!(result.stdout(), b"hello\n");
//!
//!     let executor = CommandExecutor::default();
//!     match executor.run(&Command::new("make check").timeout(Duration::from_secs(60))) {
//!         Ok(result) => println!("{result}"),
//!         Err(RunprocError::CommandFailed(result)) => eprintln!("{}", result.stderr_text()),
//!         Err(e) => return Err(e),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod search;

// Re-export commonly used types
pub use error::{IntegrityViolation, Result, RunprocError};
pub use execution::{
    run, run_async, system, system_output, Command, CommandExecutor, CommandResult,
    ExecutorConfig, LogSink, OutputBuffer, ProcessHandle,
};
pub use search::find_command;
