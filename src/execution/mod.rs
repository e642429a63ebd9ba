//! Command execution engine.
//!
//! This module provides command execution capabilities:
//! - Concurrent capture of stdout and stderr on dedicated drainer threads
//! - Timeout handling with SIGTERM, then SIGKILL after a grace window
//! - Thread-safe access to partial output while the command runs
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use runproc::execution::{run, Command, CommandExecutor};
//!
//! // Simple one-shot execution
//! let result = run("echo hello", None, true, false).unwrap();
//! println!("Output: {}", result.stdout_text());
//!
//! // Command with options
//! let cmd = Command::new("make check")
//!     .timeout(Duration::from_secs(60))
//!     .ignore_status(true);
//! let result = CommandExecutor::default().run(&cmd).unwrap();
//! println!("{result}");
//! ```

mod buffer;
mod command;
mod drainer;
mod executor;
mod process;
mod result;
mod sink;

pub use buffer::OutputBuffer;
pub use command::Command;
pub use drainer::{drain, LineEcho, StreamDrainer, DEFAULT_CHUNK_SIZE};
pub use executor::{
    run, run_async, system, system_output, CommandExecutor, ExecutorConfig, WaitState,
    DEFAULT_DRAIN_JOIN_TIMEOUT, DEFAULT_GRACE_WINDOW, DEFAULT_POLL_INTERVAL,
};
pub use process::ProcessHandle;
pub use result::{CommandResult, StreamKind};
pub use sink::{LogSink, RecordingSink, SharedSink, TracingSink};
