//! Log sink capability handed to the executor and drainers.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::Level;

/// Destination for the verbose echo of a running command.
///
/// The executor calls it once when a command is launched, and drainers call
/// it once per captured line. Implementations must be cheap and must not
/// block for long: they run on the drainer threads.
pub trait LogSink: Send + Sync {
    /// Record one message at the given level.
    fn log(&self, level: Level, message: &str);
}

/// Sink that forwards every message to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str) {
        // `tracing` macros need the level as a constant.
        match level {
            Level::ERROR => tracing::error!(target: "runproc::output", "{}", message),
            Level::WARN => tracing::warn!(target: "runproc::output", "{}", message),
            Level::INFO => tracing::info!(target: "runproc::output", "{}", message),
            Level::DEBUG => tracing::debug!(target: "runproc::output", "{}", message),
            _ => tracing::trace!(target: "runproc::output", "{}", message),
        }
    }
}

/// Sink that keeps every message in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    entries: Arc<Mutex<Vec<(Level, String)>>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages recorded so far, in arrival order.
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages recorded at the given level.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: Level, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn LogSink>;
