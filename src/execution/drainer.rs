//! Pipe drainers.
//!
//! Each child stream gets its own thread that reads the pipe until
//! end-of-stream. Without a dedicated reader per stream a child that fills
//! the stderr pipe blocks forever while the parent waits on stdout.

use std::io::{ErrorKind, Read};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace, warn, Level};

use super::buffer::OutputBuffer;
use super::result::StreamKind;
use super::sink::SharedSink;

/// Default size of a single pipe read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Line-oriented echo of a stream to a log sink.
///
/// Complete lines are emitted as soon as their newline arrives; a trailing
/// partial line waits for the next chunk or for [`LineEcho::finish`].
pub struct LineEcho {
    kind: StreamKind,
    sink: SharedSink,
    pending: Vec<u8>,
}

impl LineEcho {
    /// Create an echo for one stream.
    pub fn new(kind: StreamKind, sink: SharedSink) -> Self {
        Self {
            kind,
            sink,
            pending: Vec::new(),
        }
    }

    /// Feed a chunk, emitting every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return;
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        for line in complete[..complete.len() - 1].split(|&b| b == b'\n') {
            self.emit(line);
        }
    }

    /// Emit whatever partial line is still pending.
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&line);
        }
    }

    fn emit(&self, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let message = format!("[{}] {}", self.kind, String::from_utf8_lossy(line));
        self.sink.log(Level::DEBUG, &message);
    }
}

/// Read `reader` to end-of-stream, appending every chunk to `buffer`.
///
/// Interrupted reads are retried; any other error stops the drain and keeps
/// what was captured up to that point.
pub fn drain<R: Read>(
    mut reader: R,
    kind: StreamKind,
    buffer: &OutputBuffer,
    mut echo: Option<LineEcho>,
    chunk_size: usize,
) {
    let mut chunk = vec![0u8; chunk_size.max(1)];

    loop {
        match reader.read(&mut chunk) {
            Ok(0) => {
                debug!(stream = %kind, "drainer: EOF");
                break;
            }
            Ok(n) => {
                trace!(stream = %kind, "drainer: read {} bytes", n);
                buffer.append(&chunk[..n]);
                if let Some(echo) = echo.as_mut() {
                    echo.feed(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(stream = %kind, "drainer: read error, stopping: {}", e);
                break;
            }
        }
    }

    if let Some(echo) = echo.as_mut() {
        echo.finish();
    }
}

/// A running drainer thread for one stream.
pub struct StreamDrainer {
    kind: StreamKind,
    handle: JoinHandle<()>,
}

impl StreamDrainer {
    /// Start draining `reader` on a new named thread.
    pub fn spawn<R>(
        reader: R,
        kind: StreamKind,
        buffer: OutputBuffer,
        echo: Option<SharedSink>,
        chunk_size: usize,
        thread_name: String,
    ) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let echo = echo.map(|sink| LineEcho::new(kind, sink));
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || drain(reader, kind, &buffer, echo, chunk_size))?;

        Ok(Self { kind, handle })
    }

    /// Which stream this drainer reads.
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Check if the thread has reached end-of-stream.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Join the thread, waiting at most `bound`.
    ///
    /// Returns `false` if the thread is still running when the bound expires;
    /// the thread is then left detached.
    pub fn join_within(self, bound: Duration, poll_interval: Duration) -> bool {
        let deadline = Instant::now().checked_add(bound);
        while !self.handle.is_finished() {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return false;
            }
            thread::sleep(poll_interval);
        }

        if self.handle.join().is_err() {
            // The captured prefix is still in the buffer.
            error!(stream = %self.kind, "drainer thread panicked");
        }
        true
    }
}
