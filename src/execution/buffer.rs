//! Thread-safe capture buffer shared between a drainer and its readers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Growable byte buffer guarded by a mutex.
///
/// Clones share the same storage: the drainer holds one clone for writing,
/// the process handle keeps another for snapshots. Every append and every
/// snapshot happens under the lock, so a snapshot always sees whole chunks.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-written Vec behind,
    // so poisoning is recovered from instead of surfaced.
    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a chunk.
    pub fn append(&self, bytes: &[u8]) {
        self.lock().extend_from_slice(bytes);
    }

    /// Copy of everything appended so far.
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Number of bytes captured so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing has been captured yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
