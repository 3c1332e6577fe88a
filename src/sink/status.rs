// Sink status - shared between the writer thread and the session

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SinkStatus {
    /// No sink attached (device unreachable or not configured)
    #[default]
    Unavailable = 0,
    Connected = 1,
    /// At least one write failed
    Faulted = 2,
}

impl From<u8> for SinkStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => SinkStatus::Connected,
            2 => SinkStatus::Faulted,
            _ => SinkStatus::Unavailable,
        }
    }
}

/// Atomic wrapper to share the status between threads
#[derive(Debug, Clone)]
pub struct AtomicSinkStatus {
    inner: Arc<AtomicU8>,
}

impl AtomicSinkStatus {
    pub fn new(status: SinkStatus) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(status as u8)),
        }
    }

    pub fn get(&self) -> SinkStatus {
        SinkStatus::from(self.inner.load(Ordering::Relaxed))
    }

    pub fn set(&self, status: SinkStatus) {
        self.inner.store(status as u8, Ordering::Relaxed);
    }
}

impl Default for AtomicSinkStatus {
    fn default() -> Self {
        Self::new(SinkStatus::Unavailable)
    }
}
