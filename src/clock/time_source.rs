// Time sources - monotonic time for the playback clock
//
// The clock never reads the wall clock directly. Production code uses
// `SystemTimeSource` (monotonic `Instant`); tests use `VirtualTimeSource`,
// where sleeping simply moves time forward, so drift can be asserted
// deterministically and without real sleeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time, measured from an arbitrary origin
pub trait TimeSource: Send + Sync {
    /// Time elapsed since the origin
    fn now(&self) -> Duration;

    /// Block until `deadline` (returns immediately if it already passed)
    fn sleep_until(&self, deadline: Duration);
}

/// Real monotonic time backed by `Instant`
#[derive(Debug, Clone)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        let remaining = deadline.saturating_sub(self.now());
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
    }
}

/// Synthetic time for tests
///
/// Clones share the same clock, so a test can keep a handle and inject
/// processing delay with `advance` while the playback clock owns another.
#[derive(Debug, Clone, Default)]
pub struct VirtualTimeSource {
    nanos: Arc<AtomicU64>,
}

impl VirtualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves virtual time forward (simulated work)
    pub fn advance(&self, delta: Duration) {
        self.nanos
            .fetch_add(delta.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl TimeSource for VirtualTimeSource {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep_until(&self, deadline: Duration) {
        // Never moves backwards
        self.nanos
            .fetch_max(deadline.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep_until(&self, deadline: Duration) {
        (**self).sleep_until(deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_time_starts_at_zero() {
        let time = VirtualTimeSource::new();
        assert_eq!(time.now(), Duration::ZERO);
    }

    #[test]
    fn test_virtual_sleep_jumps_to_deadline() {
        let time = VirtualTimeSource::new();
        time.sleep_until(Duration::from_millis(250));
        assert_eq!(time.now(), Duration::from_millis(250));
    }

    #[test]
    fn test_virtual_sleep_past_deadline_is_noop() {
        let time = VirtualTimeSource::new();
        time.advance(Duration::from_millis(500));
        time.sleep_until(Duration::from_millis(250));
        assert_eq!(time.now(), Duration::from_millis(500));
    }

    #[test]
    fn test_virtual_clones_share_time() {
        let time = VirtualTimeSource::new();
        let handle = time.clone();
        handle.advance(Duration::from_millis(10));
        assert_eq!(time.now(), Duration::from_millis(10));
    }

    #[test]
    fn test_system_time_is_monotonic() {
        let time = SystemTimeSource::new();
        let first = time.now();
        time.sleep_until(first + Duration::from_millis(2));
        assert!(time.now() >= first + Duration::from_millis(2));
    }
}
