// Playback clock - Fixed-subdivision loop clock with anchored deadlines
// Each tick's deadline is computed from the loop start, never from the
// previous tick, so processing delay does not accumulate across ticks.

pub mod cancel;
pub mod time_source;

pub use cancel::CancellationToken;
pub use time_source::{SystemTimeSource, TimeSource, VirtualTimeSource};

use std::time::Duration;

/// Schedulable slots per beat
pub const SUBDIVISION: u32 = 8;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClockError {
    #[error("Invalid tempo: {0} BPM (must be a finite value > 0)")]
    InvalidTempo(f64),

    #[error("Invalid loop length: {0} beats (must be > 0)")]
    InvalidLoopLength(u32),
}

/// Loop position state: tempo, loop length, current tick and lap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopClock {
    bpm: f64,
    loop_beats: u32,
    tick_index: u32,
    lap: u64,
}

impl LoopClock {
    pub fn new(bpm: f64, loop_beats: u32) -> Result<Self, ClockError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(ClockError::InvalidTempo(bpm));
        }
        if loop_beats == 0 || loop_beats.checked_mul(SUBDIVISION).is_none() {
            return Err(ClockError::InvalidLoopLength(loop_beats));
        }

        Ok(Self {
            bpm,
            loop_beats,
            tick_index: 0,
            lap: 0,
        })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn loop_beats(&self) -> u32 {
        self.loop_beats
    }

    pub fn subdivision(&self) -> u32 {
        SUBDIVISION
    }

    pub fn tick_index(&self) -> u32 {
        self.tick_index
    }

    /// Completed loops
    pub fn lap(&self) -> u64 {
        self.lap
    }

    pub fn ticks_per_loop(&self) -> u32 {
        self.loop_beats * SUBDIVISION
    }

    /// Duration of one beat in seconds
    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Duration of one subdivision in seconds
    pub fn tick_seconds(&self) -> f64 {
        self.beat_seconds() / SUBDIVISION as f64
    }

    pub fn loop_seconds(&self) -> f64 {
        self.beat_seconds() * self.loop_beats as f64
    }

    /// Exact beat position of the current tick
    pub fn beat_position(&self) -> f64 {
        self.tick_index as f64 / SUBDIVISION as f64
    }

    /// Moves to the next tick. Returns true when the loop wrapped.
    pub fn advance(&mut self) -> bool {
        self.tick_index += 1;
        if self.tick_index >= self.ticks_per_loop() {
            self.tick_index = 0;
            self.lap += 1;
            true
        } else {
            false
        }
    }
}

/// One delivered subdivision step
///
/// `scheduled` and `actual` are measured on the clock's time source.
/// `position` is the continuous beat position observed when the tick was
/// delivered, as opposed to the exact `beat_position()` of the slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub index: u32,
    pub lap: u64,
    pub loop_beats: u32,
    pub scheduled: Duration,
    pub actual: Duration,
    pub position: f64,
}

impl Tick {
    /// A tick delivered exactly on time (used by tests and previews)
    pub fn on_time(index: u32, loop_beats: u32) -> Self {
        let position = index as f64 / SUBDIVISION as f64;
        Self {
            index,
            lap: 0,
            loop_beats,
            scheduled: Duration::ZERO,
            actual: Duration::ZERO,
            position,
        }
    }

    pub fn beat_position(&self) -> f64 {
        self.index as f64 / SUBDIVISION as f64
    }

    pub fn lateness(&self) -> Duration {
        self.actual.saturating_sub(self.scheduled)
    }

    pub fn is_beat_boundary(&self) -> bool {
        self.index % SUBDIVISION == 0
    }
}

/// Summary of a `PlaybackClock::run`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockReport {
    pub ticks: u64,
    pub laps: u64,
    pub max_lateness: Duration,
    pub final_lateness: Duration,
    pub cancelled: bool,
}

impl ClockReport {
    fn record(&mut self, tick: &Tick) {
        let lateness = tick.lateness();
        self.ticks += 1;
        self.final_lateness = lateness;
        if lateness > self.max_lateness {
            self.max_lateness = lateness;
        }
    }
}

/// Drives a `LoopClock` in real (or virtual) time
pub struct PlaybackClock<T: TimeSource> {
    state: LoopClock,
    time: T,
}

impl<T: TimeSource> PlaybackClock<T> {
    pub fn new(state: LoopClock, time: T) -> Self {
        Self { state, time }
    }

    pub fn state(&self) -> &LoopClock {
        &self.state
    }

    pub fn time_source(&self) -> &T {
        &self.time
    }

    /// Runs until `laps` loops complete (forever with `None`) or `cancel`
    /// fires. `on_tick` runs on the calling thread for every tick.
    ///
    /// Cancellation is checked once per tick, after the wait and before the
    /// tick is delivered; a cancelled tick is never delivered.
    pub fn run<F>(&mut self, cancel: &CancellationToken, laps: Option<u64>, mut on_tick: F) -> ClockReport
    where
        F: FnMut(&Tick),
    {
        let mut report = ClockReport::default();
        if laps == Some(0) {
            return report;
        }

        let tick_seconds = self.state.tick_seconds();
        let beat_seconds = self.state.beat_seconds();
        let loop_duration = Duration::from_secs_f64(self.state.loop_seconds());

        // Resuming mid-loop keeps the current slot on schedule
        let mut loop_start = self
            .time
            .now()
            .saturating_sub(Duration::from_secs_f64(self.state.tick_index as f64 * tick_seconds));

        log::debug!(
            "Clock started: {} BPM, {} beats, {} ticks per loop",
            self.state.bpm,
            self.state.loop_beats,
            self.state.ticks_per_loop()
        );

        loop {
            let index = self.state.tick_index;
            let scheduled = loop_start + Duration::from_secs_f64(index as f64 * tick_seconds);
            self.time.sleep_until(scheduled);

            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let actual = self.time.now();
            let position = (actual.saturating_sub(loop_start).as_secs_f64() / beat_seconds)
                .rem_euclid(self.state.loop_beats as f64);

            let tick = Tick {
                index,
                lap: self.state.lap,
                loop_beats: self.state.loop_beats,
                scheduled,
                actual,
                position,
            };
            report.record(&tick);
            log::trace!(
                "Tick {} (lap {}) late by {:?}",
                tick.index,
                tick.lap,
                tick.lateness()
            );

            on_tick(&tick);

            if self.state.advance() {
                loop_start += loop_duration;
                report.laps += 1;
                if laps.is_some_and(|limit| report.laps >= limit) {
                    break;
                }
            }
        }

        log::debug!(
            "Clock stopped after {} ticks, {} laps (max lateness {:?}, cancelled: {})",
            report.ticks,
            report.laps,
            report.max_lateness,
            report.cancelled
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_clock_creation() {
        let clock = LoopClock::new(120.0, 8).unwrap();

        assert_eq!(clock.ticks_per_loop(), 64);
        assert_eq!(clock.beat_seconds(), 0.5);
        assert_eq!(clock.tick_seconds(), 0.0625);
        assert_eq!(clock.loop_seconds(), 4.0);
        assert_eq!(clock.tick_index(), 0);
        assert_eq!(clock.lap(), 0);
    }

    #[test]
    fn test_invalid_clock_parameters() {
        assert_eq!(LoopClock::new(0.0, 8), Err(ClockError::InvalidTempo(0.0)));
        assert!(LoopClock::new(-120.0, 8).is_err());
        assert!(LoopClock::new(f64::NAN, 8).is_err());
        assert_eq!(LoopClock::new(120.0, 0), Err(ClockError::InvalidLoopLength(0)));
    }

    #[test]
    fn test_advance_wraps_and_counts_laps() {
        let mut clock = LoopClock::new(120.0, 1).unwrap();

        for _ in 0..7 {
            assert!(!clock.advance());
        }
        assert_eq!(clock.tick_index(), 7);
        assert_eq!(clock.beat_position(), 0.875);

        assert!(clock.advance());
        assert_eq!(clock.tick_index(), 0);
        assert_eq!(clock.lap(), 1);
    }

    #[test]
    fn test_tick_helpers() {
        let tick = Tick {
            index: 9,
            lap: 0,
            loop_beats: 4,
            scheduled: Duration::from_millis(100),
            actual: Duration::from_millis(103),
            position: 1.13,
        };

        assert_eq!(tick.beat_position(), 1.125);
        assert_eq!(tick.lateness(), Duration::from_millis(3));
        assert!(!tick.is_beat_boundary());
        assert!(Tick::on_time(16, 4).is_beat_boundary());
    }

    #[test]
    fn test_run_delivers_every_tick_in_order() {
        let time = VirtualTimeSource::new();
        let mut clock = PlaybackClock::new(LoopClock::new(120.0, 2).unwrap(), time.clone());

        let mut indices = Vec::new();
        let report = clock.run(&CancellationToken::new(), Some(1), |tick| indices.push(tick.index));

        assert_eq!(indices, (0..16).collect::<Vec<_>>());
        assert_eq!(report.ticks, 16);
        assert_eq!(report.laps, 1);
        assert!(!report.cancelled);
        // Last tick fires at 15 * 62.5ms
        assert_eq!(time.now(), Duration::from_micros(937_500));
    }

    #[test]
    fn test_run_zero_laps_is_noop() {
        let mut clock = PlaybackClock::new(LoopClock::new(120.0, 2).unwrap(), VirtualTimeSource::new());
        let report = clock.run(&CancellationToken::new(), Some(0), |_| panic!("no tick expected"));
        assert_eq!(report.ticks, 0);
    }

    #[test]
    fn test_cancel_before_start_delivers_nothing() {
        let mut clock = PlaybackClock::new(LoopClock::new(120.0, 2).unwrap(), VirtualTimeSource::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = clock.run(&cancel, None, |_| panic!("no tick expected"));
        assert!(report.cancelled);
        assert_eq!(report.ticks, 0);
    }
}
