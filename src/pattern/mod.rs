// Pattern - Triggerable event source scheduled on loop-relative beats
// A pattern is one note or one sample, fired on every beat in its beat set

pub mod spec;

use crate::clock::SUBDIVISION;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use spec::{PatternSpec, RepeatSpec, repeat};

/// Largest distance (in subdivision slots) between `beat * SUBDIVISION` and
/// an integer for the beat to count as subdivision-aligned.
const ALIGNMENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Cannot normalize an empty pattern set")]
    EmptyPatternSet,
}

fn invalid(message: impl Into<String>) -> PatternError {
    PatternError::InvalidPattern(message.into())
}

/// Identifier of a sound in the sample bank ("bd", "sd", "hh", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(String);

impl SampleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SampleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// MIDI note trigger: note-on, hold, note-off
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteTrigger {
    pitch: u8,
    velocity: u8,
    duration: Duration,
    trigger_delay: Option<Duration>,
}

impl NoteTrigger {
    /// Creates a note trigger. `duration_secs` must be > 0.
    pub fn new(pitch: u8, velocity: u8, duration_secs: f64) -> Result<Self, PatternError> {
        if pitch > 127 {
            return Err(invalid(format!("pitch {} outside 0-127", pitch)));
        }
        if velocity > 127 {
            return Err(invalid(format!("velocity {} outside 0-127", velocity)));
        }
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(invalid(format!(
                "note duration must be > 0 seconds, got {}",
                duration_secs
            )));
        }

        Ok(Self {
            pitch,
            velocity,
            duration: Duration::from_secs_f64(duration_secs),
            trigger_delay: None,
        })
    }

    /// Delay between the trigger and the note-on, in seconds (>= 0)
    pub fn with_trigger_delay(mut self, delay_secs: f64) -> Result<Self, PatternError> {
        if !delay_secs.is_finite() || delay_secs < 0.0 {
            return Err(invalid(format!(
                "trigger delay must be >= 0 seconds, got {}",
                delay_secs
            )));
        }
        self.trigger_delay = Some(Duration::from_secs_f64(delay_secs));
        Ok(self)
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn trigger_delay(&self) -> Option<Duration> {
        self.trigger_delay
    }
}

/// Sample trigger: fire-and-forget playback at a gain
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTrigger {
    sample_id: SampleId,
    gain: f32,
}

impl SampleTrigger {
    pub fn new(sample_id: SampleId, gain: f32) -> Result<Self, PatternError> {
        if !(0.0..=1.0).contains(&gain) {
            return Err(invalid(format!(
                "gain for sample '{}' must be within 0.0-1.0, got {}",
                sample_id, gain
            )));
        }
        Ok(Self { sample_id, gain })
    }

    pub fn sample_id(&self) -> &SampleId {
        &self.sample_id
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

/// What a pattern fires. Exactly one kind per pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Note(NoteTrigger),
    Sample(SampleTrigger),
}

/// A beat offset within the loop
///
/// `slot` is the subdivision index when the beat lies exactly on the
/// subdivision grid (multiples of 1/8 beat), `None` otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beat {
    value: f64,
    slot: Option<u32>,
}

impl Beat {
    pub fn new(value: f64) -> Result<Self, PatternError> {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(format!("beat {} must be finite and >= 0", value)));
        }

        let scaled = value * SUBDIVISION as f64;
        let rounded = scaled.round();
        let slot = if (scaled - rounded).abs() < ALIGNMENT_EPSILON && rounded <= u32::MAX as f64 {
            Some(rounded as u32)
        } else {
            None
        };

        Ok(Self { value, slot })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn slot(&self) -> Option<u32> {
        self.slot
    }

    pub fn is_aligned(&self) -> bool {
        self.slot.is_some()
    }

    /// Distance in beats to the nearest subdivision tick
    pub fn grid_offset(&self) -> f64 {
        let scaled = self.value * SUBDIVISION as f64;
        (scaled - scaled.round()).abs() / SUBDIVISION as f64
    }
}

/// A triggerable event source and the beats it fires on
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    trigger: Trigger,
    beats: Vec<Beat>,
}

impl Pattern {
    /// Creates a pattern. Beats are sorted and deduplicated; an empty beat
    /// set is rejected.
    pub fn new(
        trigger: Trigger,
        beats: impl IntoIterator<Item = f64>,
    ) -> Result<Self, PatternError> {
        let mut beats = beats
            .into_iter()
            .map(Beat::new)
            .collect::<Result<Vec<_>, _>>()?;

        if beats.is_empty() {
            return Err(invalid("a pattern needs at least one beat"));
        }

        beats.sort_by(|a, b| a.value.total_cmp(&b.value));
        beats.dedup_by(|a, b| a.value == b.value);

        Ok(Self { trigger, beats })
    }

    /// Shorthand for a MIDI note pattern
    pub fn note(
        pitch: u8,
        velocity: u8,
        duration_secs: f64,
        beats: impl IntoIterator<Item = f64>,
    ) -> Result<Self, PatternError> {
        let note = NoteTrigger::new(pitch, velocity, duration_secs)?;
        Self::new(Trigger::Note(note), beats)
    }

    /// Shorthand for a sample pattern
    pub fn sample(
        sample_id: impl Into<SampleId>,
        gain: f32,
        beats: impl IntoIterator<Item = f64>,
    ) -> Result<Self, PatternError> {
        let sample = SampleTrigger::new(sample_id.into(), gain)?;
        Self::new(Trigger::Sample(sample), beats)
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn beats(&self) -> &[Beat] {
        &self.beats
    }

    pub fn beat_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.beats.iter().map(|b| b.value)
    }

    /// Earliest beat (beats are kept sorted and never empty)
    pub fn earliest_beat(&self) -> f64 {
        self.beats[0].value
    }

    pub fn as_note(&self) -> Option<&NoteTrigger> {
        match &self.trigger {
            Trigger::Note(note) => Some(note),
            Trigger::Sample(_) => None,
        }
    }

    pub fn as_sample(&self) -> Option<&SampleTrigger> {
        match &self.trigger {
            Trigger::Sample(sample) => Some(sample),
            Trigger::Note(_) => None,
        }
    }

    /// Rejects patterns with a beat outside `[0, loop_beats)`
    pub fn check_loop_bounds(&self, loop_beats: u32) -> Result<(), PatternError> {
        let limit = loop_beats as f64;
        match self.beats.iter().find(|b| b.value >= limit) {
            Some(beat) => Err(invalid(format!(
                "beat {} is outside the {}-beat loop",
                beat.value, loop_beats
            ))),
            None => Ok(()),
        }
    }

    /// Number of beats not on the subdivision grid
    pub fn unaligned_beats(&self) -> usize {
        self.beats.iter().filter(|b| !b.is_aligned()).count()
    }

    /// Number of beats at least `window` beats away from every tick
    pub fn beats_off_grid(&self, window: f64) -> usize {
        self.beats
            .iter()
            .filter(|b| b.grid_offset() >= window)
            .count()
    }

    fn shift_back(&mut self, offset: f64) -> Result<(), PatternError> {
        for beat in self.beats.iter_mut() {
            *beat = Beat::new((beat.value - offset).max(0.0))?;
        }
        Ok(())
    }
}

/// Shifts every beat so that the earliest beat across all patterns is 0.
///
/// Returns the offset that was subtracted.
pub fn normalize(patterns: &mut [Pattern]) -> Result<f64, PatternError> {
    let offset = patterns
        .iter()
        .map(Pattern::earliest_beat)
        .min_by(|a, b| a.total_cmp(b))
        .ok_or(PatternError::EmptyPatternSet)?;

    if offset != 0.0 {
        for pattern in patterns.iter_mut() {
            pattern.shift_back(offset)?;
        }
    }

    Ok(offset)
}

/// Drops patterns that have a beat at or beyond the loop end.
///
/// Returns the number of patterns dropped.
pub fn retain_within_loop(patterns: &mut Vec<Pattern>, loop_beats: u32) -> usize {
    let before = patterns.len();
    patterns.retain(|p| p.check_loop_bounds(loop_beats).is_ok());
    before - patterns.len()
}
