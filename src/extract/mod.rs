// Event extraction - Recorded track (ticks) to beat-relative note patterns
//
// A running tick counter is accumulated from message deltas. Each pitch has
// at most one active note; a note-end (or a note-start with velocity 0)
// closes it and emits an event whose start is expressed in beats.

pub mod smf;

pub use smf::{load_recording, recording_from_smf};

use crate::pattern::{NoteTrigger, Pattern, PatternError, Trigger};
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Track '{0}' not found")]
    TrackNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI parse error: {0}")]
    Parse(String),

    #[error("Unsupported timing: {0}")]
    UnsupportedTiming(String),

    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Tick-based performance data, independent of the file format
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    /// Ticks per beat
    pub ticks_per_unit: u32,
    pub tracks: Vec<Vec<TrackMessage>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackMessage {
    /// Ticks since the previous message in the track
    pub delta: u32,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    NoteStart { pitch: u8, velocity: u8 },
    NoteEnd { pitch: u8 },
    TrackName(String),
    Other,
}

impl TrackMessage {
    pub fn new(delta: u32, kind: MessageKind) -> Self {
        Self { delta, kind }
    }

    fn name(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::TrackName(name) => Some(name),
            _ => None,
        }
    }
}

/// A completed note from the recording
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedNoteEvent {
    pub pitch: u8,
    pub start_beat: f64,
    pub velocity: u8,
    /// Seconds
    pub duration: f64,
}

impl ExtractedNoteEvent {
    /// Note pattern firing once on `start_beat`
    pub fn to_pattern(&self, trigger_delay: Option<f64>) -> Result<Pattern, PatternError> {
        let mut note = NoteTrigger::new(self.pitch, self.velocity, self.duration)?;
        if let Some(delay) = trigger_delay {
            note = note.with_trigger_delay(delay)?;
        }
        Pattern::new(Trigger::Note(note), [self.start_beat])
    }
}

/// Timing conversion for one extraction pass
struct TickScale {
    bpm: f64,
    ticks_per_unit: f64,
}

impl TickScale {
    fn new(bpm: f64, ticks_per_unit: u32) -> Result<Self, ExtractError> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(ExtractError::InvalidTempo(bpm));
        }
        if ticks_per_unit == 0 {
            return Err(ExtractError::UnsupportedTiming(
                "zero ticks per beat".to_string(),
            ));
        }

        Ok(Self {
            bpm,
            ticks_per_unit: ticks_per_unit as f64,
        })
    }

    fn seconds(&self, ticks: u64) -> f64 {
        ticks as f64 * 60.0 / self.bpm / self.ticks_per_unit
    }

    /// Same as seconds / (60 / bpm), without the rounding of the round trip
    fn beats(&self, ticks: u64) -> f64 {
        ticks as f64 / self.ticks_per_unit
    }
}

/// The track name is the first name message in the track
fn track_name(track: &[TrackMessage]) -> Option<&str> {
    track.iter().find_map(TrackMessage::name)
}

/// Extracts completed notes from every track named `track_name`, in order.
///
/// Notes starting at or after `beat_limit` beats are excluded.
pub fn extract_events(
    recording: &Recording,
    track_name_filter: &str,
    bpm: f64,
    beat_limit: Option<f64>,
) -> Result<Vec<ExtractedNoteEvent>, ExtractError> {
    let scale = TickScale::new(bpm, recording.ticks_per_unit)?;

    let tracks: Vec<&Vec<TrackMessage>> = recording
        .tracks
        .iter()
        .filter(|track| track_name(track) == Some(track_name_filter))
        .collect();

    if tracks.is_empty() {
        return Err(ExtractError::TrackNotFound(track_name_filter.to_string()));
    }

    let mut events = Vec::new();
    for track in tracks {
        scan_track(track, &scale, &mut events);
    }

    if let Some(limit) = beat_limit {
        let before = events.len();
        events.retain(|event| event.start_beat < limit);
        if events.len() < before {
            log::debug!(
                "Excluded {} notes starting at or after beat {}",
                before - events.len(),
                limit
            );
        }
    }

    Ok(events)
}

fn scan_track(track: &[TrackMessage], scale: &TickScale, events: &mut Vec<ExtractedNoteEvent>) {
    // pitch -> (start tick, velocity)
    let mut active: HashMap<u8, (u64, u8)> = HashMap::new();
    let mut now: u64 = 0;

    let mut close = |pitch: u8, start: u64, velocity: u8, end: u64| {
        if end <= start {
            log::debug!("Dropped zero-length note {} at tick {}", pitch, start);
            return;
        }
        let event = ExtractedNoteEvent {
            pitch,
            start_beat: scale.beats(start),
            velocity,
            duration: scale.seconds(end - start),
        };
        log::debug!(
            "Note {}: beat {:.3}, {:.3}s, velocity {}",
            event.pitch,
            event.start_beat,
            event.duration,
            event.velocity
        );
        events.push(event);
    };

    for message in track {
        now += message.delta as u64;
        match message.kind {
            MessageKind::NoteStart { pitch, velocity } if velocity > 0 => {
                // A second start closes the first note where the new one begins
                if let Some((start, previous)) = active.insert(pitch, (now, velocity)) {
                    close(pitch, start, previous, now);
                }
            }
            MessageKind::NoteStart { pitch, .. } | MessageKind::NoteEnd { pitch } => {
                match active.remove(&pitch) {
                    Some((start, velocity)) => close(pitch, start, velocity, now),
                    None => log::debug!("Unmatched note end {} at tick {}", pitch, now),
                }
            }
            MessageKind::TrackName(_) | MessageKind::Other => {}
        }
    }

    if !active.is_empty() {
        let mut open: Vec<u8> = active.keys().copied().collect();
        open.sort_unstable();
        log::warn!("Dropped {} notes still open at end of track: {:?}", open.len(), open);
    }
}

/// Extracts note patterns (one per completed note, firing on its start beat)
pub fn extract_patterns(
    recording: &Recording,
    track_name_filter: &str,
    bpm: f64,
    beat_limit: Option<f64>,
) -> Result<Vec<Pattern>, ExtractError> {
    extract_patterns_with_delay(recording, track_name_filter, bpm, beat_limit, None)
}

/// Same as `extract_patterns`, giving every note the same trigger delay
pub fn extract_patterns_with_delay(
    recording: &Recording,
    track_name_filter: &str,
    bpm: f64,
    beat_limit: Option<f64>,
    trigger_delay: Option<f64>,
) -> Result<Vec<Pattern>, ExtractError> {
    let patterns = extract_events(recording, track_name_filter, bpm, beat_limit)?
        .iter()
        .map(|event| event.to_pattern(trigger_delay))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "Extracted {} patterns from track '{}'",
        patterns.len(),
        track_name_filter
    );
    Ok(patterns)
}
