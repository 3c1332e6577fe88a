// Standard MIDI File loading via midly
// File tempo metadata is ignored; tempo is supplied by the session.

use super::{ExtractError, MessageKind, Recording, TrackMessage};
use midly::{MetaMessage, MidiMessage as SmfMessage, Smf, Timing, TrackEventKind};
use std::fs;
use std::path::Path;

/// Reads and parses a Standard MIDI File
pub fn load_recording(path: impl AsRef<Path>) -> Result<Recording, ExtractError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let smf = Smf::parse(&bytes)
        .map_err(|e| ExtractError::Parse(format!("{}: {}", path.display(), e)))?;

    let recording = recording_from_smf(&smf)?;
    log::info!(
        "Loaded {} ({} tracks, {} ticks per beat)",
        path.display(),
        recording.tracks.len(),
        recording.ticks_per_unit
    );
    Ok(recording)
}

/// Converts parsed SMF data. Only metrical (ticks per beat) timing is supported.
pub fn recording_from_smf(smf: &Smf) -> Result<Recording, ExtractError> {
    let ticks_per_unit = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int() as u32,
        Timing::Timecode(fps, subframes) => {
            return Err(ExtractError::UnsupportedTiming(format!(
                "timecode timing ({:?}, {} subframes)",
                fps, subframes
            )));
        }
    };

    let tracks = smf
        .tracks
        .iter()
        .map(|track| {
            track
                .iter()
                .map(|event| TrackMessage::new(event.delta.as_int(), convert(&event.kind)))
                .collect()
        })
        .collect();

    Ok(Recording {
        ticks_per_unit,
        tracks,
    })
}

fn convert(kind: &TrackEventKind) -> MessageKind {
    match kind {
        TrackEventKind::Midi { message, .. } => match message {
            SmfMessage::NoteOn { key, vel } => MessageKind::NoteStart {
                pitch: key.as_int(),
                velocity: vel.as_int(),
            },
            SmfMessage::NoteOff { key, .. } => MessageKind::NoteEnd {
                pitch: key.as_int(),
            },
            _ => MessageKind::Other,
        },
        TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
            MessageKind::TrackName(String::from_utf8_lossy(name).into_owned())
        }
        _ => MessageKind::Other,
    }
}
