// Integration test: a complete session on virtual time
//
// Loads a session file and a recorded lead track, then plays two laps into
// in-memory sinks and a text frame sink.

use beatloop::clock::{CancellationToken, VirtualTimeSource};
use beatloop::midi::MidiMessage;
use beatloop::sink::{RecordingAudioSink, RecordingMidiSink, SinkError};
use beatloop::{
    MatchPolicy, SampleId, SessionBuilder, SessionConfig, TextFrameSink, load_recording,
    prepare_patterns,
};
use midly::num::{u4, u7, u15, u28};
use midly::{Format, Header, MetaMessage, MidiMessage as SmfMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const SESSION: &str = r#"(
    bpm: 480.0,
    loop_beats: 8,
    track_name: "lead",
    midi_file: Some("lead.mid"),
    trigger_delay: 0.0,
    laps: Some(2),
    patterns: [
        (sample: Some("bd"), gain: Some(0.75), beats: [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 7.25]),
        (sample: Some("sd"), gain: Some(0.5), beats: [1.0, 3.0], repeat: Some((size: 4.0, times: 2))),
        (sample: Some("cowbell"), beats: [6.0]),
    ],
)"#;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn note(delta: u32, on: bool, key: u8) -> TrackEvent<'static> {
    let message = if on {
        SmfMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(100),
        }
    } else {
        SmfMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(0),
        }
    };
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message,
        },
    }
}

fn write_lead(path: &std::path::Path) {
    let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(480))));
    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(b"lead")),
        },
        // Starts on beat 4, normalized to beat 0
        note(1920, true, 28),
        note(60, false, 28),
        note(900, true, 31),
        note(60, false, 31),
    ]);
    smf.save(path).unwrap();
}

#[test]
fn test_two_laps_reach_every_sink() {
    let dir = tempdir().unwrap();
    let session_path = dir.path().join("session.ron");
    std::fs::write(&session_path, SESSION).unwrap();
    write_lead(&dir.path().join("lead.mid"));

    let config = SessionConfig::load(&session_path).unwrap();
    assert_eq!(config.match_policy, MatchPolicy::Exact);

    let recording = load_recording(config.midi_file.as_ref().unwrap()).unwrap();
    let patterns = prepare_patterns(&config, Some(&recording)).unwrap();
    assert_eq!(patterns.len(), 5);
    assert_eq!(patterns[1].beat_values().collect::<Vec<_>>(), vec![2.0]);

    let midi = RecordingMidiSink::new();
    let audio = RecordingAudioSink::new(["bd", "sd"]);
    let screen = SharedBuffer::default();

    let session = SessionBuilder::new(config, patterns)
        .with_midi::<RecordingMidiSink>(Ok(midi.clone()))
        .with_audio::<RecordingAudioSink>(Ok(audio.clone()))
        .with_frame_sink(TextFrameSink::new(screen.clone()))
        .with_render_seed(42)
        .build(VirtualTimeSource::new())
        .unwrap();

    let report = session.run(&CancellationToken::new());

    assert_eq!(report.clock.ticks, 128);
    assert_eq!(report.clock.laps, 2);
    // Per lap: 2 notes, 7 kicks, 4 snares, 1 cowbell
    assert_eq!(report.dispatch.fired, 28);
    assert_eq!(report.dispatch.skipped, 2);
    assert_eq!(report.midi.unwrap().written, 8);
    assert_eq!(report.audio.unwrap().written, 22);

    let messages = midi.messages();
    assert_eq!(messages.len(), 8);
    assert_eq!(messages.iter().filter(|m| matches!(m, MidiMessage::NoteOn { .. })).count(), 4);

    let plays = audio.plays();
    assert_eq!(plays.iter().filter(|(id, _)| id == &SampleId::new("bd")).count(), 14);
    assert!(plays
        .iter()
        .all(|(id, gain)| (id.as_str() == "bd" && *gain == 0.75) || (id.as_str() == "sd" && *gain == 0.5)));

    // One printed frame per beat
    let text = String::from_utf8(screen.0.lock().unwrap().clone()).unwrap();
    assert_eq!(text.matches("beat").count(), 16);
    assert!(text.contains("\n  E1 "));
}

#[test]
fn test_unavailable_sinks_degrade() {
    let config = SessionConfig::from_ron(
        "(laps: Some(1), patterns: [(pitch: Some(60), beats: [0.0]), (sample: Some(\"bd\"), beats: [1.0])])",
    )
    .unwrap();
    let patterns = prepare_patterns(&config, None).unwrap();

    let session = SessionBuilder::new(config, patterns)
        .with_midi::<RecordingMidiSink>(Err(SinkError::Unavailable("no port".to_string())))
        .with_audio::<RecordingAudioSink>(Err(SinkError::Unavailable("no device".to_string())))
        .build(VirtualTimeSource::new())
        .unwrap();

    let report = session.run(&CancellationToken::new());

    assert_eq!(report.clock.laps, 1);
    assert_eq!(report.dispatch.fired, 2);
    assert_eq!(report.dispatch.skipped, 2);
    assert!(report.midi.is_none());
    assert!(report.audio.is_none());
}
