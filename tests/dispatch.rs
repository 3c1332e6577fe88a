// Integration test: dispatch under concurrent load
//
// Many note patterns fire on the same tick across several workers; every
// note must still reach the MIDI sink as note-on followed by its note-off.

use beatloop::clock::Tick;
use beatloop::dispatch::{Backpressure, Dispatcher, MatchPolicy, Scheduler, WorkerPool};
use beatloop::midi::MidiMessage;
use beatloop::pattern::Pattern;
use beatloop::sink::{RecordingAudioSink, RecordingMidiSink, spawn_audio_writer, spawn_midi_writer};
use beatloop::SampleId;

#[test]
fn test_note_on_precedes_note_off_under_load() {
    let patterns: Vec<Pattern> = (0..32u8)
        .map(|i| Pattern::note(40 + i, 100, 0.001 * (i % 4 + 1) as f64, [0.0, 0.5]).unwrap())
        .collect();

    let sink = RecordingMidiSink::new();
    let (handle, writer) = spawn_midi_writer(sink.clone(), 8).unwrap();
    let pool = WorkerPool::new(4, 128, Backpressure::Block { timeout_ms: 1000 }).unwrap();
    let mut dispatcher =
        Dispatcher::new(Scheduler::new(MatchPolicy::Exact, &patterns, 1), pool).with_midi(handle);

    for index in 0..8 {
        dispatcher.dispatch(&Tick::on_time(index, 1), &patterns);
    }
    let stats = dispatcher.shutdown();
    let written = writer.join();

    assert_eq!(stats.fired, 64);
    assert_eq!(stats.pool.completed, 64);
    assert_eq!(stats.pool.dropped + stats.pool.rejected, 0);
    assert_eq!(written.written, 128);

    let messages = sink.messages();
    for pitch in 40..72u8 {
        let for_pitch: Vec<&MidiMessage> = messages.iter().filter(|m| m.pitch() == pitch).collect();
        assert_eq!(for_pitch.len(), 4, "pitch {}", pitch);
        // Both firings of a pitch may overlap, but each on opens before an off
        let mut open = 0i32;
        for message in for_pitch {
            match message {
                MidiMessage::NoteOn { .. } => open += 1,
                MidiMessage::NoteOff { .. } => {
                    open -= 1;
                    assert!(open >= 0, "note-off before note-on for pitch {}", pitch);
                }
            }
        }
        assert_eq!(open, 0);
    }
}

#[test]
fn test_trigger_delay_holds_back_note_on() {
    let note = beatloop::pattern::NoteTrigger::new(60, 100, 0.01)
        .unwrap()
        .with_trigger_delay(0.03)
        .unwrap();
    let patterns = vec![Pattern::new(beatloop::Trigger::Note(note), [0.0]).unwrap()];

    let sink = RecordingMidiSink::new();
    let (handle, writer) = spawn_midi_writer(sink.clone(), 8).unwrap();
    let pool = WorkerPool::new(1, 8, Backpressure::DropOldest).unwrap();
    let mut dispatcher =
        Dispatcher::new(Scheduler::new(MatchPolicy::Exact, &patterns, 1), pool).with_midi(handle);

    let started = std::time::Instant::now();
    dispatcher.dispatch(&Tick::on_time(0, 1), &patterns);
    dispatcher.shutdown();
    writer.join();

    let timed = sink.timed_messages();
    assert_eq!(timed.len(), 2);
    assert!(timed[0].0.duration_since(started) >= std::time::Duration::from_millis(30));
    assert!(timed[1].0.duration_since(timed[0].0) >= std::time::Duration::from_millis(10));
}

#[test]
fn test_patterns_without_sinks_are_noops() {
    let patterns = vec![
        Pattern::note(60, 100, 0.01, [0.0]).unwrap(),
        Pattern::sample("bd", 1.0, [0.0]).unwrap(),
    ];
    let pool = WorkerPool::new(1, 4, Backpressure::DropOldest).unwrap();
    let mut dispatcher = Dispatcher::new(Scheduler::new(MatchPolicy::Exact, &patterns, 1), pool);

    for _ in 0..3 {
        assert_eq!(dispatcher.dispatch(&Tick::on_time(0, 1), &patterns), vec![0, 1]);
    }

    let stats = dispatcher.shutdown();
    assert_eq!(stats.fired, 6);
    assert_eq!(stats.skipped, 6);
    assert_eq!(stats.pool.submitted, 0);
}

#[test]
fn test_tolerance_policy_plays_samples() {
    let patterns = vec![
        Pattern::sample("sd", 0.5, [2.0]).unwrap(),
        Pattern::sample("hh", 0.25, [2.1]).unwrap(),
    ];
    let sink = RecordingAudioSink::new(["sd", "hh"]);
    let (handle, writer) = spawn_audio_writer(sink.clone(), 8).unwrap();
    let pool = WorkerPool::new(2, 8, Backpressure::DropOldest).unwrap();
    let mut dispatcher = Dispatcher::new(Scheduler::new(MatchPolicy::Tolerance, &patterns, 4), pool)
        .with_audio(handle, [SampleId::new("sd"), SampleId::new("hh")]);

    let late = Tick {
        position: 2.04,
        ..Tick::on_time(16, 4)
    };
    assert_eq!(dispatcher.dispatch(&late, &patterns), vec![0]);

    let too_late = Tick {
        position: 2.06,
        ..Tick::on_time(16, 4)
    };
    assert_eq!(dispatcher.dispatch(&too_late, &patterns), vec![1]);

    dispatcher.shutdown();
    writer.join();

    let mut plays = sink.plays();
    plays.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        plays,
        vec![(SampleId::new("hh"), 0.25), (SampleId::new("sd"), 0.5)]
    );
}
