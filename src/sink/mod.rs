// Sinks - Output devices the dispatcher triggers (MIDI and audio)
//
// Each concrete sink is owned by exactly one writer thread; worker jobs only
// enqueue commands through a `WriterHandle`.

pub mod memory;
pub mod status;
pub mod writer;

pub use memory::{RecordingAudioSink, RecordingMidiSink};
pub use status::{AtomicSinkStatus, SinkStatus};
pub use writer::{WriterHandle, WriterStats, WriterThread};

use crate::midi::event::MidiMessage;
use crate::pattern::SampleId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown sample '{0}'")]
    UnknownSample(SampleId),

    #[error("Sink write failed: {0}")]
    Write(String),

    #[error("Sink queue closed")]
    Closed,
}

/// Receives MIDI messages
pub trait MidiSink: Send {
    fn send(&mut self, message: MidiMessage) -> Result<(), SinkError>;
}

/// Plays samples from a bank
pub trait AudioSink: Send {
    /// Starts playback of `sample_id` at `gain` (0.0-1.0). Fire-and-forget.
    fn play(&mut self, sample_id: &SampleId, gain: f32) -> Result<(), SinkError>;

    /// Samples this sink can play
    fn sample_ids(&self) -> Vec<SampleId>;
}

impl<S: MidiSink + ?Sized> MidiSink for Box<S> {
    fn send(&mut self, message: MidiMessage) -> Result<(), SinkError> {
        (**self).send(message)
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn play(&mut self, sample_id: &SampleId, gain: f32) -> Result<(), SinkError> {
        (**self).play(sample_id, gain)
    }

    fn sample_ids(&self) -> Vec<SampleId> {
        (**self).sample_ids()
    }
}

/// Command queued to the audio writer
#[derive(Debug, Clone, PartialEq)]
pub struct PlayCommand {
    pub sample_id: SampleId,
    pub gain: f32,
}

/// Spawns the writer thread that owns `sink`
pub fn spawn_midi_writer<S>(
    mut sink: S,
    capacity: usize,
) -> Result<(WriterHandle<MidiMessage>, WriterThread), SinkError>
where
    S: MidiSink + 'static,
{
    WriterThread::spawn("midi-writer", capacity, move |message| sink.send(message))
}

/// Spawns the writer thread that owns `sink`
pub fn spawn_audio_writer<S>(
    mut sink: S,
    capacity: usize,
) -> Result<(WriterHandle<PlayCommand>, WriterThread), SinkError>
where
    S: AudioSink + 'static,
{
    WriterThread::spawn("audio-writer", capacity, move |command: PlayCommand| {
        sink.play(&command.sample_id, command.gain)
    })
}
