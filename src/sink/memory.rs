// In-memory sinks - record what was sent, for tests and dry runs

use super::{AudioSink, MidiSink, SinkError};
use crate::midi::event::MidiMessage;
use crate::pattern::SampleId;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Records every MIDI message with the time it reached the sink
#[derive(Debug, Clone, Default)]
pub struct RecordingMidiSink {
    log: Arc<Mutex<Vec<(Instant, MidiMessage)>>>,
}

impl RecordingMidiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<MidiMessage> {
        self.log
            .lock()
            .map(|log| log.iter().map(|(_, message)| *message).collect())
            .unwrap_or_default()
    }

    pub fn timed_messages(&self) -> Vec<(Instant, MidiMessage)> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl MidiSink for RecordingMidiSink {
    fn send(&mut self, message: MidiMessage) -> Result<(), SinkError> {
        let mut log = self
            .log
            .lock()
            .map_err(|_| SinkError::Write("recording log poisoned".to_string()))?;
        log.push((Instant::now(), message));
        Ok(())
    }
}

/// Records sample plays; only knows the samples it was created with
#[derive(Debug, Clone, Default)]
pub struct RecordingAudioSink {
    samples: Vec<SampleId>,
    plays: Arc<Mutex<Vec<(SampleId, f32)>>>,
}

impl RecordingAudioSink {
    pub fn new<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SampleId>,
    {
        Self {
            samples: samples.into_iter().map(Into::into).collect(),
            plays: Arc::default(),
        }
    }

    pub fn plays(&self) -> Vec<(SampleId, f32)> {
        self.plays.lock().map(|plays| plays.clone()).unwrap_or_default()
    }
}

impl AudioSink for RecordingAudioSink {
    fn play(&mut self, sample_id: &SampleId, gain: f32) -> Result<(), SinkError> {
        if !self.samples.contains(sample_id) {
            return Err(SinkError::UnknownSample(sample_id.clone()));
        }
        let mut plays = self
            .plays
            .lock()
            .map_err(|_| SinkError::Write("recording log poisoned".to_string()))?;
        plays.push((sample_id.clone(), gain));
        Ok(())
    }

    fn sample_ids(&self) -> Vec<SampleId> {
        self.samples.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_midi_sink_shares_log() {
        let sink = RecordingMidiSink::new();
        let mut writer = sink.clone();

        writer
            .send(MidiMessage::NoteOn {
                pitch: 60,
                velocity: 90,
            })
            .unwrap();
        writer.send(MidiMessage::NoteOff { pitch: 60 }).unwrap();

        assert_eq!(
            sink.messages(),
            vec![
                MidiMessage::NoteOn {
                    pitch: 60,
                    velocity: 90
                },
                MidiMessage::NoteOff { pitch: 60 },
            ]
        );
    }

    #[test]
    fn test_recording_audio_sink_rejects_unknown() {
        let sink = RecordingAudioSink::new(["bd", "sd"]);
        let mut writer = sink.clone();

        writer.play(&SampleId::new("bd"), 0.5).unwrap();
        assert_eq!(
            writer.play(&SampleId::new("cowbell"), 1.0),
            Err(SinkError::UnknownSample(SampleId::new("cowbell")))
        );
        assert_eq!(sink.plays(), vec![(SampleId::new("bd"), 0.5)]);
    }
}
