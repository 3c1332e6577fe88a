// Dispatcher - Turns fired patterns into trigger jobs on the worker pool
//
// The dispatcher runs on the control thread. It decides which patterns fire,
// hands the device work to the pool and returns immediately; device writes
// happen on workers (which enqueue) and sink writer threads (which write).

pub mod policy;
pub mod pool;

pub use policy::{MatchPolicy, Scheduler, TOLERANCE_BEATS};
pub use pool::{Backpressure, Job, PoolError, PoolStats, Submission, WorkerPool};

use crate::clock::Tick;
use crate::midi::event::MidiMessage;
use crate::pattern::{NoteTrigger, Pattern, SampleId, SampleTrigger, Trigger};
use crate::sink::{PlayCommand, WriterHandle};
use std::collections::HashSet;
use std::thread;

/// Reasons a fired pattern did nothing; each is logged once
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SkipCause {
    NoMidiSink,
    NoAudioSink,
    UnknownSample(SampleId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub ticks: u64,
    /// Patterns that fired (including skipped ones)
    pub fired: u64,
    /// Fired patterns with nowhere to go
    pub skipped: u64,
    pub pool: PoolStats,
}

struct AudioTarget {
    handle: WriterHandle<PlayCommand>,
    samples: HashSet<SampleId>,
}

pub struct Dispatcher {
    scheduler: Scheduler,
    pool: WorkerPool,
    midi: Option<WriterHandle<MidiMessage>>,
    audio: Option<AudioTarget>,
    reported: HashSet<SkipCause>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(scheduler: Scheduler, pool: WorkerPool) -> Self {
        Self {
            scheduler,
            pool,
            midi: None,
            audio: None,
            reported: HashSet::new(),
            stats: DispatchStats::default(),
        }
    }

    pub fn with_midi(mut self, handle: WriterHandle<MidiMessage>) -> Self {
        self.midi = Some(handle);
        self
    }

    /// `samples` are the ids the audio sink can play
    pub fn with_audio(
        mut self,
        handle: WriterHandle<PlayCommand>,
        samples: impl IntoIterator<Item = SampleId>,
    ) -> Self {
        self.audio = Some(AudioTarget {
            handle,
            samples: samples.into_iter().collect(),
        });
        self
    }

    pub fn policy(&self) -> MatchPolicy {
        self.scheduler.policy()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            pool: self.pool.stats(),
            ..self.stats
        }
    }

    /// Submits a job for every pattern firing on `tick` and returns their
    /// indices. Never waits for device I/O.
    pub fn dispatch(&mut self, tick: &Tick, patterns: &[Pattern]) -> Vec<usize> {
        self.stats.ticks += 1;
        let fired = self.scheduler.due(tick, patterns);

        for &index in &fired {
            self.stats.fired += 1;
            let job = match patterns[index].trigger() {
                Trigger::Note(note) => self.note_job(*note),
                Trigger::Sample(sample) => self.sample_job(sample),
            };

            let Some(job) = job else {
                self.stats.skipped += 1;
                continue;
            };

            match self.pool.submit(job) {
                Submission::Queued => {}
                Submission::DisplacedOldest => {
                    log::warn!("Trigger queue full at tick {}; dropped oldest job", tick.index);
                }
                Submission::Rejected => {
                    log::warn!("Trigger queue full at tick {}; job rejected", tick.index);
                }
            }
        }

        fired
    }

    fn note_job(&mut self, note: NoteTrigger) -> Option<Job> {
        let Some(midi) = self.midi.clone() else {
            self.report(SkipCause::NoMidiSink);
            return None;
        };

        Some(Box::new(move || {
            if let Some(delay) = note.trigger_delay() {
                thread::sleep(delay);
            }
            let on = MidiMessage::NoteOn {
                pitch: note.pitch(),
                velocity: note.velocity(),
            };
            if let Err(e) = midi.send(on) {
                log::debug!("Note-on {} not queued: {}", note.pitch(), e);
                return;
            }
            thread::sleep(note.duration());
            // Closed only when the session is already gone
            if let Err(e) = midi.send(MidiMessage::NoteOff {
                pitch: note.pitch(),
            }) {
                log::debug!("Note-off {} not queued: {}", note.pitch(), e);
            }
        }))
    }

    fn sample_job(&mut self, sample: &SampleTrigger) -> Option<Job> {
        let Some(audio) = self.audio.as_ref() else {
            self.report(SkipCause::NoAudioSink);
            return None;
        };
        if !audio.samples.contains(sample.sample_id()) {
            self.report(SkipCause::UnknownSample(sample.sample_id().clone()));
            return None;
        }

        let handle = audio.handle.clone();
        let command = PlayCommand {
            sample_id: sample.sample_id().clone(),
            gain: sample.gain(),
        };
        Some(Box::new(move || {
            let sample_id = command.sample_id.clone();
            if let Err(e) = handle.send(command) {
                log::debug!("Sample '{}' not queued: {}", sample_id, e);
            }
        }))
    }

    fn report(&mut self, cause: SkipCause) {
        if self.reported.contains(&cause) {
            return;
        }
        match &cause {
            SkipCause::NoMidiSink => log::warn!("Note pattern fired without a MIDI sink; skipping"),
            SkipCause::NoAudioSink => {
                log::warn!("Sample pattern fired without an audio sink; skipping")
            }
            SkipCause::UnknownSample(id) => {
                log::warn!("Sample '{}' is not in the sample bank; skipping", id)
            }
        }
        self.reported.insert(cause);
    }

    /// Waits for every submitted job and releases the sink handles, so the
    /// writer threads can drain and stop.
    pub fn shutdown(self) -> DispatchStats {
        let Dispatcher {
            pool,
            midi,
            audio,
            stats,
            ..
        } = self;

        let pool = pool.shutdown();
        drop(midi);
        drop(audio);

        DispatchStats { pool, ..stats }
    }
}
