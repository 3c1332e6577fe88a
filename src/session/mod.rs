// Session - owns the clock, the pattern set, the dispatcher and the sinks
//
// A session is built once, then `run` plays it on the calling thread until
// the requested laps complete or the cancellation token fires. Shutdown
// drains the worker pool first and the sink writers second, so every queued
// note-off still reaches its device.

pub mod config;

pub use config::{ConfigError, SessionConfig};

use crate::clock::{
    CancellationToken, ClockError, ClockReport, LoopClock, PlaybackClock, TimeSource,
};
use crate::dispatch::{
    DispatchStats, Dispatcher, MatchPolicy, PoolError, Scheduler, TOLERANCE_BEATS, WorkerPool,
};
use crate::extract::{ExtractError, Recording, extract_patterns_with_delay};
use crate::pattern::{self, Pattern, PatternError};
use crate::render::{FrameSink, NullFrameSink, RenderFeed};
use crate::sampler::SamplerError;
use crate::sink::{
    AudioSink, MidiSink, SinkError, SinkStatus, WriterStats, WriterThread, spawn_audio_writer,
    spawn_midi_writer,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("Invalid clock: {0}")]
    Clock(#[from] ClockError),

    #[error("Worker pool: {0}")]
    Pool(#[from] PoolError),

    #[error("Sink: {0}")]
    Sink(#[from] SinkError),

    #[error("Sample bank: {0}")]
    Sampler(#[from] SamplerError),
}

/// Builds the session's pattern set.
///
/// Notes extracted from `recording` are normalized so the earliest starts on
/// beat 0, and those falling past the loop end are dropped. Declared patterns
/// keep their beats and must fit inside the loop. Declared notes without a
/// delay of their own get the session `trigger_delay`, like extracted ones.
pub fn prepare_patterns(
    config: &SessionConfig,
    recording: Option<&Recording>,
) -> Result<Vec<Pattern>, SessionError> {
    let mut patterns = Vec::new();

    if let Some(recording) = recording {
        let delay = (config.trigger_delay > 0.0).then_some(config.trigger_delay);
        let mut extracted = extract_patterns_with_delay(
            recording,
            &config.track_name,
            config.bpm,
            config.beat_limit,
            delay,
        )?;

        if extracted.is_empty() {
            log::warn!("Track '{}' has no complete notes", config.track_name);
        } else {
            let offset = pattern::normalize(&mut extracted)?;
            if offset > 0.0 {
                log::debug!("Shifted extracted notes back by {:.3} beats", offset);
            }

            let dropped = pattern::retain_within_loop(&mut extracted, config.loop_beats);
            if dropped > 0 {
                log::warn!(
                    "Dropped {} extracted notes past the end of the {}-beat loop",
                    dropped,
                    config.loop_beats
                );
            }
        }
        patterns.append(&mut extracted);
    }

    for spec in &config.patterns {
        let mut spec = spec.clone();
        if spec.pitch.is_some() && spec.trigger_delay.is_none() && config.trigger_delay > 0.0 {
            spec.trigger_delay = Some(config.trigger_delay);
        }
        let declared = spec.to_pattern(config.bpm)?;
        declared.check_loop_bounds(config.loop_beats)?;
        patterns.push(declared);
    }

    if patterns.is_empty() {
        return Err(PatternError::EmptyPatternSet.into());
    }

    match config.match_policy {
        MatchPolicy::Exact => {
            let unaligned: usize = patterns.iter().map(Pattern::unaligned_beats).sum();
            if unaligned > 0 {
                log::warn!(
                    "{} beats are off the subdivision grid and never fire with exact matching",
                    unaligned
                );
            }
        }
        MatchPolicy::Tolerance => {
            let far: usize = patterns
                .iter()
                .map(|p| p.beats_off_grid(TOLERANCE_BEATS))
                .sum();
            if far > 0 {
                log::warn!(
                    "{} beats are {} beats or more from every tick and only fire on late ticks",
                    far,
                    TOLERANCE_BEATS
                );
            }
        }
    }

    Ok(patterns)
}

/// Totals reported when a session ends
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionReport {
    pub clock: ClockReport,
    pub dispatch: DispatchStats,
    pub midi: Option<WriterStats>,
    pub audio: Option<WriterStats>,
}

pub struct SessionBuilder {
    config: SessionConfig,
    patterns: Vec<Pattern>,
    midi: Option<Box<dyn MidiSink>>,
    audio: Option<Box<dyn AudioSink>>,
    frames: Box<dyn FrameSink>,
    render_seed: Option<u64>,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig, patterns: Vec<Pattern>) -> Self {
        Self {
            config,
            patterns,
            midi: None,
            audio: None,
            frames: Box::new(NullFrameSink),
            render_seed: None,
        }
    }

    /// Attaches the MIDI sink, or runs without one if it could not be opened
    pub fn with_midi<S>(mut self, sink: Result<S, SinkError>) -> Self
    where
        S: MidiSink + 'static,
    {
        match sink {
            Ok(sink) => self.midi = Some(Box::new(sink)),
            Err(e) => log::warn!("Running without MIDI output: {}", e),
        }
        self
    }

    /// Attaches the audio sink, or runs without one if it could not be opened
    pub fn with_audio<S>(mut self, sink: Result<S, SinkError>) -> Self
    where
        S: AudioSink + 'static,
    {
        match sink {
            Ok(sink) => self.audio = Some(Box::new(sink)),
            Err(e) => log::warn!("Running without audio output: {}", e),
        }
        self
    }

    pub fn with_frame_sink(mut self, frames: impl FrameSink + 'static) -> Self {
        self.frames = Box::new(frames);
        self
    }

    /// Fixed seed for the blink colours
    pub fn with_render_seed(mut self, seed: u64) -> Self {
        self.render_seed = Some(seed);
        self
    }

    pub fn build<T: TimeSource>(self, time: T) -> Result<Session<T>, SessionError> {
        let SessionBuilder {
            config,
            patterns,
            midi,
            audio,
            frames,
            render_seed,
        } = self;

        config.validate()?;
        if patterns.is_empty() {
            return Err(PatternError::EmptyPatternSet.into());
        }
        for pattern in &patterns {
            pattern.check_loop_bounds(config.loop_beats)?;
        }

        let state = LoopClock::new(config.bpm, config.loop_beats)?;
        let pool = WorkerPool::new(config.workers, config.queue_capacity, config.backpressure)?;
        let scheduler = Scheduler::new(config.match_policy, &patterns, config.loop_beats);
        let mut dispatcher = Dispatcher::new(scheduler, pool);

        let mut midi_writer = None;
        if let Some(sink) = midi {
            let (handle, writer) = spawn_midi_writer(sink, config.queue_capacity)?;
            dispatcher = dispatcher.with_midi(handle);
            midi_writer = Some(writer);
        }

        let mut audio_writer = None;
        if let Some(sink) = audio {
            let ids = sink.sample_ids();
            let (handle, writer) = spawn_audio_writer(sink, config.queue_capacity)?;
            dispatcher = dispatcher.with_audio(handle, ids);
            audio_writer = Some(writer);
        }

        let render = match render_seed {
            Some(seed) => RenderFeed::with_seed(config.render, seed),
            None => RenderFeed::new(config.render),
        }
        .with_policy(config.match_policy);

        Ok(Session {
            clock: PlaybackClock::new(state, time),
            patterns,
            dispatcher,
            render,
            frames,
            midi_writer,
            audio_writer,
            laps: config.laps,
        })
    }
}

pub struct Session<T: TimeSource> {
    clock: PlaybackClock<T>,
    patterns: Vec<Pattern>,
    dispatcher: Dispatcher,
    render: RenderFeed,
    frames: Box<dyn FrameSink>,
    midi_writer: Option<WriterThread>,
    audio_writer: Option<WriterThread>,
    laps: Option<u64>,
}

impl<T: TimeSource> Session<T> {
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn has_midi(&self) -> bool {
        self.midi_writer.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_writer.is_some()
    }

    /// Plays until the configured laps complete or `cancel` fires
    pub fn run(self, cancel: &CancellationToken) -> SessionReport {
        let Session {
            mut clock,
            patterns,
            mut dispatcher,
            mut render,
            mut frames,
            midi_writer,
            audio_writer,
            laps,
        } = self;

        let state = clock.state();
        log::info!(
            "Playing {} patterns: {} BPM, {}-beat loop, {:?} matching, {}",
            patterns.len(),
            state.bpm(),
            state.loop_beats(),
            dispatcher.policy(),
            match laps {
                Some(laps) => format!("{} laps", laps),
                None => "until stopped".to_string(),
            }
        );

        let mut frame_error_reported = false;
        let clock_report = clock.run(cancel, laps, |tick| {
            let fired = dispatcher.dispatch(tick, &patterns);
            let frame = render.snapshot(tick, &patterns, &fired);
            if let Err(e) = frames.present(&frame) {
                if !frame_error_reported {
                    log::warn!("Frame output failed: {}", e);
                    frame_error_reported = true;
                }
            }
        });

        let dispatch = dispatcher.shutdown();
        let midi = midi_writer.map(WriterThread::join);
        let audio = audio_writer.map(WriterThread::join);
        for (name, stats) in [("MIDI", &midi), ("Audio", &audio)] {
            if let Some(stats) = stats {
                if stats.status == SinkStatus::Faulted {
                    log::warn!("{} output faulted: {} writes failed", name, stats.failed);
                }
            }
        }

        log::info!(
            "Session ended after {} ticks ({} laps{}): {} fired, {} skipped, {} dropped",
            clock_report.ticks,
            clock_report.laps,
            if clock_report.cancelled { ", cancelled" } else { "" },
            dispatch.fired,
            dispatch.skipped,
            dispatch.pool.dropped + dispatch.pool.rejected
        );

        SessionReport {
            clock: clock_report,
            dispatch,
            midi,
            audio,
        }
    }
}
