// Beatloop - Library exports for the binary and integration tests

pub mod audio;
pub mod clock;
pub mod dispatch;
pub mod extract;
pub mod messaging;
pub mod midi;
pub mod pattern;
pub mod render;
pub mod sampler;
pub mod session;
pub mod sink;

// Re-export commonly used types for convenience
pub use clock::{CancellationToken, LoopClock, PlaybackClock, SystemTimeSource, Tick, VirtualTimeSource};
pub use dispatch::{Backpressure, Dispatcher, MatchPolicy, Scheduler, WorkerPool};
pub use extract::{ExtractError, Recording, extract_patterns, load_recording};
pub use midi::{MidiMessage, MidirSink};
pub use pattern::{Pattern, PatternError, PatternSpec, SampleId, Trigger, normalize};
pub use render::{Frame, FrameSink, GridLayout, RenderFeed, TextFrameSink};
pub use session::{Session, SessionBuilder, SessionConfig, SessionError, SessionReport, prepare_patterns};
pub use sink::{AudioSink, MidiSink, SinkError};
