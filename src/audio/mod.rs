// Audio output - cpal backend and sample mixing

pub mod engine;
pub mod mix;

pub use engine::{AudioOutput, SamplerSink};
pub use mix::Mixer;
