pub mod bank;
pub mod loader;
pub mod voice;

pub use bank::{LoadedSample, SampleBank, SampleMapping};
pub use loader::{Sample, SamplerError, load_sample};
pub use voice::SampleVoice;

#[cfg(test)]
mod tests;
