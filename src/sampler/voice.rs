// Sample voice - one playing instance of a sample
// Plays once from the start; resampled to the output rate by linear interpolation.

use crate::sampler::loader::Sample;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SampleVoice {
    sample: Arc<Sample>,
    position: f64,
    step: f64,
    gain: f32,
}

impl SampleVoice {
    pub fn new(sample: Arc<Sample>, gain: f32, output_rate: f32) -> Self {
        let step = if output_rate > 0.0 {
            sample.sample_rate as f64 / output_rate as f64
        } else {
            1.0
        };
        Self {
            sample,
            position: 0.0,
            step,
            gain,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.sample.data.len() as f64
    }

    /// Next output sample, or None once the sample has played out
    pub fn next_sample(&mut self) -> Option<f32> {
        let data = &self.sample.data;
        if self.is_finished() {
            return None;
        }

        let index = self.position as usize;
        let fraction = self.position.fract() as f32;
        let current = data.get(index).copied().unwrap_or(0.0);
        let next = data.get(index + 1).copied().unwrap_or(0.0);

        self.position += self.step;
        Some((current + (next - current) * fraction) * self.gain)
    }
}
