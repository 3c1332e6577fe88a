// Mixer - sums active sample voices into the output buffer
//
// Runs inside the audio callback: no allocation after construction,
// no I/O, no locks.

use crate::sampler::voice::SampleVoice;
use cpal::{FromSample, Sample};

/// Voices mixed at once; the oldest voice is stolen beyond this
pub const MAX_VOICES: usize = 32;

/// Flush denormals to zero
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Soft clipping with tanh, keeps the sum of overlapping hits inside [-1, 1]
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// Writes one mono value to every channel of an interleaved frame
#[inline]
pub fn write_mono_to_interleaved_frame<T>(value: f32, frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    for channel_sample in frame.iter_mut() {
        *channel_sample = T::from_sample(value);
    }
}

pub struct Mixer {
    voices: Vec<SampleVoice>,
    max_voices: usize,
}

impl Mixer {
    pub fn new(max_voices: usize) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            voices: Vec::with_capacity(max_voices),
            max_voices,
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Starts a voice, stealing the oldest one when all are busy
    pub fn trigger(&mut self, voice: SampleVoice) {
        if self.voices.len() >= self.max_voices {
            self.voices.remove(0);
        }
        self.voices.push(voice);
    }

    /// Next mixed mono value
    pub fn next_sample(&mut self) -> f32 {
        let mut sum = 0.0;
        self.voices.retain_mut(|voice| match voice.next_sample() {
            Some(value) => {
                sum += value;
                true
            }
            None => false,
        });
        flush_denormals_to_zero(soft_clip(sum))
    }

    /// Fills an interleaved buffer of `channels` channels
    pub fn render<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: Sample + FromSample<f32>,
    {
        for frame in data.chunks_mut(channels.max(1)) {
            let value = self.next_sample();
            write_mono_to_interleaved_frame(value, frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::loader::Sample as AudioSample;
    use std::sync::Arc;

    fn voice(data: Vec<f32>, gain: f32) -> SampleVoice {
        let sample = Arc::new(AudioSample {
            name: "test".to_string(),
            data,
            sample_rate: 48000,
            source_channels: 1,
        });
        SampleVoice::new(sample, gain, 48000.0)
    }

    #[test]
    fn test_soft_clip_bounds() {
        assert_eq!(soft_clip(0.0), 0.0);
        assert!(soft_clip(10.0) < 1.0);
        assert!(soft_clip(-10.0) > -1.0);
        assert!((soft_clip(0.01) - 0.01).abs() < 1e-4);
    }

    #[test]
    fn test_flush_denormals() {
        assert_eq!(flush_denormals_to_zero(1e-20), 0.0);
        assert_eq!(flush_denormals_to_zero(0.5), 0.5);
    }

    #[test]
    fn test_silent_mixer_renders_zero() {
        let mut mixer = Mixer::new(4);
        let mut buffer = [1.0f32; 8];
        mixer.render(&mut buffer, 2);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_voices_are_summed_and_finish() {
        let mut mixer = Mixer::new(4);
        mixer.trigger(voice(vec![0.2, 0.2], 1.0));
        mixer.trigger(voice(vec![0.1], 1.0));

        assert!((mixer.next_sample() - soft_clip(0.3)).abs() < 1e-6);
        assert_eq!(mixer.active_voices(), 2);
        assert!((mixer.next_sample() - soft_clip(0.2)).abs() < 1e-6);
        // Both voices are exhausted on the next pull
        assert_eq!(mixer.next_sample(), 0.0);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_oldest_voice_is_stolen() {
        let mut mixer = Mixer::new(2);
        mixer.trigger(voice(vec![0.5; 4], 1.0));
        mixer.trigger(voice(vec![0.1; 4], 1.0));
        mixer.trigger(voice(vec![0.2; 4], 1.0));

        assert_eq!(mixer.active_voices(), 2);
        assert!((mixer.next_sample() - soft_clip(0.3)).abs() < 1e-6);
    }

    #[test]
    fn test_render_writes_every_channel() {
        let mut mixer = Mixer::new(1);
        mixer.trigger(voice(vec![0.5, 0.5], 1.0));

        let mut buffer = [0i16; 4];
        mixer.render(&mut buffer, 2);

        assert_eq!(buffer[0], buffer[1]);
        assert_eq!(buffer[2], buffer[3]);
        assert!(buffer[0] > 0);
    }
}
