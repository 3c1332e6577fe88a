// Audio output - cpal stream playing sample voices
//
// The stream is fed through a lock-free ring buffer by `SamplerSink`, which
// lives on the audio writer thread. The stream itself stays on the thread
// that created it (it is not Send on every platform).
//
// The device's preferred sample format is used (F32, I16 or U16). Mixing
// is done in f32 and converted while writing the output buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer};
use std::collections::HashMap;
use std::sync::Arc;

use crate::audio::mix::{MAX_VOICES, Mixer};
use crate::messaging::channels::{AudioCommandConsumer, AudioCommandProducer, create_audio_channel};
use crate::messaging::command::AudioCommand;
use crate::pattern::SampleId;
use crate::sampler::bank::LoadedSample;
use crate::sampler::voice::SampleVoice;
use crate::sink::{AtomicSinkStatus, AudioSink, SinkError, SinkStatus};

const COMMAND_CAPACITY: usize = 256;

pub struct AudioOutput {
    _device: Device,
    _stream: Stream,
    sample_rate: f32,
    channels: usize,
    status: AtomicSinkStatus,
}

impl AudioOutput {
    /// Opens the default output device and starts the stream.
    ///
    /// Returns the running output and the sink that triggers it.
    pub fn start(
        samples: HashMap<SampleId, LoadedSample>,
    ) -> Result<(Self, SamplerSink), SinkError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SinkError::Unavailable("no audio output device".to_string()))?;

        log::info!(
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported_config = device
            .default_output_config()
            .map_err(|e| SinkError::Unavailable(format!("audio configuration error: {}", e)))?;

        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        let (producer, consumer) = create_audio_channel(COMMAND_CAPACITY);
        let status = AtomicSinkStatus::new(SinkStatus::Unavailable);

        let stream = match sample_format {
            SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, channels, consumer, status.clone())
            }
            SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, channels, consumer, status.clone())
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config, channels, consumer, status.clone())
            }
            other => {
                return Err(SinkError::Unavailable(format!(
                    "unsupported sample format {:?} (supported: F32, I16, U16)",
                    other
                )));
            }
        }?;

        stream
            .play()
            .map_err(|e| SinkError::Unavailable(format!("cannot start audio stream: {}", e)))?;
        status.set(SinkStatus::Connected);

        log::info!(
            "Audio output started: {} Hz, {} channels, {:?}",
            sample_rate,
            channels,
            sample_format
        );

        let output = Self {
            _device: device,
            _stream: stream,
            sample_rate,
            channels,
            status,
        };
        Ok((output, SamplerSink::new(producer, samples)))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn status(&self) -> SinkStatus {
        self.status.get()
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        channels: usize,
        mut commands: AudioCommandConsumer,
        status: AtomicSinkStatus,
    ) -> Result<Stream, SinkError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let sample_rate = config.sample_rate.0 as f32;
        let mut mixer = Mixer::new(MAX_VOICES);

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // No allocations, no I/O, no blocking locks
                    while let Some(command) = commands.try_pop() {
                        match command {
                            AudioCommand::Play { sample, gain } => {
                                mixer.trigger(SampleVoice::new(sample, gain, sample_rate));
                            }
                        }
                    }
                    mixer.render(data, channels);
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                    status.set(SinkStatus::Faulted);
                },
                None,
            )
            .map_err(|e| SinkError::Unavailable(format!("cannot build audio stream: {}", e)))
    }
}

/// Audio sink backed by a sample bank and the cpal output
pub struct SamplerSink {
    commands: AudioCommandProducer,
    samples: HashMap<SampleId, LoadedSample>,
}

impl SamplerSink {
    pub fn new(commands: AudioCommandProducer, samples: HashMap<SampleId, LoadedSample>) -> Self {
        Self { commands, samples }
    }

    fn push(&mut self, command: AudioCommand) -> Result<(), SinkError> {
        self.commands
            .try_push(command)
            .map_err(|_| SinkError::Write("audio command queue full".to_string()))
    }
}

impl AudioSink for SamplerSink {
    fn play(&mut self, sample_id: &SampleId, gain: f32) -> Result<(), SinkError> {
        let loaded = self
            .samples
            .get(sample_id)
            .ok_or_else(|| SinkError::UnknownSample(sample_id.clone()))?;

        let command = AudioCommand::Play {
            sample: Arc::clone(&loaded.sample),
            gain: gain * loaded.volume,
        };
        self.push(command)
    }

    fn sample_ids(&self) -> Vec<SampleId> {
        let mut ids: Vec<SampleId> = self.samples.keys().cloned().collect();
        ids.sort();
        ids
    }
}
