use crate::sampler::bank::{SampleBank, SampleMapping};
use crate::sampler::loader::*;
use crate::sampler::voice::SampleVoice;
use crate::pattern::SampleId;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

fn write_wav(path: &Path, channels: u16, frames: &[i16]) {
    let spec = WavSpec {
        channels,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for &s in frames {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

fn create_test_sample(data: Vec<f32>, sample_rate: u32) -> Arc<Sample> {
    Arc::new(Sample {
        name: "test_sample".to_string(),
        data,
        sample_rate,
        source_channels: 1,
    })
}

#[test]
fn test_unsupported_format() {
    let result = load_sample(&PathBuf::from("test.xyz"));
    assert!(matches!(result, Err(SamplerError::UnsupportedFormat(ext)) if ext == "xyz"));
}

#[test]
fn test_missing_wav_is_error() {
    assert!(load_sample(&PathBuf::from("/nonexistent/bd.wav")).is_err());
}

#[test]
fn test_load_mono_wav() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bd.wav");
    write_wav(&path, 1, &[0, 16384, -16384, 32767]);

    let sample = load_sample(&path).unwrap();

    assert_eq!(sample.name, "bd.wav");
    assert_eq!(sample.sample_rate, 48000);
    assert_eq!(sample.len(), 4);
    assert_eq!(sample.data[1], 0.5);
    assert_eq!(sample.data[2], -0.5);
}

#[test]
fn test_stereo_wav_is_downmixed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hh.WAV");
    write_wav(&path, 2, &[16384, 0, -16384, -16384]);

    let sample = load_sample(&path).unwrap();

    assert_eq!(sample.source_channels, 2);
    assert_eq!(sample.data, vec![0.25, -0.5]);
}

#[test]
fn test_empty_wav_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("silence.wav");
    write_wav(&path, 1, &[]);

    assert!(matches!(load_sample(&path), Err(SamplerError::Empty(_))));
}

#[test]
fn test_bank_loads_relative_paths() {
    let dir = tempdir().unwrap();
    write_wav(&dir.path().join("sd.wav"), 1, &[1000, 2000]);

    let mut bank = SampleBank::new("Drums");
    bank.add_mapping(SampleMapping {
        id: SampleId::new("sd"),
        path: PathBuf::from("sd.wav"),
        volume: 0.5,
    });
    bank.add_mapping(SampleMapping {
        id: SampleId::new("bd"),
        path: PathBuf::from("bd.wav"),
        volume: 1.0,
    });

    let loaded = bank.load_samples(dir.path());

    assert_eq!(loaded.len(), 1);
    let sd = &loaded[&SampleId::new("sd")];
    assert_eq!(sd.volume, 0.5);
    assert_eq!(sd.sample.len(), 2);
}

#[test]
fn test_voice_plays_once_with_gain() {
    let sample = create_test_sample(vec![1.0, 0.5, -1.0], 48000);
    let mut voice = SampleVoice::new(sample, 0.5, 48000.0);

    assert_eq!(voice.next_sample(), Some(0.5));
    assert_eq!(voice.next_sample(), Some(0.25));
    assert_eq!(voice.next_sample(), Some(-0.5));
    assert_eq!(voice.next_sample(), None);
    assert!(voice.is_finished());
}

#[test]
fn test_voice_interpolates_when_resampling() {
    // 24 kHz source on a 48 kHz output: every other value is interpolated
    let sample = create_test_sample(vec![0.0, 1.0], 24000);
    let mut voice = SampleVoice::new(sample, 1.0, 48000.0);

    assert_eq!(voice.next_sample(), Some(0.0));
    assert_eq!(voice.next_sample(), Some(0.5));
    assert_eq!(voice.next_sample(), Some(1.0));
    // Past the last frame the next value is silence
    assert_eq!(voice.next_sample(), Some(0.5));
    assert_eq!(voice.next_sample(), None);
}
