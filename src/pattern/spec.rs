// Pattern declarations - the serializable form used by session files
// A declaration names a MIDI pitch or a sample, never both

use super::{NoteTrigger, Pattern, PatternError, SampleId, SampleTrigger, Trigger};
use crate::clock::SUBDIVISION;
use serde::{Deserialize, Serialize};

const DEFAULT_VELOCITY: u8 = 100;
const DEFAULT_GAIN: f32 = 1.0;

/// Repeats a beat list `times` times, each copy shifted by `size` beats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepeatSpec {
    pub size: f64,
    pub times: u32,
}

/// Pattern as written in a session file
///
/// ```ron
/// (sample: Some("sd"), gain: Some(0.5), beats: [1.0, 3.0], repeat: Some((size: 4.0, times: 2)))
/// (pitch: Some(60), velocity: Some(100), duration: Some(0.25), beats: [0.0, 2.0])
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSpec {
    #[serde(default)]
    pub pitch: Option<u8>,
    #[serde(default)]
    pub velocity: Option<u8>,
    /// Note length in seconds. Defaults to one subdivision at the session tempo.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub trigger_delay: Option<f64>,
    #[serde(default)]
    pub sample: Option<SampleId>,
    #[serde(default)]
    pub gain: Option<f32>,
    pub beats: Vec<f64>,
    #[serde(default)]
    pub repeat: Option<RepeatSpec>,
}

impl PatternSpec {
    /// Builds the pattern. `bpm` is only used for the default note length.
    pub fn to_pattern(&self, bpm: f64) -> Result<Pattern, PatternError> {
        let trigger = match (self.pitch, &self.sample) {
            (Some(pitch), None) => {
                if self.gain.is_some() {
                    return Err(PatternError::InvalidPattern(
                        "gain applies to sample patterns only".to_string(),
                    ));
                }
                let duration = self
                    .duration
                    .unwrap_or(60.0 / bpm / SUBDIVISION as f64);
                let mut note = NoteTrigger::new(
                    pitch,
                    self.velocity.unwrap_or(DEFAULT_VELOCITY),
                    duration,
                )?;
                if let Some(delay) = self.trigger_delay {
                    note = note.with_trigger_delay(delay)?;
                }
                Trigger::Note(note)
            }
            (None, Some(sample_id)) => {
                if self.velocity.is_some() || self.duration.is_some() || self.trigger_delay.is_some()
                {
                    return Err(PatternError::InvalidPattern(format!(
                        "sample pattern '{}' cannot carry note fields",
                        sample_id
                    )));
                }
                Trigger::Sample(SampleTrigger::new(
                    sample_id.clone(),
                    self.gain.unwrap_or(DEFAULT_GAIN),
                )?)
            }
            (Some(pitch), Some(sample_id)) => {
                return Err(PatternError::InvalidPattern(format!(
                    "pattern names both pitch {} and sample '{}'",
                    pitch, sample_id
                )));
            }
            (None, None) => {
                return Err(PatternError::InvalidPattern(
                    "pattern names neither a pitch nor a sample".to_string(),
                ));
            }
        };

        let beats = match self.repeat {
            Some(RepeatSpec { size, times }) => repeat(&self.beats, size, times),
            None => self.beats.clone(),
        };

        Pattern::new(trigger, beats)
    }
}

/// Copies `beats` `times` times, each copy `size` beats after the previous.
///
/// `repeat(&[1.0, 3.0], 4.0, 2)` gives `[1.0, 3.0, 5.0, 7.0]`.
pub fn repeat(beats: &[f64], size: f64, times: u32) -> Vec<f64> {
    let mut repeated = beats.to_vec();
    for i in 1..times {
        repeated.extend(beats.iter().map(|beat| beat + size * i as f64));
    }
    repeated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat() {
        assert_eq!(repeat(&[1.0, 3.0], 4.0, 2), vec![1.0, 3.0, 5.0, 7.0]);
        assert_eq!(repeat(&[0.5], 1.0, 3), vec![0.5, 1.5, 2.5]);
        assert_eq!(repeat(&[0.5], 1.0, 1), vec![0.5]);
        assert_eq!(repeat(&[0.5], 1.0, 0), vec![0.5]);
    }

    #[test]
    fn test_note_declaration_defaults() {
        let spec = PatternSpec {
            pitch: Some(60),
            beats: vec![0.0, 2.0],
            ..Default::default()
        };

        let pattern = spec.to_pattern(120.0).unwrap();
        let note = pattern.as_note().unwrap();

        assert_eq!(note.velocity(), 100);
        // One eighth of a beat at 120 BPM
        assert!((note.duration().as_secs_f64() - 0.0625).abs() < 1e-9);
    }

    #[test]
    fn test_sample_declaration_with_repeat() {
        let spec = PatternSpec {
            sample: Some(SampleId::new("sd")),
            gain: Some(0.5),
            beats: vec![1.0, 3.0],
            repeat: Some(RepeatSpec { size: 4.0, times: 2 }),
            ..Default::default()
        };

        let pattern = spec.to_pattern(120.0).unwrap();
        assert_eq!(
            pattern.beat_values().collect::<Vec<_>>(),
            vec![1.0, 3.0, 5.0, 7.0]
        );
        assert_eq!(pattern.as_sample().unwrap().gain(), 0.5);
    }

    #[test]
    fn test_both_trigger_kinds_rejected() {
        let spec = PatternSpec {
            pitch: Some(60),
            sample: Some(SampleId::new("bd")),
            beats: vec![0.0],
            ..Default::default()
        };
        assert!(matches!(
            spec.to_pattern(120.0),
            Err(PatternError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_neither_trigger_kind_rejected() {
        let spec = PatternSpec {
            beats: vec![0.0],
            ..Default::default()
        };
        assert!(matches!(
            spec.to_pattern(120.0),
            Err(PatternError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_mixed_fields_rejected() {
        let spec = PatternSpec {
            sample: Some(SampleId::new("hh")),
            velocity: Some(90),
            beats: vec![0.5],
            ..Default::default()
        };
        assert!(spec.to_pattern(120.0).is_err());
    }

    #[test]
    fn test_parse_from_ron() {
        let text = r#"(sample: Some("bd"), gain: Some(0.75), beats: [0.0, 1.0, 2.0, 3.0])"#;
        let spec: PatternSpec = ron::from_str(text).unwrap();

        let pattern = spec.to_pattern(120.0).unwrap();
        assert_eq!(pattern.beats().len(), 4);
        assert_eq!(pattern.as_sample().unwrap().sample_id().as_str(), "bd");
    }
}
