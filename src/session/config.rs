// Session configuration - RON session files
//
// ```ron
// (
//     bpm: 120.0,
//     loop_beats: 8,
//     track_name: "lead",
//     midi_file: Some("lead.mid"),
//     sample_bank: Some("drums.json"),
//     patterns: [
//         (sample: Some("bd"), beats: [0.0], repeat: Some((size: 1.0, times: 8))),
//     ],
// )
// ```

use crate::dispatch::{Backpressure, MatchPolicy};
use crate::pattern::PatternSpec;
use crate::render::GridLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid session file: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid session setting: {0}")]
    Invalid(String),
}

fn default_bpm() -> f64 {
    120.0
}

fn default_loop_beats() -> u32 {
    8
}

fn default_trigger_delay() -> f64 {
    0.025
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    #[serde(default = "default_loop_beats")]
    pub loop_beats: u32,
    /// Track to extract from `midi_file`
    #[serde(default)]
    pub track_name: String,
    /// Notes starting at or after this beat are not extracted
    #[serde(default)]
    pub beat_limit: Option<f64>,
    #[serde(default)]
    pub match_policy: MatchPolicy,
    #[serde(default)]
    pub midi_file: Option<PathBuf>,
    /// Output port name; the first port when absent
    #[serde(default)]
    pub midi_port: Option<String>,
    /// MIDI channel 0-15
    #[serde(default)]
    pub midi_channel: u8,
    #[serde(default)]
    pub sample_bank: Option<PathBuf>,
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
    /// Delay before each extracted note, in seconds
    #[serde(default = "default_trigger_delay")]
    pub trigger_delay: f64,
    /// Loops to play; forever when absent
    #[serde(default)]
    pub laps: Option<u64>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub backpressure: Backpressure,
    #[serde(default)]
    pub render: GridLayout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            loop_beats: default_loop_beats(),
            track_name: String::new(),
            beat_limit: None,
            match_policy: MatchPolicy::default(),
            midi_file: None,
            midi_port: None,
            midi_channel: 0,
            sample_bank: None,
            patterns: Vec::new(),
            trigger_delay: default_trigger_delay(),
            laps: None,
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            backpressure: Backpressure::default(),
            render: GridLayout::default(),
        }
    }
}

impl SessionConfig {
    /// Parses and validates a session, paths are left as written
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a session file, resolving relative paths against its directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_ron(&text)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.midi_file = config.midi_file.map(|p| resolve(base, p));
        config.sample_bank = config.sample_bank.map(|p| resolve(base, p));

        log::info!("Loaded session {}", path.display());
        Ok(config)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Invalid(format!("cannot serialize session: {}", e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "bpm must be positive, got {}",
                self.bpm
            )));
        }
        if self.loop_beats == 0 {
            return Err(ConfigError::Invalid("loop_beats must be positive".to_string()));
        }
        if let Some(limit) = self.beat_limit {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "beat_limit must be positive, got {}",
                    limit
                )));
            }
        }
        if self.midi_file.is_some() && self.track_name.is_empty() {
            return Err(ConfigError::Invalid(
                "track_name is required with midi_file".to_string(),
            ));
        }
        if self.midi_channel > 15 {
            return Err(ConfigError::Invalid(format!(
                "midi_channel must be 0-15, got {}",
                self.midi_channel
            )));
        }
        if !self.trigger_delay.is_finite() || self.trigger_delay < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "trigger_delay cannot be negative, got {}",
                self.trigger_delay
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.render.rows == 0 || self.render.columns == 0 || self.render.window_beats <= 0.0 {
            return Err(ConfigError::Invalid("render grid cannot be empty".to_string()));
        }
        if self.midi_file.is_none() && self.patterns.is_empty() {
            return Err(ConfigError::Invalid(
                "session needs a midi_file or declared patterns".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
