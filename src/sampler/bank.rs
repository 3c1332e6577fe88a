use crate::pattern::SampleId;
use crate::sampler::loader::{Sample, SamplerError, load_sample};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn default_volume() -> f32 {
    1.0
}

/// Serializable sample bank configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleBank {
    pub name: String,
    pub version: String,
    pub samples: Vec<SampleMapping>,
}

/// Mapping from sample id to sample file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMapping {
    pub id: SampleId,
    /// Relative path to sample file (from bank file location)
    pub path: PathBuf,
    /// Volume multiplier, applied on top of the pattern gain
    #[serde(default = "default_volume")]
    pub volume: f32,
}

/// A decoded sample ready for playback
#[derive(Debug, Clone)]
pub struct LoadedSample {
    pub sample: Arc<Sample>,
    pub volume: f32,
}

impl SampleBank {
    /// Create a new empty sample bank
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0".to_string(),
            samples: Vec::new(),
        }
    }

    /// Add a sample mapping, replacing any mapping with the same id
    pub fn add_mapping(&mut self, mapping: SampleMapping) {
        self.samples.retain(|m| m.id != mapping.id);
        self.samples.push(mapping);
    }

    pub fn get_mapping(&self, id: &SampleId) -> Option<&SampleMapping> {
        self.samples.iter().find(|m| &m.id == id)
    }

    pub fn ids(&self) -> Vec<SampleId> {
        self.samples.iter().map(|m| m.id.clone()).collect()
    }

    /// Save bank to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SamplerError> {
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_str)?;
        Ok(())
    }

    /// Load bank from JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SamplerError> {
        let json_str = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json_str)?)
    }

    /// Decodes every mapped file, resolving relative paths against `base_dir`.
    ///
    /// A file that fails to load is logged and left out; patterns using it
    /// then count as unknown samples.
    pub fn load_samples(&self, base_dir: &Path) -> HashMap<SampleId, LoadedSample> {
        let mut loaded = HashMap::new();

        for mapping in &self.samples {
            let path = if mapping.path.is_absolute() {
                mapping.path.clone()
            } else {
                base_dir.join(&mapping.path)
            };

            match load_sample(&path) {
                Ok(sample) => {
                    log::debug!(
                        "Loaded sample '{}' from {} ({:.3}s)",
                        mapping.id,
                        path.display(),
                        sample.duration_seconds()
                    );
                    loaded.insert(
                        mapping.id.clone(),
                        LoadedSample {
                            sample: Arc::new(sample),
                            volume: mapping.volume,
                        },
                    );
                }
                Err(e) => {
                    log::warn!("Sample '{}' unavailable ({}): {}", mapping.id, path.display(), e);
                }
            }
        }

        log::info!(
            "Sample bank '{}': {}/{} samples loaded",
            self.name,
            loaded.len(),
            self.samples.len()
        );
        loaded
    }
}

impl Default for SampleBank {
    fn default() -> Self {
        Self::new("Untitled Bank")
    }
}
