// Commands - audio writer thread to audio callback

use crate::sampler::loader::Sample;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum AudioCommand {
    /// Start a voice; `gain` already includes the bank volume
    Play { sample: Arc<Sample>, gain: f32 },
}
