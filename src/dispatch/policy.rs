// Match policies - decide which patterns fire on a tick

use crate::clock::{SUBDIVISION, Tick};
use crate::pattern::{Beat, Pattern};
use serde::{Deserialize, Serialize};

/// Half-width of the tolerance window, in beats
pub const TOLERANCE_BEATS: f64 = 0.05;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Fire on the tick whose slot equals a subdivision-aligned beat
    #[default]
    Exact,
    /// Fire when a beat lies within `TOLERANCE_BEATS` of the observed position
    Tolerance,
}

impl MatchPolicy {
    /// Whether `pattern` fires on `tick`
    pub fn fires(&self, pattern: &Pattern, tick: &Tick) -> bool {
        pattern.beats().iter().any(|beat| self.beat_fires(beat, tick))
    }

    /// Whether this one beat matches `tick`
    pub fn beat_fires(&self, beat: &Beat, tick: &Tick) -> bool {
        match self {
            MatchPolicy::Exact => beat.slot() == Some(tick.index),
            MatchPolicy::Tolerance => within_tolerance(beat.value(), tick.position, tick.loop_beats),
        }
    }
}

/// Distance on the loop circle, so a beat at 0.0 matches a late tick at 7.98
fn within_tolerance(beat: f64, position: f64, loop_beats: u32) -> bool {
    let length = loop_beats as f64;
    let direct = (beat - position).abs();
    let distance = if length > 0.0 {
        direct.min(length - direct.rem_euclid(length))
    } else {
        direct
    };
    distance < TOLERANCE_BEATS
}

/// Per-tick firing lookup for a fixed pattern set
///
/// Under `Exact` the slots are indexed once, so a tick is a table lookup.
/// `Tolerance` scans every pattern.
#[derive(Debug, Clone)]
pub struct Scheduler {
    policy: MatchPolicy,
    slots: Vec<Vec<usize>>,
}

impl Scheduler {
    pub fn new(policy: MatchPolicy, patterns: &[Pattern], loop_beats: u32) -> Self {
        let slot_count = (loop_beats * SUBDIVISION) as usize;
        let mut slots = vec![Vec::new(); slot_count];

        if policy == MatchPolicy::Exact {
            for (index, pattern) in patterns.iter().enumerate() {
                for slot in pattern.beats().iter().filter_map(|beat| beat.slot()) {
                    if let Some(entries) = slots.get_mut(slot as usize) {
                        entries.push(index);
                    }
                }
            }
        }

        Self { policy, slots }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Indices of the patterns that fire on `tick`, in pattern order
    pub fn due(&self, tick: &Tick, patterns: &[Pattern]) -> Vec<usize> {
        match self.policy {
            MatchPolicy::Exact => self
                .slots
                .get(tick.index as usize)
                .cloned()
                .unwrap_or_default(),
            MatchPolicy::Tolerance => patterns
                .iter()
                .enumerate()
                .filter(|(_, pattern)| self.policy.fires(pattern, tick))
                .map(|(index, _)| index)
                .collect(),
        }
    }
}
