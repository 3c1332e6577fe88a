// Render feed - Per-tick frame snapshots for a display
//
// A frame is plain data: which (pitch row, beat column) cells hold notes,
// which of them fired on this tick, and where the playhead is. Drawing is
// left to a `FrameSink`.

pub mod text;

pub use text::TextFrameSink;

use crate::clock::Tick;
use crate::dispatch::MatchPolicy;
use crate::pattern::{Pattern, SampleId, Trigger};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Note name with octave, MIDI 60 = "C4"
pub fn note_name(pitch: u8) -> String {
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

/// Visible window of the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridLayout {
    pub lowest_pitch: u8,
    pub rows: u8,
    pub columns: u32,
    pub window_beats: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            lowest_pitch: 24,
            rows: 12,
            columns: 32,
            window_beats: 8.0,
        }
    }
}

impl GridLayout {
    pub fn highest_pitch(&self) -> u8 {
        self.lowest_pitch
            .saturating_add(self.rows.saturating_sub(1))
            .min(127)
    }

    /// Row of `pitch`, 0 is the top (highest pitch)
    pub fn row(&self, pitch: u8) -> Option<usize> {
        if self.rows == 0 || pitch < self.lowest_pitch || pitch > self.highest_pitch() {
            return None;
        }
        Some((self.highest_pitch() - pitch) as usize)
    }

    /// Column of `beat`, None outside the visible window
    pub fn column(&self, beat: f64) -> Option<usize> {
        if beat < 0.0 || beat >= self.window_beats || self.window_beats <= 0.0 {
            return None;
        }
        let column = (beat * self.columns as f64 / self.window_beats) as usize;
        (column < self.columns as usize).then_some(column)
    }

    /// Labels from top to bottom
    pub fn row_labels(&self) -> Vec<String> {
        (self.lowest_pitch..=self.highest_pitch())
            .rev()
            .map(note_name)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CellState {
    Note,
    /// The note fired on this tick
    Firing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub row: usize,
    pub column: usize,
    pub pitch: u8,
    pub state: CellState,
}

/// Snapshot of the display state for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub tick_index: u32,
    pub lap: u64,
    pub beat_position: f64,
    /// True on beat boundaries
    pub blink: bool,
    /// Flash colour for blink frames, each channel 0 or 200
    pub background: Option<[u8; 3]>,
    pub row_labels: Vec<String>,
    pub columns: usize,
    pub playhead_column: Option<usize>,
    /// Occupied cells, sorted by row then column
    pub cells: Vec<Cell>,
    pub fired_samples: Vec<SampleId>,
}

impl Frame {
    pub fn cell(&self, row: usize, column: usize) -> Option<CellState> {
        self.cells
            .iter()
            .find(|c| c.row == row && c.column == column)
            .map(|c| c.state)
    }

    pub fn firing_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| c.state == CellState::Firing)
    }
}

/// Builds frames from the pattern set
pub struct RenderFeed {
    layout: GridLayout,
    policy: MatchPolicy,
    rng: StdRng,
}

impl RenderFeed {
    pub fn new(layout: GridLayout) -> Self {
        Self {
            layout,
            policy: MatchPolicy::default(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic background colours
    pub fn with_seed(layout: GridLayout, seed: u64) -> Self {
        Self {
            layout,
            policy: MatchPolicy::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Marks firing cells with the same matching as the dispatcher
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// `fired` are the indices of the patterns dispatched on `tick`
    pub fn snapshot(&mut self, tick: &Tick, patterns: &[Pattern], fired: &[usize]) -> Frame {
        let position = tick.beat_position();
        let mut cells: BTreeMap<(usize, usize), Cell> = BTreeMap::new();
        let mut fired_samples = Vec::new();

        for (index, pattern) in patterns.iter().enumerate() {
            let did_fire = fired.contains(&index);

            let note = match pattern.trigger() {
                Trigger::Note(note) => note,
                Trigger::Sample(sample) => {
                    if did_fire {
                        fired_samples.push(sample.sample_id().clone());
                    }
                    continue;
                }
            };

            let Some(row) = self.layout.row(note.pitch()) else {
                continue;
            };

            for beat in pattern.beats() {
                let Some(column) = self.layout.column(beat.value()) else {
                    continue;
                };
                let state = if did_fire && self.policy.beat_fires(beat, tick) {
                    CellState::Firing
                } else {
                    CellState::Note
                };

                let cell = cells.entry((row, column)).or_insert(Cell {
                    row,
                    column,
                    pitch: note.pitch(),
                    state,
                });
                cell.state = cell.state.max(state);
            }
        }

        let blink = tick.is_beat_boundary();
        let background = if blink {
            Some(self.flash_colour())
        } else {
            None
        };

        Frame {
            tick_index: tick.index,
            lap: tick.lap,
            beat_position: position,
            blink,
            background,
            row_labels: self.layout.row_labels(),
            columns: self.layout.columns as usize,
            playhead_column: self.layout.column(position),
            cells: cells.into_values().collect(),
            fired_samples,
        }
    }

    fn flash_colour(&mut self) -> [u8; 3] {
        let mut channel = || if self.rng.gen_bool(0.5) { 200 } else { 0 };
        [channel(), channel(), channel()]
    }
}

/// Rendering surface driven once per tick
pub trait FrameSink {
    fn present(&mut self, frame: &Frame) -> io::Result<()>;
}

/// Discards every frame
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFrameSink;

impl FrameSink for NullFrameSink {
    fn present(&mut self, _frame: &Frame) -> io::Result<()> {
        Ok(())
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn present(&mut self, frame: &Frame) -> io::Result<()> {
        (**self).present(frame)
    }
}
