// Text frame sink - prints the grid as ASCII on beat boundaries

use super::{CellState, Frame, FrameSink};
use std::io::{self, Write};

const EMPTY: char = '.';
const PLAYHEAD: char = ':';
const NOTE: char = 'o';
const FIRING: char = '*';

pub struct TextFrameSink<W: Write> {
    out: W,
    every_tick: bool,
}

impl<W: Write> TextFrameSink<W> {
    /// Prints blink frames only
    pub fn new(out: W) -> Self {
        Self {
            out,
            every_tick: false,
        }
    }

    pub fn every_tick(mut self) -> Self {
        self.every_tick = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Renders a frame as lines of text
pub fn render_text(frame: &Frame) -> String {
    let mut text = format!("beat {:>6.3}  lap {}", frame.beat_position, frame.lap);
    if let Some([r, g, b]) = frame.background {
        text.push_str(&format!("  #{:02x}{:02x}{:02x}", r, g, b));
    }
    text.push('\n');

    for (row, label) in frame.row_labels.iter().enumerate() {
        text.push_str(&format!("{:>4} ", label));
        for column in 0..frame.columns {
            let symbol = match frame.cell(row, column) {
                Some(CellState::Firing) => FIRING,
                Some(CellState::Note) => NOTE,
                None if frame.playhead_column == Some(column) => PLAYHEAD,
                None => EMPTY,
            };
            text.push(symbol);
        }
        text.push('\n');
    }

    if !frame.fired_samples.is_empty() {
        let names: Vec<&str> = frame.fired_samples.iter().map(|id| id.as_str()).collect();
        text.push_str(&format!("     {}\n", names.join(" ")));
    }
    text
}

impl<W: Write> FrameSink for TextFrameSink<W> {
    fn present(&mut self, frame: &Frame) -> io::Result<()> {
        if !frame.blink && !self.every_tick {
            return Ok(());
        }
        self.out.write_all(render_text(frame).as_bytes())?;
        self.out.flush()
    }
}
