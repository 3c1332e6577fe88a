// MIDI output - midir-backed sink

use super::device::{CLIENT_NAME, find_output_port};
use super::event::MidiMessage;
use crate::sink::{MidiSink, SinkError};
use midir::{MidiOutput, MidiOutputConnection};

pub struct MidirSink {
    connection: MidiOutputConnection,
    port_name: String,
    channel: u8,
}

impl MidirSink {
    /// Opens the output port named `port_name`, or the first port when None
    pub fn connect(port_name: Option<&str>) -> Result<Self, SinkError> {
        let midi_out = MidiOutput::new(CLIENT_NAME)
            .map_err(|e| SinkError::Unavailable(format!("MIDI init error: {}", e)))?;

        let (port, name) = find_output_port(&midi_out, port_name).ok_or_else(|| {
            SinkError::Unavailable(match port_name {
                Some(wanted) => format!("MIDI port '{}' not found", wanted),
                None => "no MIDI output port".to_string(),
            })
        })?;

        let connection = midi_out
            .connect(&port, "beatloop-out")
            .map_err(|e| SinkError::Unavailable(format!("cannot open '{}': {}", name, e)))?;

        log::info!("MIDI output connected: {}", name);

        Ok(Self {
            connection,
            port_name: name,
            channel: 0,
        })
    }

    /// Sends on `channel` (0-15) instead of the first channel
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel & 0x0F;
        self
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiSink for MidirSink {
    fn send(&mut self, message: MidiMessage) -> Result<(), SinkError> {
        self.connection
            .send(&message.to_bytes(self.channel))
            .map_err(|e| SinkError::Write(format!("{}: {}", self.port_name, e)))
    }
}
