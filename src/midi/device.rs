// MIDI output port discovery

use midir::{MidiOutput, MidiOutputPort};

pub const CLIENT_NAME: &str = "beatloop";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
}

/// Lists all MIDI output ports. Empty when MIDI is unavailable.
pub fn list_output_ports() -> Vec<MidiPortInfo> {
    let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) else {
        return Vec::new();
    };

    midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out.port_name(port).ok().map(|name| MidiPortInfo {
                index,
                name,
                // The first port is treated as the default
                is_default: index == 0,
            })
        })
        .collect()
}

/// Finds an output port by exact name, or the first port when `name` is None
pub fn find_output_port(midi_out: &MidiOutput, name: Option<&str>) -> Option<(MidiOutputPort, String)> {
    let ports = midi_out.ports();

    match name {
        Some(wanted) => ports.into_iter().find_map(|port| {
            let port_name = midi_out.port_name(&port).ok()?;
            (port_name == wanted).then_some((port, port_name))
        }),
        None => {
            let port = ports.into_iter().next()?;
            let port_name = midi_out
                .port_name(&port)
                .unwrap_or_else(|_| "Unknown".to_string());
            Some((port, port_name))
        }
    }
}
