pub mod device;
pub mod event;
pub mod output;

pub use device::{MidiPortInfo, list_output_ports};
pub use event::MidiMessage;
pub use output::MidirSink;
