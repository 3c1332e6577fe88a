// MIDI messages sent by note patterns

pub const NOTE_ON: u8 = 0x90;
pub const NOTE_OFF: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { pitch: u8, velocity: u8 },
    /// Sent with velocity 0
    NoteOff { pitch: u8 },
}

impl MidiMessage {
    pub fn pitch(&self) -> u8 {
        match self {
            MidiMessage::NoteOn { pitch, .. } | MidiMessage::NoteOff { pitch } => *pitch,
        }
    }

    /// Raw bytes on `channel` (0-15)
    pub fn to_bytes(&self, channel: u8) -> [u8; 3] {
        let channel = channel & 0x0F;
        match *self {
            MidiMessage::NoteOn { pitch, velocity } => {
                [NOTE_ON | channel, pitch & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOff { pitch } => [NOTE_OFF | channel, pitch & 0x7F, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_bytes() {
        let message = MidiMessage::NoteOn {
            pitch: 60,
            velocity: 100,
        };
        assert_eq!(message.to_bytes(0), [0x90, 60, 100]);
        assert_eq!(message.to_bytes(9), [0x99, 60, 100]);
    }

    #[test]
    fn test_note_off_has_zero_velocity() {
        let message = MidiMessage::NoteOff { pitch: 64 };
        assert_eq!(message.to_bytes(0), [0x80, 64, 0]);
        assert_eq!(message.pitch(), 64);
    }
}
