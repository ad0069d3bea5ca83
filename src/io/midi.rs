/// Channel-voice events, already decoded from MIDI bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Signed 14-bit bend, -8192 to 8191 with 0 at rest.
    PitchBend { channel: u8, value: i16 },
}

impl ControlEvent {
    pub fn channel(&self) -> u8 {
        match *self {
            ControlEvent::NoteOn { channel, .. }
            | ControlEvent::NoteOff { channel, .. }
            | ControlEvent::ControlChange { channel, .. }
            | ControlEvent::PitchBend { channel, .. } => channel,
        }
    }
}

/// Controller number of the modulation wheel.
pub const CC_MOD_WHEEL: u8 = 1;
/// Controller that releases every held note.
pub const CC_ALL_NOTES_OFF: u8 = 123;
