use crate::{
    io::midi::{ControlEvent, CC_ALL_NOTES_OFF, CC_MOD_WHEEL},
    synth::{note::Note, settings::SettingsPatch},
};

/// What a decoded event asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    NoteOn(Note),
    NoteOff(Note),
    Patch(SettingsPatch),
    AllNotesOff,
}

/// Map an event on `channel_filter` to an engine action. Velocity is
/// ignored; a note-on with velocity 0 is a note-off.
pub fn event_to_action(event: ControlEvent, channel_filter: u8) -> Option<ControlAction> {
    if event.channel() != channel_filter {
        return None;
    }

    match event {
        ControlEvent::NoteOn { key, velocity: 0, .. } | ControlEvent::NoteOff { key, .. } => {
            Some(ControlAction::NoteOff(Note::from_midi(key as i32)))
        }
        ControlEvent::NoteOn { key, .. } => Some(ControlAction::NoteOn(Note::from_midi(key as i32))),
        ControlEvent::ControlChange {
            controller: CC_MOD_WHEEL,
            value,
            ..
        } => Some(ControlAction::Patch(
            SettingsPatch::default().mod_wheel(value.min(127) as f32 / 127.0 * 100.0),
        )),
        ControlEvent::ControlChange {
            controller: CC_ALL_NOTES_OFF,
            ..
        } => Some(ControlAction::AllNotesOff),
        ControlEvent::ControlChange { controller, .. } => {
            tracing::debug!(controller, "unmapped controller");
            None
        }
        ControlEvent::PitchBend { value, .. } => Some(ControlAction::Patch(
            SettingsPatch::default().pitch_wheel(bend_to_wheel(value)),
        )),
    }
}

/// 14-bit bend to the 0-100 pitch wheel, 50 at rest.
pub fn bend_to_wheel(value: i16) -> f32 {
    let normalized = (value as f32 / 8192.0).clamp(-1.0, 1.0);
    50.0 + normalized * 50.0
}
