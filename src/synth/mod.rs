// Purpose: Note lifecycle, settings snapshots, control messages
// This layer sits above the voice graph and decides when voices are built,
// retuned, released and freed

pub mod message;
pub mod mono;
pub mod note;
pub mod settings;
pub mod voice;

pub use message::{MessageReceiver, SynthMessage};
pub use mono::{MonoSynth, OverloadMeter};
pub use note::Note;
pub use settings::{SettingsPatch, SynthSettings};
pub use voice::VoiceState;
