use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::{
    engine::{EngineConfig, EngineError},
    io::ControlAction,
    synth::{
        message::SynthMessage,
        mono::{MonoSynth, OverloadMeter},
        note::Note,
        settings::{SettingsPatch, SynthSettings},
    },
};

/// Control-side half of the engine.
///
/// Owns the authoritative settings snapshot: patches are merged here and the
/// complete result is queued, so the render side never sees a partial
/// update.
pub struct SynthHandle {
    tx: Producer<SynthMessage>,
    settings: SynthSettings,
    overload: OverloadMeter,
}

impl SynthHandle {
    pub(crate) fn new(tx: Producer<SynthMessage>, settings: SynthSettings, overload: OverloadMeter) -> Self {
        Self { tx, settings, overload }
    }

    pub fn note_on(&mut self, note: &str) -> Result<(), EngineError> {
        self.send(SynthMessage::NoteOn(Note::parse_or_a4(note)))
    }

    pub fn note_off(&mut self, note: &str) -> Result<(), EngineError> {
        self.send(SynthMessage::NoteOff(Note::parse_or_a4(note)))
    }

    pub fn handle_note_transition(&mut self, from: &str, to: &str) -> Result<(), EngineError> {
        self.send(SynthMessage::NoteTransition {
            from: Note::parse_or_a4(from),
            to: Note::parse_or_a4(to),
        })
    }

    /// Merge `patch` into the current snapshot and queue the result.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<(), EngineError> {
        if patch.is_empty() {
            return Ok(());
        }
        let next = self.settings.merged(patch);
        self.send(SynthMessage::Settings(next))?;
        self.settings = next;
        Ok(())
    }

    pub fn all_notes_off(&mut self) -> Result<(), EngineError> {
        self.send(SynthMessage::AllNotesOff)
    }

    /// Forward a decoded control event.
    pub fn apply(&mut self, action: ControlAction) -> Result<(), EngineError> {
        match action {
            ControlAction::NoteOn(note) => self.send(SynthMessage::NoteOn(note)),
            ControlAction::NoteOff(note) => self.send(SynthMessage::NoteOff(note)),
            ControlAction::Patch(patch) => self.update_settings(&patch),
            ControlAction::AllNotesOff => self.all_notes_off(),
        }
    }

    /// Whether the last rendered block went above the overload level.
    pub fn is_overloaded(&self) -> bool {
        self.overload.is_overloaded()
    }

    /// The snapshot the render side will hold once the queue drains.
    pub fn settings(&self) -> &SynthSettings {
        &self.settings
    }

    fn send(&mut self, message: SynthMessage) -> Result<(), EngineError> {
        if self.tx.is_abandoned() {
            return Err(EngineError::Disposed);
        }
        self.tx.push(message).map_err(|PushError::Full(message)| {
            tracing::warn!(?message, "control queue full, message dropped");
            EngineError::QueueFull
        })
    }
}

/// A handle and a render-side synth with no audio device attached.
///
/// Call `MonoSynth::render_block` to pull audio; messages sent through the
/// handle are applied at the start of the next block.
pub fn create_offline(sample_rate: f32) -> (SynthHandle, MonoSynth<Consumer<SynthMessage>>) {
    create_offline_with(sample_rate, &EngineConfig::default())
}

pub fn create_offline_with(
    sample_rate: f32,
    config: &EngineConfig,
) -> (SynthHandle, MonoSynth<Consumer<SynthMessage>>) {
    let (tx, rx) = RingBuffer::<SynthMessage>::new(config.queue_capacity.max(1));
    let synth = MonoSynth::new(sample_rate, config.settings, rx, config.seed);
    let handle = SynthHandle::new(tx, config.settings, synth.overload_meter());
    (handle, synth)
}
