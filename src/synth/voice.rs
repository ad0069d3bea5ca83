use crate::{graph::node::VoiceId, synth::note::Note};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,        // Nothing sounding, no nodes
    Attacking,   // Gate open, contour rising toward sustain
    Sustaining,  // Gate open, holding the sustain level
    Releasing,   // Gate closed, release ramp running
    TearingDown, // Silent, waiting out the margin before nodes are freed
}

impl VoiceState {
    /// Key still held.
    pub fn is_gated(self) -> bool {
        matches!(self, VoiceState::Attacking | VoiceState::Sustaining)
    }
}

/// What a `tick` moved the voice into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Sustained,
    /// Release finished; the caller starts teardown.
    ReleaseFinished,
    /// Teardown deadline passed; the caller frees the nodes.
    Expired,
}

/// One sounding note and the arena key of the nodes it owns.
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    id: VoiceId,
    note: Note,
    released_at: Option<f64>,
    state: VoiceState,
    sustain_at: f64,
    release_end: f64,
    deadline: f64,
}

impl Voice {
    pub fn new(id: VoiceId, note: Note, sustain_at: f64) -> Self {
        Self {
            id,
            note,
            released_at: None,
            state: VoiceState::Attacking,
            sustain_at,
            release_end: f64::INFINITY,
            deadline: f64::INFINITY,
        }
    }

    /// Back to the attack with a new note; the graph is reused.
    pub fn retrigger(&mut self, note: Note, sustain_at: f64) {
        self.note = note;
        self.released_at = None;
        self.state = VoiceState::Attacking;
        self.sustain_at = sustain_at;
        self.release_end = f64::INFINITY;
    }

    /// Change pitch without touching the contour.
    pub fn glide(&mut self, note: Note) {
        self.note = note;
    }

    pub fn release(&mut self, now: f64, release_end: f64) {
        if self.state.is_gated() {
            self.state = VoiceState::Releasing;
            self.released_at = Some(now);
            self.release_end = release_end;
        }
    }

    pub fn begin_teardown(&mut self, deadline: f64) {
        self.state = VoiceState::TearingDown;
        self.deadline = deadline;
    }

    pub fn free(&mut self) {
        self.state = VoiceState::Idle;
    }

    /// Advance time-driven transitions.
    pub fn tick(&mut self, now: f64) -> Option<Transition> {
        match self.state {
            VoiceState::Attacking if now >= self.sustain_at => {
                self.state = VoiceState::Sustaining;
                Some(Transition::Sustained)
            }
            VoiceState::Releasing if now >= self.release_end => Some(Transition::ReleaseFinished),
            VoiceState::TearingDown if now >= self.deadline => Some(Transition::Expired),
            _ => None,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn note(&self) -> Note {
        self.note
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn released_at(&self) -> Option<f64> {
        self.released_at
    }

    pub fn deadline(&self) -> Option<f64> {
        (self.state == VoiceState::TearingDown).then_some(self.deadline)
    }
}
