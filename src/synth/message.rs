use std::collections::VecDeque;

#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::synth::{note::Note, settings::SynthSettings};

/// Control events drained by the render side once per block.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SynthMessage {
    NoteOn(Note),
    NoteOff(Note),
    /// Move from one held note to another (legato when a voice sounds).
    NoteTransition { from: Note, to: Note },
    /// A complete, already-merged settings snapshot.
    Settings(SynthSettings),
    AllNotesOff,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}

/// Queue for driving the synth directly from a single thread.
impl MessageReceiver for VecDeque<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        self.pop_front()
    }
}
