use std::fmt;

/// Context passed to graph nodes during rendering
///
/// Contains information about what to render:
/// - sample_rate: Audio sample rate (e.g., 48000.0)
/// - time: Engine time of the first frame in the block, in seconds
pub struct RenderCtx {
    pub sample_rate: f32,
    pub time: f64,
}

impl RenderCtx {
    pub fn new(sample_rate: f32, time: f64) -> Self {
        Self { sample_rate, time }
    }

    /// Seconds between frames.
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    /// Engine time of frame `index` in this block.
    pub fn time_at(&self, index: usize) -> f64 {
        self.time + index as f64 * self.sample_period()
    }
}

/// Core trait for audio-rate nodes in the voice graph
///
/// Each node fills `out` for the block described by `ctx`. Nodes read only
/// their own state and scheduled curves; wiring lives in the arena.
pub trait GraphNode: Send {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx);
}

/// Arena key for one voice. The generation changes every time a bank is
/// reused, so a stale id can never reach a newer voice's nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId {
    pub(crate) bank: usize,
    pub(crate) generation: u32,
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}.{}", self.bank, self.generation)
    }
}

/// The four places the modulation bus can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModDestination {
    Cutoff,
    Resonance,
    Pitch,
    Volume,
}

impl ModDestination {
    pub const ALL: [ModDestination; 4] = [
        ModDestination::Cutoff,
        ModDestination::Resonance,
        ModDestination::Pitch,
        ModDestination::Volume,
    ];

    pub fn index(self) -> usize {
        match self {
            ModDestination::Cutoff => 0,
            ModDestination::Resonance => 1,
            ModDestination::Pitch => 2,
            ModDestination::Volume => 3,
        }
    }

    /// Where a tap for this destination plugs in.
    pub fn input(self, voice: VoiceId) -> Input {
        match self {
            ModDestination::Cutoff => Input::FilterCutoff,
            ModDestination::Resonance => Input::FilterResonance,
            ModDestination::Pitch => Input::OscillatorPitch(voice),
            ModDestination::Volume => Input::OscillatorGain(voice),
        }
    }
}

/// A node position inside a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Oscillator(usize),
    Noise,
    Amp,
    Lfo,
    ModTap(ModDestination),
}

impl Slot {
    pub const COUNT: usize = 10;
    /// Oscillator and noise slots; the only nodes that retire on their own.
    pub const CHAINS: usize = 4;

    pub fn index(self) -> usize {
        match self {
            Slot::Oscillator(i) => i,
            Slot::Noise => 3,
            Slot::Amp => 4,
            Slot::Lfo => 5,
            Slot::ModTap(dest) => 6 + dest.index(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub voice: VoiceId,
    pub slot: Slot,
}

impl NodeId {
    pub fn new(voice: VoiceId, slot: Slot) -> Self {
        Self { voice, slot }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.voice, self.slot)
    }
}

/// Downstream inputs a node's single output can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    /// Summing bus in front of the shared ladder.
    FilterIn,
    FilterCutoff,
    FilterResonance,
    /// Summing bus after the amplitude stages.
    MainOut,
    OscillatorPitch(VoiceId),
    OscillatorGain(VoiceId),
    /// Read directly by the modulation bus.
    ModSource(VoiceId),
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::FilterIn => write!(f, "filter.in"),
            Input::FilterCutoff => write!(f, "filter.cutoff"),
            Input::FilterResonance => write!(f, "filter.resonance"),
            Input::MainOut => write!(f, "main.out"),
            Input::OscillatorPitch(v) => write!(f, "{v}.pitch"),
            Input::OscillatorGain(v) => write!(f, "{v}.gain"),
            Input::ModSource(v) => write!(f, "{v}.mod"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_indices_are_dense_and_unique() {
        let mut seen = [false; Slot::COUNT];
        let slots = (0..3)
            .map(Slot::Oscillator)
            .chain([Slot::Noise, Slot::Amp, Slot::Lfo])
            .chain(ModDestination::ALL.map(Slot::ModTap));
        for slot in slots {
            assert!(!seen[slot.index()], "{slot:?} collides");
            seen[slot.index()] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn render_ctx_frame_times() {
        let ctx = RenderCtx::new(48_000.0, 1.0);
        assert_eq!(ctx.time_at(0), 1.0);
        assert!((ctx.time_at(48_000) - 2.0).abs() < 1e-9);
    }
}
