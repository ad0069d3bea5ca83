//! Builds, rewires and renders the per-voice node graph.
//!
//! Topology is fixed: up to three oscillator chains and a noise chain per
//! voice sum with the external input into one shared stereo ladder, whose
//! output is scaled by every connected amplitude stage and the main volume.
//! The manager owns the shared half (ladder, cutoff/resonance curves, the
//! modulation bus) and the arena that holds each voice's nodes.

use crate::{
    dsp::{
        automation::ParamCurve,
        ladder::{clamp_cutoff, clamp_resonance, StereoLadder, MAX_CUTOFF, MIN_CUTOFF},
        filter::tone_cutoff,
        noise::NoiseSource,
        oscillator::{ReferenceTone, TUNER_HZ},
    },
    graph::{
        arena::{GraphError, NodeArena, VOICE_BANKS},
        chain::{AmpStage, ChainScratch, LfoNode, ModTap, NoiseChain, Node, OscillatorChain},
        modulate::{tap_target, ModulationMatrix},
        node::{GraphNode, Input, ModDestination, NodeId, RenderCtx, Slot, VoiceId},
    },
    synth::{
        note::Note,
        settings::{FilterSettings, SynthSettings},
    },
    MAX_BLOCK_SIZE,
};

/// Pitch move for a legato note change without glide.
pub const LEGATO_TIME: f32 = 0.05;
/// Grace period between a voice going silent and its nodes being freed.
pub const TEARDOWN_MARGIN: f64 = 0.15;
/// Fade applied to a chain disabled mid-note.
pub const DISABLE_FADE: f32 = 0.1;
/// Fade for a chain spliced into a sounding voice.
const SPLICE_FADE: f32 = 0.005;
/// Smoothing ramp for knob moves on already-built nodes.
const PARAM_RAMP: f32 = 0.02;
/// Level of the tuning reference, mixed in after the main volume.
pub const TUNER_LEVEL: f32 = 0.3;

/// Cutoff knob (-4 to 4) to Hz on a 20 Hz - 20 kHz curve.
pub fn cutoff_hz(knob: f32) -> f32 {
    let knob = if knob.is_finite() { knob.clamp(-4.0, 4.0) } else { 0.0 };
    let normalized = (knob + 4.0) / 8.0;
    (MIN_CUTOFF * 1_000.0_f32.powf(normalized.powf(1.5))).clamp(MIN_CUTOFF, MAX_CUTOFF)
}

/// Keyboard tracking amount from the two keyboard-control switches.
pub fn key_tracking(filter: &FilterSettings) -> f32 {
    let mut amount = 0.0;
    if filter.keyboard_control_1 {
        amount += 1.0 / 3.0;
    }
    if filter.keyboard_control_2 {
        amount += 2.0 / 3.0;
    }
    amount
}

/// Cutoff with keyboard tracking around middle C.
pub fn tracked_cutoff(filter: &FilterSettings, note: Note) -> f32 {
    let octaves = key_tracking(filter) * (note.midi() - 60) as f32 / 12.0;
    clamp_cutoff(cutoff_hz(filter.cutoff) * 2.0_f32.powf(octaves))
}

/// Where the filter contour peaks: up to 4 octaves above `base`.
pub fn contour_peak(filter: &FilterSettings, base: f32) -> f32 {
    if !filter.contour_enabled {
        return base;
    }
    let amount = if filter.contour_amount.is_finite() {
        filter.contour_amount.clamp(0.0, 10.0)
    } else {
        0.0
    };
    clamp_cutoff(base * 2.0_f32.powf(amount * 0.4))
}

/// Emphasis knob (0-10) to ladder feedback.
pub fn emphasis_to_resonance(emphasis: f32) -> f32 {
    clamp_resonance(emphasis * 0.399)
}

/// Frequency of oscillator `slot` for `note`, including range, offset,
/// tune, bend, octave and the voicing detune.
pub fn oscillator_frequency(settings: &SynthSettings, slot: usize, note: Note) -> f32 {
    let osc = &settings.oscillators[slot];
    let offset = if osc.frequency.is_finite() { osc.frequency } else { 0.0 };
    let cents = settings.voicing.detune_cents[slot];
    let semitones = offset + settings.pitch_offset() + if cents.is_finite() { cents / 100.0 } else { 0.0 };

    let hz = note.frequency() * osc.range.multiplier() * 2.0_f32.powf(semitones / 12.0);
    if hz.is_finite() {
        hz.clamp(0.0, MAX_CUTOFF)
    } else {
        440.0
    }
}

/// Mixer gain for oscillator `slot`: volume/10 times the voicing boost.
pub fn oscillator_gain(settings: &SynthSettings, slot: usize) -> f32 {
    let osc = &settings.oscillators[slot];
    if !osc.is_audible() {
        return 0.0;
    }
    unit_level(osc.volume) * settings.voicing.volume_boost[slot]
}

fn noise_gain(settings: &SynthSettings) -> f32 {
    if settings.noise.is_audible() {
        unit_level(settings.noise.volume)
    } else {
        0.0
    }
}

fn external_gain(settings: &SynthSettings) -> f32 {
    let input = &settings.external_input;
    if input.enabled {
        unit_level(input.volume)
    } else {
        0.0
    }
}

fn tuner_level(settings: &SynthSettings) -> f32 {
    if settings.tuner {
        TUNER_LEVEL
    } else {
        0.0
    }
}

// 0-10 knob to 0-1 gain.
fn unit_level(knob: f32) -> f32 {
    if knob.is_finite() {
        (knob / 10.0).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Where a rebuilt voice's pitch starts before moving to its own note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glide {
    pub from: Note,
    pub time: f32,
}

struct RenderBuffers {
    filter_left: Vec<f32>,
    filter_right: Vec<f32>,
    cutoff: Vec<f32>,
    resonance: Vec<f32>,
    cutoff_mod: Vec<f32>,
    resonance_mod: Vec<f32>,
    amp: Vec<f32>,
    amp_sum: Vec<f32>,
    lfo: Vec<f32>,
    bus: Vec<f32>,
    tap: Vec<f32>,
    pitch_mod: Vec<f32>,
    gain_mod: Vec<f32>,
    level: Vec<f32>,
}

impl RenderBuffers {
    fn new() -> Self {
        let buffer = || vec![0.0; MAX_BLOCK_SIZE];
        Self {
            filter_left: buffer(),
            filter_right: buffer(),
            cutoff: buffer(),
            resonance: buffer(),
            cutoff_mod: buffer(),
            resonance_mod: buffer(),
            amp: buffer(),
            amp_sum: buffer(),
            lfo: buffer(),
            bus: buffer(),
            tap: buffer(),
            pitch_mod: buffer(),
            gain_mod: buffer(),
            level: buffer(),
        }
    }
}

pub struct VoiceGraphManager {
    arena: NodeArena,
    ladder: StereoLadder,
    matrix: ModulationMatrix,
    cutoff: ParamCurve,
    resonance: ParamCurve,
    external_gain: ParamCurve,
    main_volume: ParamCurve,
    tuner: ReferenceTone,
    tuner_gain: ParamCurve,
    noise_seed: u64,
    scratch: ChainScratch,
    buffers: RenderBuffers,
}

impl VoiceGraphManager {
    pub fn new(sample_rate: f32, settings: &SynthSettings, seed: u64) -> Self {
        let base = cutoff_hz(settings.filter.cutoff);
        let resonance = emphasis_to_resonance(settings.filter.emphasis);
        let mut ladder = StereoLadder::new(sample_rate);
        ladder.snap(base, resonance);

        Self {
            arena: NodeArena::new(),
            ladder,
            matrix: ModulationMatrix::new(settings, seed, 0.0),
            cutoff: ParamCurve::new(base),
            resonance: ParamCurve::new(resonance),
            external_gain: ParamCurve::new(external_gain(settings)),
            main_volume: ParamCurve::new(unit_level(settings.main_volume)),
            tuner: ReferenceTone::new(TUNER_HZ),
            tuner_gain: ParamCurve::new(tuner_level(settings)),
            noise_seed: seed.wrapping_add(1),
            scratch: ChainScratch::new(),
            buffers: RenderBuffers::new(),
        }
    }

    /// Claim a bank and build every node a voice for `note` needs.
    ///
    /// Silent oscillator and noise chains are skipped; the amplitude stage,
    /// LFO and modulation taps are always created.
    pub fn build(
        &mut self,
        note: Note,
        settings: &SynthSettings,
        now: f64,
        glide: Option<Glide>,
    ) -> Result<VoiceId, GraphError> {
        let voice = self.arena.claim()?;

        for slot in 0..settings.oscillators.len() {
            if settings.oscillators[slot].is_audible() {
                self.spawn_oscillator(voice, slot, note, settings, now, glide, 0.0);
            }
        }
        if settings.noise.is_audible() {
            self.spawn_noise(voice, note, settings, now, 0.0);
        }

        self.wire(NodeId::new(voice, Slot::Amp), Node::Amp(AmpStage::new(now)), Input::MainOut);
        let lfo = LfoNode::new(self.matrix.spawn_lfo());
        self.wire(NodeId::new(voice, Slot::Lfo), Node::Lfo(lfo), Input::ModSource(voice));

        let base = tracked_cutoff(&settings.filter, note);
        for dest in ModDestination::ALL {
            let tap = ModTap::new(dest, tap_target(settings, dest, base), now);
            self.wire(NodeId::new(voice, Slot::ModTap(dest)), Node::Tap(tap), dest.input(voice));
        }

        let osc3 = oscillator_frequency(settings, 2, note);
        match glide {
            Some(glide) => {
                self.matrix.track_note(oscillator_frequency(settings, 2, glide.from), now, 0.0);
                self.matrix.track_note(osc3, now, glide.time);
            }
            None => self.matrix.track_note(osc3, now, 0.0),
        }

        tracing::debug!(%voice, %note, nodes = self.arena.node_count(voice), "voice built");
        Ok(voice)
    }

    /// Move an existing voice to `note` over `time` without rebuilding it.
    pub fn retrigger(&mut self, voice: VoiceId, note: Note, settings: &SynthSettings, now: f64, time: f32) {
        for slot in 0..settings.oscillators.len() {
            let frequency = oscillator_frequency(settings, slot, note);
            if let Some(Node::Oscillator(chain)) = self.arena.get_mut(NodeId::new(voice, Slot::Oscillator(slot))) {
                chain.glide_to(frequency, now, time);
            }
        }
        if let Some(Node::Noise(chain)) = self.arena.get_mut(NodeId::new(voice, Slot::Noise)) {
            let noise = &settings.noise;
            chain.set_tone(tone_cutoff(noise.tone, note.frequency(), noise.sync));
        }

        self.matrix.track_note(oscillator_frequency(settings, 2, note), now, time);
        self.update_taps(voice, settings, note, now);
        tracing::debug!(%voice, %note, time, "voice retriggered");
    }

    /// Apply a settings change to a sounding voice, slot by slot.
    ///
    /// Disabled chains fade out and retire on their own; enabled ones are
    /// built (or revived if still fading) without touching their siblings.
    pub fn update_live(&mut self, voice: VoiceId, prev: &SynthSettings, next: &SynthSettings, note: Note, now: f64) {
        if !self.arena.is_live(voice) {
            return;
        }

        let pitch_moved = prev.pitch_offset() != next.pitch_offset() || prev.voicing != next.voicing;
        for slot in 0..next.oscillators.len() {
            let id = NodeId::new(voice, Slot::Oscillator(slot));
            let target = oscillator_gain(next, slot);
            let settings = &next.oscillators[slot];
            let changed = pitch_moved || prev.oscillators[slot] != *settings;

            match self.arena.get_mut(id) {
                Some(Node::Oscillator(chain)) => {
                    if !settings.is_audible() {
                        if chain.retire_at().is_none() {
                            chain.retire(now, DISABLE_FADE, now + (DISABLE_FADE as f64) + TEARDOWN_MARGIN);
                            tracing::debug!(node = %id, "oscillator disabled");
                        }
                        continue;
                    }
                    if chain.retire_at().is_some() {
                        chain.revive(target, now, SPLICE_FADE);
                    } else if changed {
                        chain.ramp_gain(target, now, PARAM_RAMP);
                    }
                    if changed {
                        chain.set_waveform(settings.waveform);
                        chain.set_pan(next.voicing.pan[slot]);
                        chain.glide_to(oscillator_frequency(next, slot, note), now, PARAM_RAMP);
                    }
                }
                Some(_) => tracing::warn!(node = %id, "unexpected node in oscillator slot"),
                None if settings.is_audible() => {
                    self.spawn_oscillator(voice, slot, note, next, now, None, SPLICE_FADE);
                    tracing::debug!(node = %id, "oscillator spliced in");
                }
                None => {}
            }
        }

        self.update_noise(voice, prev, next, note, now);

        let lfo_id = NodeId::new(voice, Slot::Lfo);
        if let Some(Node::Lfo(node)) = self.arena.get_mut(lfo_id) {
            let lfo = node.lfo_mut();
            lfo.set_waveform(next.modulation.lfo_waveform);
            lfo.set_frequency(next.modulation.lfo_hz());
        }

        self.update_taps(voice, next, note, now);
    }

    fn update_noise(&mut self, voice: VoiceId, prev: &SynthSettings, next: &SynthSettings, note: Note, now: f64) {
        let id = NodeId::new(voice, Slot::Noise);
        let noise = &next.noise;
        let changed = prev.noise != *noise || prev.voicing.noise_pan != next.voicing.noise_pan;

        match self.arena.get_mut(id) {
            Some(Node::Noise(chain)) => {
                if !noise.is_audible() {
                    if chain.retire_at().is_none() {
                        chain.retire(now, DISABLE_FADE, now + (DISABLE_FADE as f64) + TEARDOWN_MARGIN);
                        tracing::debug!(node = %id, "noise disabled");
                    }
                    return;
                }
                if chain.retire_at().is_some() {
                    chain.revive(noise_gain(next), now, SPLICE_FADE);
                } else if changed {
                    chain.ramp_gain(noise_gain(next), now, PARAM_RAMP);
                }
                if changed {
                    chain.source_mut().set_color(noise.color);
                    chain.set_tone(tone_cutoff(noise.tone, note.frequency(), noise.sync));
                    chain.set_pan(next.voicing.noise_pan);
                }
            }
            Some(_) => tracing::warn!(node = %id, "unexpected node in noise slot"),
            None if noise.is_audible() => {
                self.spawn_noise(voice, note, next, now, SPLICE_FADE);
                tracing::debug!(node = %id, "noise spliced in");
            }
            None => {}
        }
    }

    /// Retarget the four destination taps of `voice`.
    pub fn update_taps(&mut self, voice: VoiceId, settings: &SynthSettings, note: Note, now: f64) {
        let base = tracked_cutoff(&settings.filter, note);
        for dest in ModDestination::ALL {
            if let Some(Node::Tap(tap)) = self.arena.get_mut(NodeId::new(voice, Slot::ModTap(dest))) {
                tap.set_target(tap_target(settings, dest, base), now);
            }
        }
    }

    /// Shared parameters that do not belong to any one voice.
    pub fn update_globals(&mut self, settings: &SynthSettings, now: f64) {
        ramp(&mut self.resonance, emphasis_to_resonance(settings.filter.emphasis), now, PARAM_RAMP);
        ramp(&mut self.external_gain, external_gain(settings), now, PARAM_RAMP);
        ramp(&mut self.main_volume, unit_level(settings.main_volume), now, PARAM_RAMP);
        ramp(&mut self.tuner_gain, tuner_level(settings), now, PARAM_RAMP);
        self.matrix.apply(settings, now);
    }

    /// Fade every chain and the amplitude stage of `voice` to silence.
    ///
    /// The voice's modulation taps are unplugged at once: the cutoff and
    /// resonance buses are shared, and a successor built inside the
    /// teardown window must be the only voice writing to them.
    ///
    /// Returns the instant after which `free` may drop the voice's nodes.
    pub fn teardown(&mut self, voice: VoiceId, now: f64, ramp: f32) -> f64 {
        let deadline = now + ramp.max(0.0) as f64 + TEARDOWN_MARGIN;
        for (_, node, _) in self.arena.nodes_mut(voice) {
            match node {
                Node::Oscillator(chain) => chain.retire(now, ramp, deadline),
                Node::Noise(chain) => chain.retire(now, ramp, deadline),
                Node::Amp(amp) => amp.ramp_to(0.0, now, ramp),
                Node::Lfo(_) | Node::Tap(_) => {}
            }
        }
        for dest in ModDestination::ALL {
            let id = NodeId::new(voice, Slot::ModTap(dest));
            if let Err(err) = self.arena.disconnect(id) {
                tracing::warn!(node = %id, %err, "mod tap already unplugged");
            }
        }
        tracing::debug!(%voice, deadline, "voice tearing down");
        deadline
    }

    /// Disconnect and drop every node of `voice`.
    pub fn free(&mut self, voice: VoiceId) -> Result<usize, GraphError> {
        let freed = self.arena.release(voice)?;
        tracing::debug!(%voice, freed, "voice freed");
        Ok(freed)
    }

    /// Drop chains whose retirement deadline has passed.
    pub fn collect(&mut self, now: f64) {
        let mut expired = [None; VOICE_BANKS * Slot::CHAINS];
        let mut count = 0;

        for voice in self.live_voices().into_iter().flatten() {
            for (slot, node, _) in self.arena.nodes_mut(voice) {
                if node.retire_at().is_some_and(|deadline| now >= deadline) {
                    debug_assert!(count < expired.len(), "more retiring chains than chain slots");
                    if count < expired.len() {
                        expired[count] = Some(NodeId::new(voice, slot));
                        count += 1;
                    }
                }
            }
        }

        for id in expired.into_iter().flatten() {
            if let Err(err) = self.arena.disconnect(id).and_then(|_| self.arena.remove(id).map(drop)) {
                tracing::warn!(node = %id, %err, "failed to retire chain");
            } else {
                tracing::debug!(node = %id, "chain retired");
            }
        }
    }

    /// Live voice ids in bank order.
    pub fn live_voices(&self) -> [Option<VoiceId>; VOICE_BANKS] {
        let mut voices = [None; VOICE_BANKS];
        for (slot, voice) in voices.iter_mut().zip(self.arena.live_voices()) {
            *slot = Some(voice);
        }
        voices
    }

    pub fn is_live(&self, voice: VoiceId) -> bool {
        self.arena.is_live(voice)
    }

    pub fn node_count(&self, voice: VoiceId) -> usize {
        self.arena.node_count(voice)
    }

    /// Chains wired into the filter that are not fading out.
    pub fn sounding_chains(&self, voice: VoiceId) -> usize {
        (0..3)
            .map(Slot::Oscillator)
            .chain([Slot::Noise])
            .filter(|&slot| {
                let id = NodeId::new(voice, slot);
                self.arena.output(id) == Some(Input::FilterIn)
                    && self.arena.get(id).is_some_and(|node| node.retire_at().is_none())
            })
            .count()
    }

    pub fn oscillator(&self, voice: VoiceId, slot: usize) -> Option<&OscillatorChain> {
        match self.arena.get(NodeId::new(voice, Slot::Oscillator(slot))) {
            Some(Node::Oscillator(chain)) => Some(chain),
            _ => None,
        }
    }

    pub fn noise(&self, voice: VoiceId) -> Option<&NoiseChain> {
        match self.arena.get(NodeId::new(voice, Slot::Noise)) {
            Some(Node::Noise(chain)) => Some(chain),
            _ => None,
        }
    }

    pub fn amp(&self, voice: VoiceId) -> Option<&AmpStage> {
        match self.arena.get(NodeId::new(voice, Slot::Amp)) {
            Some(Node::Amp(amp)) => Some(amp),
            _ => None,
        }
    }

    pub fn tap(&self, voice: VoiceId, dest: ModDestination) -> Option<&ModTap> {
        match self.arena.get(NodeId::new(voice, Slot::ModTap(dest))) {
            Some(Node::Tap(tap)) => Some(tap),
            _ => None,
        }
    }

    /// The loudness curve of `voice`, for the envelope generator to shape.
    pub fn amp_curve_mut(&mut self, voice: VoiceId) -> Option<&mut ParamCurve> {
        match self.arena.get_mut(NodeId::new(voice, Slot::Amp)) {
            Some(Node::Amp(amp)) => Some(amp.curve_mut()),
            _ => None,
        }
    }

    /// The shared base-cutoff curve the filter contour drives.
    pub fn cutoff_curve_mut(&mut self) -> &mut ParamCurve {
        &mut self.cutoff
    }

    pub fn cutoff_at(&self, t: f64) -> f32 {
        self.cutoff.value_at(t)
    }

    pub fn resonance_at(&self, t: f64) -> f32 {
        self.resonance.value_at(t)
    }

    pub fn main_volume_at(&self, t: f64) -> f32 {
        self.main_volume.value_at(t)
    }

    pub fn matrix(&self) -> &ModulationMatrix {
        &self.matrix
    }

    pub fn ladder(&self) -> &StereoLadder {
        &self.ladder
    }

    /// Render one block of at most `MAX_BLOCK_SIZE` frames.
    pub fn render(&mut self, ctx: &RenderCtx, left: &mut [f32], right: &mut [f32], input: Option<&[f32]>) {
        let len = left.len().min(right.len()).min(MAX_BLOCK_SIZE);
        let dt = ctx.sample_period();
        let voices = self.live_voices();

        let Self {
            arena,
            ladder,
            matrix,
            cutoff,
            resonance,
            external_gain,
            main_volume,
            tuner,
            tuner_gain,
            scratch,
            buffers: b,
            ..
        } = self;

        b.filter_left[..len].fill(0.0);
        b.filter_right[..len].fill(0.0);
        b.cutoff_mod[..len].fill(0.0);
        b.resonance_mod[..len].fill(0.0);
        b.amp_sum[..len].fill(0.0);

        matrix.render_sources(ctx, len);

        for voice in voices.into_iter().flatten() {
            b.amp[..len].fill(0.0);
            b.lfo[..len].fill(0.0);
            b.pitch_mod[..len].fill(0.0);
            b.gain_mod[..len].fill(0.0);

            for (_, node, output) in arena.nodes_mut(voice) {
                match node {
                    Node::Amp(amp) => {
                        amp.render_block(&mut b.amp[..len], ctx);
                        if output == Some(Input::MainOut) {
                            for (sum, &gain) in b.amp_sum[..len].iter_mut().zip(&b.amp[..len]) {
                                *sum += gain;
                            }
                        }
                    }
                    Node::Lfo(lfo) => lfo.render_block(&mut b.lfo[..len], ctx),
                    _ => {}
                }
            }

            matrix.mix_into(&mut b.bus[..len], &b.amp[..len], &b.lfo[..len]);

            for (_, node, output) in arena.nodes_mut(voice) {
                let Node::Tap(tap) = node else { continue };
                if output.is_none() {
                    continue;
                }
                tap.render_block(&mut b.tap[..len], ctx);
                let dest = match tap.destination() {
                    ModDestination::Cutoff => &mut b.cutoff_mod,
                    ModDestination::Resonance => &mut b.resonance_mod,
                    ModDestination::Pitch => &mut b.pitch_mod,
                    ModDestination::Volume => &mut b.gain_mod,
                };
                for ((d, &bus), &gain) in dest[..len].iter_mut().zip(&b.bus[..len]).zip(&b.tap[..len]) {
                    *d += bus * gain;
                }
            }

            for (_, node, output) in arena.nodes_mut(voice) {
                if output != Some(Input::FilterIn) {
                    continue;
                }
                match node {
                    Node::Oscillator(chain) => chain.render(
                        ctx,
                        &b.pitch_mod[..len],
                        &b.gain_mod[..len],
                        scratch,
                        &mut b.filter_left[..len],
                        &mut b.filter_right[..len],
                    ),
                    Node::Noise(chain) => chain.render(
                        ctx,
                        &b.gain_mod[..len],
                        scratch,
                        &mut b.filter_left[..len],
                        &mut b.filter_right[..len],
                    ),
                    _ => {}
                }
            }
        }

        if let Some(input) = input {
            external_gain.fill(ctx.time, dt, &mut b.level[..len]);
            for i in 0..len.min(input.len()) {
                let s = input[i] * b.level[i];
                b.filter_left[i] += s;
                b.filter_right[i] += s;
            }
        }

        cutoff.fill(ctx.time, dt, &mut b.cutoff[..len]);
        resonance.fill(ctx.time, dt, &mut b.resonance[..len]);
        for i in 0..len {
            b.cutoff[i] = clamp_cutoff(b.cutoff[i] + b.cutoff_mod[i]);
            b.resonance[i] = clamp_resonance(b.resonance[i] + b.resonance_mod[i]);
        }
        ladder.process(
            &mut b.filter_left[..len],
            &mut b.filter_right[..len],
            &b.cutoff[..len],
            &b.resonance[..len],
        );

        main_volume.fill(ctx.time, dt, &mut b.level[..len]);
        for i in 0..len {
            let gain = b.amp_sum[i] * b.level[i];
            left[i] = b.filter_left[i] * gain;
            right[i] = b.filter_right[i] * gain;
        }

        tuner_gain.fill(ctx.time, dt, &mut b.level[..len]);
        if b.level[..len].iter().any(|&gain| gain > 0.0) {
            tuner.render(&mut b.bus[..len], ctx.sample_rate);
            for i in 0..len {
                let s = b.bus[i] * b.level[i];
                left[i] += s;
                right[i] += s;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_oscillator(
        &mut self,
        voice: VoiceId,
        slot: usize,
        note: Note,
        settings: &SynthSettings,
        now: f64,
        glide: Option<Glide>,
        fade: f32,
    ) {
        let osc = &settings.oscillators[slot];
        let target = oscillator_frequency(settings, slot, note);
        let start = glide.map_or(target, |g| oscillator_frequency(settings, slot, g.from));

        let mut chain = OscillatorChain::new(osc.waveform, start, settings.voicing.pan[slot], now);
        if let Some(glide) = glide {
            chain.glide_to(target, now, glide.time);
        }
        chain.ramp_gain(oscillator_gain(settings, slot), now, fade);
        self.wire(NodeId::new(voice, Slot::Oscillator(slot)), Node::Oscillator(chain), Input::FilterIn);
    }

    fn spawn_noise(&mut self, voice: VoiceId, note: Note, settings: &SynthSettings, now: f64, fade: f32) {
        let noise = &settings.noise;
        self.noise_seed = self.noise_seed.wrapping_add(1);
        let source = NoiseSource::new(noise.color, self.noise_seed);
        let tone = tone_cutoff(noise.tone, note.frequency(), noise.sync);

        let mut chain = NoiseChain::new(source, tone, settings.voicing.noise_pan, now);
        chain.ramp_gain(noise_gain(settings), now, fade);
        self.wire(NodeId::new(voice, Slot::Noise), Node::Noise(chain), Input::FilterIn);
    }

    // Insert and connect; wiring errors are logged and skipped.
    fn wire(&mut self, id: NodeId, node: Node, input: Input) {
        let kind = node.kind();
        let result = self.arena.insert(id, node).and_then(|()| self.arena.connect(id, input));
        if let Err(err) = result {
            tracing::warn!(node = %id, kind, %err, "graph wiring failed");
        }
    }
}

fn ramp(curve: &mut ParamCurve, target: f32, now: f64, time: f32) {
    if (curve.target() - target).abs() > f32::EPSILON {
        curve.cancel_and_hold(now);
        curve.linear_ramp_to(target, now + time as f64);
    }
}
