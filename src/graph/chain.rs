//! Node payloads stored in the voice arena.
//!
//! Every node owns its scheduled curves. Control code reshapes the curves;
//! `render` only evaluates them, so nothing here allocates or blocks.

use std::f32::consts::FRAC_PI_4;

use crate::{
    dsp::{
        automation::ParamCurve,
        filter::ToneFilter,
        lfo::Lfo,
        noise::NoiseSource,
        oscillator::{OscillatorBlock, Waveform},
    },
    graph::{
        modulate::schedule_mod_ramp,
        node::{GraphNode, ModDestination, RenderCtx},
    },
    MAX_BLOCK_SIZE,
};

/// Equal-power pan law: -1 hard left, 0 centre, 1 hard right.
pub fn equal_power(pan: f32) -> (f32, f32) {
    let pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
    let angle = (pan + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// Work buffers shared by every chain during one render pass.
pub struct ChainScratch {
    signal: Vec<f32>,
    frequency: Vec<f32>,
    gain: Vec<f32>,
}

impl ChainScratch {
    pub fn new() -> Self {
        Self {
            signal: vec![0.0; MAX_BLOCK_SIZE],
            frequency: vec![0.0; MAX_BLOCK_SIZE],
            gain: vec![0.0; MAX_BLOCK_SIZE],
        }
    }
}

impl Default for ChainScratch {
    fn default() -> Self {
        Self::new()
    }
}

/// Oscillator → gain → pan for one of the three oscillator slots.
pub struct OscillatorChain {
    osc: OscillatorBlock,
    frequency: ParamCurve,
    gain: ParamCurve,
    pan: (f32, f32),
    retire_at: Option<f64>,
}

impl OscillatorChain {
    /// A silent chain at `frequency`; fade it in with `ramp_gain`.
    pub fn new(waveform: Waveform, frequency: f32, pan: f32, now: f64) -> Self {
        let mut frequency_curve = ParamCurve::new(frequency);
        frequency_curve.set_value(frequency, now);
        let mut gain = ParamCurve::new(0.0);
        gain.set_value(0.0, now);

        Self {
            osc: OscillatorBlock::new(waveform),
            frequency: frequency_curve,
            gain,
            pan: equal_power(pan),
            retire_at: None,
        }
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.osc.set_waveform(waveform);
    }

    pub fn waveform(&self) -> Waveform {
        self.osc.waveform()
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = equal_power(pan);
    }

    /// Move to `frequency` from wherever the pitch is now.
    pub fn glide_to(&mut self, frequency: f32, now: f64, time: f32) {
        self.frequency.cancel_and_hold(now);
        if time > 0.0 {
            self.frequency.linear_ramp_to(frequency, now + time as f64);
        } else {
            self.frequency.set_value(frequency, now);
        }
    }

    pub fn ramp_gain(&mut self, target: f32, now: f64, time: f32) {
        self.gain.cancel_and_hold(now);
        self.gain.linear_ramp_to(target, now + time.max(0.0) as f64);
    }

    /// Fade to silence; the arena frees the chain after `deadline`.
    pub fn retire(&mut self, now: f64, fade: f32, deadline: f64) {
        self.ramp_gain(0.0, now, fade);
        self.retire_at = Some(deadline);
    }

    /// Cancel a pending retirement and fade back up.
    pub fn revive(&mut self, target: f32, now: f64, time: f32) {
        self.retire_at = None;
        self.ramp_gain(target, now, time);
    }

    pub fn retire_at(&self) -> Option<f64> {
        self.retire_at
    }

    pub fn frequency_at(&self, t: f64) -> f32 {
        self.frequency.value_at(t)
    }

    pub fn gain_at(&self, t: f64) -> f32 {
        self.gain.value_at(t)
    }

    pub fn gain_target(&self) -> f32 {
        self.gain.target()
    }

    /// Add this chain into the stereo bus.
    ///
    /// `pitch_mod` is in semitones; `gain_mod` scales the gain around 1.
    pub fn render(
        &mut self,
        ctx: &RenderCtx,
        pitch_mod: &[f32],
        gain_mod: &[f32],
        scratch: &mut ChainScratch,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let len = left.len();
        let dt = ctx.sample_period();
        let ChainScratch {
            signal,
            frequency,
            gain,
        } = scratch;
        let (signal, frequency, gain) = (&mut signal[..len], &mut frequency[..len], &mut gain[..len]);

        self.frequency.fill(ctx.time, dt, frequency);
        for (hz, &semitones) in frequency.iter_mut().zip(pitch_mod) {
            if semitones != 0.0 {
                *hz *= 2.0_f32.powf(semitones / 12.0);
            }
        }
        self.osc.render(signal, frequency, ctx.sample_rate);
        self.gain.fill(ctx.time, dt, gain);

        let (pan_l, pan_r) = self.pan;
        for i in 0..len {
            let s = signal[i] * gain[i] * (1.0 + gain_mod[i]).max(0.0);
            left[i] += s * pan_l;
            right[i] += s * pan_r;
        }
    }
}

/// Noise → gain → tone filter → pan.
pub struct NoiseChain {
    source: NoiseSource,
    gain: ParamCurve,
    tone: ToneFilter,
    pan: (f32, f32),
    retire_at: Option<f64>,
}

impl NoiseChain {
    pub fn new(source: NoiseSource, tone_hz: f32, pan: f32, now: f64) -> Self {
        let mut gain = ParamCurve::new(0.0);
        gain.set_value(0.0, now);

        Self {
            source,
            gain,
            tone: ToneFilter::lowpass(tone_hz),
            pan: equal_power(pan),
            retire_at: None,
        }
    }

    pub fn source_mut(&mut self) -> &mut NoiseSource {
        &mut self.source
    }

    pub fn set_tone(&mut self, tone_hz: f32) {
        self.tone.set_cutoff(tone_hz);
    }

    pub fn tone(&self) -> f32 {
        self.tone.cutoff()
    }

    pub fn set_pan(&mut self, pan: f32) {
        self.pan = equal_power(pan);
    }

    pub fn ramp_gain(&mut self, target: f32, now: f64, time: f32) {
        self.gain.cancel_and_hold(now);
        self.gain.linear_ramp_to(target, now + time.max(0.0) as f64);
    }

    pub fn retire(&mut self, now: f64, fade: f32, deadline: f64) {
        self.ramp_gain(0.0, now, fade);
        self.retire_at = Some(deadline);
    }

    pub fn revive(&mut self, target: f32, now: f64, time: f32) {
        self.retire_at = None;
        self.ramp_gain(target, now, time);
    }

    pub fn retire_at(&self) -> Option<f64> {
        self.retire_at
    }

    pub fn gain_at(&self, t: f64) -> f32 {
        self.gain.value_at(t)
    }

    pub fn render(
        &mut self,
        ctx: &RenderCtx,
        gain_mod: &[f32],
        scratch: &mut ChainScratch,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let len = left.len();
        let ChainScratch { signal, gain, .. } = scratch;
        let (signal, gain) = (&mut signal[..len], &mut gain[..len]);

        self.source.render(signal);
        self.gain.fill(ctx.time, ctx.sample_period(), gain);
        for ((s, &g), &m) in signal.iter_mut().zip(gain.iter()).zip(gain_mod) {
            *s *= g * (1.0 + m).max(0.0);
        }
        self.tone.render(signal, ctx.sample_rate);

        let (pan_l, pan_r) = self.pan;
        for ((l, r), &s) in left.iter_mut().zip(right.iter_mut()).zip(signal.iter()) {
            *l += s * pan_l;
            *r += s * pan_r;
        }
    }
}

/// The voice's loudness contour, applied after the shared filter.
pub struct AmpStage {
    gain: ParamCurve,
}

impl AmpStage {
    pub fn new(now: f64) -> Self {
        let mut gain = ParamCurve::new(0.0);
        gain.set_value(0.0, now);
        Self { gain }
    }

    pub fn curve_mut(&mut self) -> &mut ParamCurve {
        &mut self.gain
    }

    pub fn level_at(&self, t: f64) -> f32 {
        self.gain.value_at(t)
    }

    pub fn ramp_to(&mut self, target: f32, now: f64, time: f32) {
        self.gain.cancel_and_hold(now);
        self.gain.linear_ramp_to(target, now + time.max(0.0) as f64);
    }
}

impl GraphNode for AmpStage {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.gain.fill(ctx.time, ctx.sample_period(), out);
    }
}

/// Per-voice LFO instance, phase-locked to the bus reference on creation.
pub struct LfoNode {
    lfo: Lfo,
}

impl LfoNode {
    pub fn new(lfo: Lfo) -> Self {
        Self { lfo }
    }

    pub fn lfo_mut(&mut self) -> &mut Lfo {
        &mut self.lfo
    }
}

impl GraphNode for LfoNode {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.lfo.render(out, ctx.sample_rate);
    }
}

/// Gain tap between the modulation bus and one destination.
pub struct ModTap {
    destination: ModDestination,
    gain: ParamCurve,
}

impl ModTap {
    pub fn new(destination: ModDestination, target: f32, now: f64) -> Self {
        let mut gain = ParamCurve::new(0.0);
        gain.set_value(0.0, now);
        schedule_mod_ramp(&mut gain, target, now);
        Self { destination, gain }
    }

    pub fn destination(&self) -> ModDestination {
        self.destination
    }

    /// Move toward `target` along the bus's delayed ramp.
    pub fn set_target(&mut self, target: f32, now: f64) {
        if (self.gain.target() - target).abs() > f32::EPSILON {
            schedule_mod_ramp(&mut self.gain, target, now);
        }
    }

    pub fn target(&self) -> f32 {
        self.gain.target()
    }

    pub fn gain_at(&self, t: f64) -> f32 {
        self.gain.value_at(t)
    }
}

impl GraphNode for ModTap {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.gain.fill(ctx.time, ctx.sample_period(), out);
    }
}

/// Everything the arena can hold.
pub enum Node {
    Oscillator(OscillatorChain),
    Noise(NoiseChain),
    Amp(AmpStage),
    Lfo(LfoNode),
    Tap(ModTap),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Oscillator(_) => "oscillator",
            Node::Noise(_) => "noise",
            Node::Amp(_) => "amp",
            Node::Lfo(_) => "lfo",
            Node::Tap(_) => "mod-tap",
        }
    }

    pub fn retire_at(&self) -> Option<f64> {
        match self {
            Node::Oscillator(chain) => chain.retire_at(),
            Node::Noise(chain) => chain.retire_at(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::noise::NoiseColor;

    fn rms(buffer: &[f32]) -> f32 {
        (buffer.iter().map(|s| s * s).sum::<f32>() / buffer.len().max(1) as f32).sqrt()
    }

    #[test]
    fn equal_power_keeps_energy_constant() {
        for &pan in &[-1.0, -0.5, 0.0, 0.3, 1.0] {
            let (l, r) = equal_power(pan);
            assert!((l * l + r * r - 1.0).abs() < 1e-5);
        }
        let (l, r) = equal_power(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
    }

    #[test]
    fn oscillator_chain_fades_in_and_glides() {
        let ctx = RenderCtx::new(48_000.0, 0.0);
        let mut chain = OscillatorChain::new(Waveform::Sawtooth, 220.0, 0.0, 0.0);
        chain.ramp_gain(0.8, 0.0, 0.01);
        chain.glide_to(440.0, 0.0, 0.1);

        assert!((chain.frequency_at(0.05) - 330.0).abs() < 0.5);
        assert!((chain.gain_at(0.02) - 0.8).abs() < 1e-6);

        let mut scratch = ChainScratch::new();
        let zeros = vec![0.0f32; 512];
        let (mut left, mut right) = (vec![0.0f32; 512], vec![0.0f32; 512]);
        chain.render(&ctx, &zeros, &zeros, &mut scratch, &mut left, &mut right);
        assert!(rms(&left) > 0.05);
        assert!(
            left.iter().zip(&right).all(|(l, r)| (l - r).abs() < 1e-6),
            "centre pan feeds both sides equally"
        );
    }

    #[test]
    fn retired_chain_reaches_silence_after_fade() {
        let mut chain = OscillatorChain::new(Waveform::Square, 110.0, 0.0, 0.0);
        chain.ramp_gain(1.0, 0.0, 0.0);
        chain.retire(1.0, 0.1, 1.25);

        assert_eq!(chain.retire_at(), Some(1.25));
        assert!(chain.gain_at(1.05) > 0.0);
        assert_eq!(chain.gain_at(1.1), 0.0);

        chain.revive(0.5, 1.05, 0.05);
        assert_eq!(chain.retire_at(), None);
        assert!((chain.gain_at(1.2) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn volume_modulation_cannot_invert_the_signal() {
        let ctx = RenderCtx::new(48_000.0, 0.0);
        let mut chain = OscillatorChain::new(Waveform::Sawtooth, 220.0, 0.0, 0.0);
        chain.ramp_gain(1.0, 0.0, 0.0);

        let mut scratch = ChainScratch::new();
        let zeros = vec![0.0f32; 256];
        let crush = vec![-3.0f32; 256];
        let (mut left, mut right) = (vec![0.0f32; 256], vec![0.0f32; 256]);
        chain.render(&ctx, &zeros, &crush, &mut scratch, &mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn noise_chain_is_darkened_by_tone() {
        let ctx = RenderCtx::new(48_000.0, 0.0);
        let mut bright = NoiseChain::new(NoiseSource::new(NoiseColor::White, 5), 20_000.0, 0.0, 0.0);
        let mut dark = NoiseChain::new(NoiseSource::new(NoiseColor::White, 5), 200.0, 0.0, 0.0);
        bright.ramp_gain(1.0, 0.0, 0.0);
        dark.ramp_gain(1.0, 0.0, 0.0);

        let mut scratch = ChainScratch::new();
        let zeros = vec![0.0f32; 2_048];
        let (mut bl, mut br) = (vec![0.0f32; 2_048], vec![0.0f32; 2_048]);
        let (mut dl, mut dr) = (vec![0.0f32; 2_048], vec![0.0f32; 2_048]);
        bright.render(&ctx, &zeros, &mut scratch, &mut bl, &mut br);
        dark.render(&ctx, &zeros, &mut scratch, &mut dl, &mut dr);

        assert!(rms(&dl) < rms(&bl) * 0.5);
    }

    #[test]
    fn mod_tap_waits_before_ramping() {
        let tap = ModTap::new(ModDestination::Pitch, 0.5, 0.0);
        assert_eq!(tap.gain_at(0.01), 0.0);
        assert!((tap.gain_at(0.12) - 0.25).abs() < 1e-4);
        assert!((tap.gain_at(0.3) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn amp_stage_fades_from_its_live_level() {
        let mut amp = AmpStage::new(0.0);
        assert_eq!(amp.level_at(0.0), 0.0);
        amp.ramp_to(1.0, 0.0, 0.1);
        assert!((amp.level_at(0.05) - 0.5).abs() < 1e-4);
        amp.ramp_to(0.0, 0.05, 0.1);
        assert!((amp.level_at(0.05) - 0.5).abs() < 1e-4);
        assert_eq!(amp.level_at(0.5), 0.0);
    }
}
