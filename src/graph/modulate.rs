use crate::{
    dsp::{
        automation::ParamCurve,
        lfo::Lfo,
        noise::{NoiseColor, NoiseSource},
        oscillator::{OscillatorBlock, Waveform},
    },
    graph::node::{ModDestination, RenderCtx},
    synth::settings::SynthSettings,
    MAX_BLOCK_SIZE,
};

/*
Modulation Matrix
=================

Two sources are crossfaded into one modulation bus, the bus is scaled by the
mod wheel, and four per-voice taps send it to the destinations.

    left source ──► × leftGain ──┐
                                 (+) ──► × wheel ──► bus ──┬─► × tap ─► cutoff
    right source ─► × rightGain ─┘                        ├─► × tap ─► resonance
                                                          ├─► × tap ─► pitch
                                                          └─► × tap ─► volume

Sources
-------

  left     Oscillator 3's waveform on a dedicated modulation oscillator.
           With keyboard control on it follows oscillator 3's pitch; off, it
           drones at 6 Hz. Alternatively the voice's own loudness contour.

  right    The voice's LFO (triangle or square), or white noise.

Gains
-----

    leftGain  = (1 − mix) · depth
    rightGain =      mix  · depth
    wheel     = mod wheel / 100

Each tap's gain is a fixed destination multiplier, switched on or off by the
routing flag:

    cutoff     0.02 · base cutoff        (Hz per unit of bus)
    resonance  0.5
    pitch      min(0.5, 0.5 / √ratio)   (semitones; ratio = osc 1 / note)
    volume     0.05                      (fractional gain change)

With the wheel all the way up every multiplier is scaled by the voicing's
full-wheel attenuation so the deepest setting stays musical.

Every gain change is a delayed ramp: hold for 20 ms, then move linearly over
200 ms. Rapid knob sweeps therefore never step the bus.
*/

/// Hold before a modulation gain starts to move.
pub const MOD_RAMP_DELAY: f64 = 0.02;
/// Length of a modulation gain ramp.
pub const MOD_RAMP_TIME: f64 = 0.2;
/// Modulation oscillator rate when it ignores the keyboard.
pub const DRONE_HZ: f32 = 6.0;

const CUTOFF_MULTIPLIER: f32 = 0.02;
const RESONANCE_MULTIPLIER: f32 = 0.5;
const PITCH_MULTIPLIER: f32 = 0.5;
const VOLUME_MULTIPLIER: f32 = 0.05;

/// Cancel, hold briefly, then ramp to `target`.
pub fn schedule_mod_ramp(curve: &mut ParamCurve, target: f32, now: f64) {
    curve.cancel_and_hold(now);
    curve.hold_until(now + MOD_RAMP_DELAY);
    curve.linear_ramp_to(target, now + MOD_RAMP_DELAY + MOD_RAMP_TIME);
}

/// Source gains `(left, right)` for a settings snapshot.
pub fn source_gains(settings: &SynthSettings) -> (f32, f32) {
    let routing = &settings.modulation.routing;
    let depth = if routing.depth.is_finite() {
        routing.depth.max(0.0)
    } else {
        0.0
    };
    let mix = routing.mix_ratio();
    ((1.0 - mix) * depth, mix * depth)
}

/// Tap gain for one destination, before the per-sample bus.
pub fn tap_target(settings: &SynthSettings, destination: ModDestination, base_cutoff: f32) -> f32 {
    let routing = &settings.modulation.routing;
    let (enabled, multiplier) = match destination {
        ModDestination::Cutoff => (routing.cutoff, CUTOFF_MULTIPLIER * base_cutoff),
        ModDestination::Resonance => (routing.resonance, RESONANCE_MULTIPLIER),
        ModDestination::Pitch => (routing.pitch, pitch_multiplier(settings)),
        ModDestination::Volume => (routing.volume, VOLUME_MULTIPLIER),
    };
    if !enabled {
        return 0.0;
    }

    let attenuation = if settings.mod_wheel >= 100.0 {
        settings.voicing.full_wheel_attenuation
    } else {
        1.0
    };
    multiplier * attenuation
}

/// All four tap gains, indexed by `ModDestination::index`.
pub fn tap_targets(settings: &SynthSettings, base_cutoff: f32) -> [f32; 4] {
    ModDestination::ALL.map(|dest| tap_target(settings, dest, base_cutoff))
}

// Wider intervals above the note get a smaller vibrato.
fn pitch_multiplier(settings: &SynthSettings) -> f32 {
    let osc = &settings.oscillators[0];
    let semitones = if osc.frequency.is_finite() { osc.frequency } else { 0.0 };
    let ratio = osc.range.multiplier() * 2.0_f32.powf(semitones / 12.0);
    if ratio > 0.0 && ratio.is_finite() {
        PITCH_MULTIPLIER.min(PITCH_MULTIPLIER / ratio.sqrt())
    } else {
        PITCH_MULTIPLIER
    }
}

/// The shared half of the modulation bus: both source gains, the wheel,
/// the modulation oscillator and the noise source. The per-voice half
/// (LFO, loudness tap, destination taps) lives in the voice's nodes.
pub struct ModulationMatrix {
    left_gain: ParamCurve,
    right_gain: ParamCurve,
    wheel: ParamCurve,
    mod_osc: OscillatorBlock,
    mod_frequency: ParamCurve,
    noise: NoiseSource,
    reference: Lfo,
    osc3_source: bool,
    lfo_source: bool,
    osc3_control: bool,

    left_gain_buf: Vec<f32>,
    right_gain_buf: Vec<f32>,
    wheel_buf: Vec<f32>,
    frequency_buf: Vec<f32>,
    osc_buf: Vec<f32>,
    noise_buf: Vec<f32>,
}

impl ModulationMatrix {
    pub fn new(settings: &SynthSettings, seed: u64, now: f64) -> Self {
        let (left, right) = source_gains(settings);
        let mut left_gain = ParamCurve::new(left);
        left_gain.set_value(left, now);
        let mut right_gain = ParamCurve::new(right);
        right_gain.set_value(right, now);
        let mut wheel = ParamCurve::new(settings.wheel_amount());
        wheel.set_value(settings.wheel_amount(), now);

        let mod_settings = &settings.modulation;
        Self {
            left_gain,
            right_gain,
            wheel,
            mod_osc: OscillatorBlock::new(settings.oscillators[2].waveform),
            mod_frequency: ParamCurve::new(DRONE_HZ),
            noise: NoiseSource::new(NoiseColor::White, seed),
            reference: {
                let mut lfo = Lfo::new(mod_settings.lfo_waveform, mod_settings.lfo_hz());
                lfo.set_frequency(mod_settings.lfo_hz());
                lfo
            },
            osc3_source: mod_settings.osc3_source,
            lfo_source: mod_settings.lfo_source,
            osc3_control: mod_settings.osc3_control,
            left_gain_buf: vec![0.0; MAX_BLOCK_SIZE],
            right_gain_buf: vec![0.0; MAX_BLOCK_SIZE],
            wheel_buf: vec![0.0; MAX_BLOCK_SIZE],
            frequency_buf: vec![0.0; MAX_BLOCK_SIZE],
            osc_buf: vec![0.0; MAX_BLOCK_SIZE],
            noise_buf: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    /// Reschedule the shared gains and switch sources for a new snapshot.
    pub fn apply(&mut self, settings: &SynthSettings, now: f64) {
        let (left, right) = source_gains(settings);
        retarget(&mut self.left_gain, left, now);
        retarget(&mut self.right_gain, right, now);
        retarget(&mut self.wheel, settings.wheel_amount(), now);

        let mod_settings = &settings.modulation;
        self.osc3_source = mod_settings.osc3_source;
        self.lfo_source = mod_settings.lfo_source;
        self.mod_osc.set_waveform(settings.oscillators[2].waveform);
        self.reference.set_waveform(mod_settings.lfo_waveform);
        self.reference.set_frequency(mod_settings.lfo_hz());

        if self.osc3_control && !mod_settings.osc3_control {
            self.mod_frequency.cancel_and_hold(now);
            self.mod_frequency.linear_ramp_to(DRONE_HZ, now + MOD_RAMP_TIME);
        }
        self.osc3_control = mod_settings.osc3_control;
    }

    /// Follow oscillator 3 to `frequency` when keyboard control is on.
    pub fn track_note(&mut self, frequency: f32, now: f64, time: f32) {
        if !self.osc3_control {
            return;
        }
        self.mod_frequency.cancel_and_hold(now);
        if time > 0.0 {
            self.mod_frequency.linear_ramp_to(frequency, now + time as f64);
        } else {
            self.mod_frequency.set_value(frequency, now);
        }
    }

    /// A fresh voice LFO locked to the running reference phase.
    pub fn spawn_lfo(&self) -> Lfo {
        Lfo::synced_to(&self.reference)
    }

    pub fn left_gain_at(&self, t: f64) -> f32 {
        self.left_gain.value_at(t)
    }

    pub fn right_gain_at(&self, t: f64) -> f32 {
        self.right_gain.value_at(t)
    }

    pub fn wheel_at(&self, t: f64) -> f32 {
        self.wheel.value_at(t)
    }

    pub fn mod_frequency_at(&self, t: f64) -> f32 {
        self.mod_frequency.value_at(t)
    }

    pub fn waveform(&self) -> Waveform {
        self.mod_osc.waveform()
    }

    /// Render the shared sources and gain curves for the next `len` frames.
    pub fn render_sources(&mut self, ctx: &RenderCtx, len: usize) {
        let dt = ctx.sample_period();
        self.left_gain.fill(ctx.time, dt, &mut self.left_gain_buf[..len]);
        self.right_gain.fill(ctx.time, dt, &mut self.right_gain_buf[..len]);
        self.wheel.fill(ctx.time, dt, &mut self.wheel_buf[..len]);

        if self.osc3_source {
            self.mod_frequency.fill(ctx.time, dt, &mut self.frequency_buf[..len]);
            self.mod_osc
                .render(&mut self.osc_buf[..len], &self.frequency_buf[..len], ctx.sample_rate);
        }
        if !self.lfo_source {
            self.noise.render(&mut self.noise_buf[..len]);
        }
        self.reference.advance(len, ctx.sample_rate);
    }

    /// Mix one voice's bus from its loudness contour and LFO block.
    pub fn mix_into(&self, out: &mut [f32], envelope: &[f32], lfo: &[f32]) {
        let len = out.len();
        let left = if self.osc3_source {
            &self.osc_buf[..len]
        } else {
            &envelope[..len]
        };
        let right = if self.lfo_source {
            &lfo[..len]
        } else {
            &self.noise_buf[..len]
        };

        for i in 0..len {
            let sum = left[i] * self.left_gain_buf[i] + right[i] * self.right_gain_buf[i];
            out[i] = sum * self.wheel_buf[i];
        }
    }
}

fn retarget(curve: &mut ParamCurve, target: f32, now: f64) {
    if (curve.target() - target).abs() > f32::EPSILON {
        schedule_mod_ramp(curve, target, now);
    }
}
