//! Immutable settings snapshots and the partial deltas merged into them.
//!
//! The control side owns one `SynthSettings` value. A `SettingsPatch` names
//! only the top-level sections that change; `merged` returns a fresh snapshot
//! and leaves the original untouched. Snapshots are `Copy`, so they travel to
//! the render side by value with no shared state.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::{
    envelope::EnvelopeParams,
    lfo::{lfo_rate_hz, LfoWaveform},
    noise::NoiseColor,
    oscillator::{Range, Waveform},
};

/// Ear-tuned constants that thicken the three-oscillator stack.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voicing {
    /// Multiplier on every modulation destination when the wheel is at 100.
    pub full_wheel_attenuation: f32,
    pub volume_boost: [f32; 3],
    pub detune_cents: [f32; 3],
    pub pan: [f32; 3],
    pub noise_pan: f32,
}

impl Default for Voicing {
    fn default() -> Self {
        Self {
            full_wheel_attenuation: 0.7,
            volume_boost: [1.15, 1.10, 1.0],
            detune_cents: [0.0, 2.0, -3.0],
            pan: [0.0, -0.2, 0.2],
            noise_pan: 0.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorSettings {
    pub enabled: bool,
    /// Mixer level, 0-10.
    pub volume: f32,
    pub waveform: Waveform,
    pub range: Range,
    /// Offset from the played note in semitones.
    pub frequency: f32,
}

impl OscillatorSettings {
    /// True when the chain would make sound and is worth building.
    pub fn is_audible(&self) -> bool {
        self.enabled && self.volume > 0.0
    }
}

impl Default for OscillatorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 8.0,
            waveform: Waveform::Sawtooth,
            range: Range::Eight,
            frequency: 0.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSettings {
    pub enabled: bool,
    pub volume: f32,
    pub color: NoiseColor,
    /// Tone filter cutoff in Hz.
    pub tone: f32,
    /// Scale the tone cutoff with the played note.
    pub sync: bool,
}

impl NoiseSettings {
    pub fn is_audible(&self) -> bool {
        self.enabled && self.volume > 0.0
    }
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: 0.0,
            color: NoiseColor::Pink,
            tone: 8_000.0,
            sync: false,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExternalInputSettings {
    pub enabled: bool,
    pub volume: f32,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    /// Cutoff knob, -4 to 4.
    pub cutoff: f32,
    /// Emphasis (resonance) knob, 0-10.
    pub emphasis: f32,
    /// Contour amount knob, 0-10 (0 to 4 octaves).
    pub contour_amount: f32,
    /// Drive the cutoff from the filter contour.
    pub contour_enabled: bool,
    pub keyboard_control_1: bool,
    pub keyboard_control_2: bool,
    pub envelope: EnvelopeParams,
}

impl FilterSettings {
    /// Whether both settings drive the cutoff the same way; only the
    /// emphasis may differ.
    pub fn same_cutoff_path(&self, other: &Self) -> bool {
        Self {
            emphasis: other.emphasis,
            ..*self
        } == *other
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            cutoff: 0.0,
            emphasis: 2.0,
            contour_amount: 5.0,
            contour_enabled: true,
            keyboard_control_1: false,
            keyboard_control_2: false,
            envelope: EnvelopeParams {
                attack: 2.0,
                decay: 5.0,
                sustain: 5.0,
                release: 5.0,
            },
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlideSettings {
    pub enabled: bool,
    /// Glide knob, 0-10.
    pub time: f32,
}

/// Which destinations the modulation bus reaches, and how the two sources blend.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationRouting {
    pub cutoff: bool,
    pub resonance: bool,
    pub pitch: bool,
    pub volume: bool,
    pub depth: f32,
    /// Source mix knob, 0 (all left) to 10 (all right).
    pub mix: f32,
}

impl ModulationRouting {
    pub fn mix_ratio(&self) -> f32 {
        if self.mix.is_finite() {
            (self.mix / 10.0).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for ModulationRouting {
    fn default() -> Self {
        Self {
            cutoff: false,
            resonance: false,
            pitch: false,
            volume: false,
            depth: 5.0,
            mix: 5.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationSettings {
    pub routing: ModulationRouting,
    /// Left source: oscillator 3 when true, the loudness contour when false.
    pub osc3_source: bool,
    /// Right source: LFO when true, noise when false.
    pub lfo_source: bool,
    /// LFO rate knob, 0-10.
    pub lfo_rate: f32,
    pub lfo_waveform: LfoWaveform,
    /// Oscillator 3 follows the keyboard; off leaves it droning at 6 Hz.
    pub osc3_control: bool,
}

impl ModulationSettings {
    pub fn lfo_hz(&self) -> f32 {
        lfo_rate_hz(self.lfo_rate)
    }
}

impl Default for ModulationSettings {
    fn default() -> Self {
        Self {
            routing: ModulationRouting::default(),
            osc3_source: false,
            lfo_source: true,
            lfo_rate: 5.0,
            lfo_waveform: LfoWaveform::Triangle,
            osc3_control: true,
        }
    }
}

/// Complete engine configuration at one instant.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthSettings {
    pub oscillators: [OscillatorSettings; 3],
    pub noise: NoiseSettings,
    pub external_input: ExternalInputSettings,
    pub filter: FilterSettings,
    pub loudness: EnvelopeParams,
    /// Release follows the decay time instead of the release time.
    pub decay_switch: bool,
    pub glide: GlideSettings,
    pub modulation: ModulationSettings,
    /// Mod wheel, 0-100.
    pub mod_wheel: f32,
    /// Pitch wheel, 0-100 with 50 at rest.
    pub pitch_wheel: f32,
    /// Master tune in semitones, -2 to 2.
    pub master_tune: f32,
    /// Keyboard octave shift.
    pub octave: i8,
    /// Output level, 0-10.
    pub main_volume: f32,
    /// A-440 reference tone mixed into the output.
    pub tuner: bool,
    pub voicing: Voicing,
}

impl Default for SynthSettings {
    fn default() -> Self {
        let mut oscillators = [OscillatorSettings::default(); 3];
        oscillators[2].waveform = Waveform::Triangle;

        Self {
            oscillators,
            noise: NoiseSettings::default(),
            external_input: ExternalInputSettings::default(),
            filter: FilterSettings::default(),
            loudness: EnvelopeParams::default(),
            decay_switch: false,
            glide: GlideSettings::default(),
            modulation: ModulationSettings::default(),
            mod_wheel: 0.0,
            pitch_wheel: 50.0,
            master_tune: 0.0,
            octave: 0,
            main_volume: 7.0,
            tuner: false,
            voicing: Voicing::default(),
        }
    }
}

impl SynthSettings {
    /// Structural copy with every section named in `patch` replaced.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        let mut next = *self;
        for (slot, replacement) in next.oscillators.iter_mut().zip(patch.oscillators) {
            if let Some(osc) = replacement {
                *slot = osc;
            }
        }
        apply(&mut next.noise, patch.noise);
        apply(&mut next.external_input, patch.external_input);
        apply(&mut next.filter, patch.filter);
        apply(&mut next.loudness, patch.loudness);
        apply(&mut next.decay_switch, patch.decay_switch);
        apply(&mut next.glide, patch.glide);
        apply(&mut next.modulation, patch.modulation);
        apply(&mut next.mod_wheel, patch.mod_wheel);
        apply(&mut next.pitch_wheel, patch.pitch_wheel);
        apply(&mut next.master_tune, patch.master_tune);
        apply(&mut next.octave, patch.octave);
        apply(&mut next.main_volume, patch.main_volume);
        apply(&mut next.tuner, patch.tuner);
        apply(&mut next.voicing, patch.voicing);
        next
    }

    /// Pitch offset in semitones from tune, bend and octave.
    pub fn pitch_offset(&self) -> f32 {
        let bend = if self.pitch_wheel.is_finite() {
            (self.pitch_wheel.clamp(0.0, 100.0) - 50.0) / 50.0 * 2.0
        } else {
            0.0
        };
        let tune = if self.master_tune.is_finite() {
            self.master_tune.clamp(-2.0, 2.0)
        } else {
            0.0
        };
        tune + bend + 12.0 * self.octave as f32
    }

    /// Mod wheel as 0-1.
    pub fn wheel_amount(&self) -> f32 {
        if self.mod_wheel.is_finite() {
            (self.mod_wheel / 100.0).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

fn apply<T: Copy>(slot: &mut T, replacement: Option<T>) {
    if let Some(value) = replacement {
        *slot = value;
    }
}

/// A partial update; `None` keeps the current section.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SettingsPatch {
    pub oscillators: [Option<OscillatorSettings>; 3],
    pub noise: Option<NoiseSettings>,
    pub external_input: Option<ExternalInputSettings>,
    pub filter: Option<FilterSettings>,
    pub loudness: Option<EnvelopeParams>,
    pub decay_switch: Option<bool>,
    pub glide: Option<GlideSettings>,
    pub modulation: Option<ModulationSettings>,
    pub mod_wheel: Option<f32>,
    pub pitch_wheel: Option<f32>,
    pub master_tune: Option<f32>,
    pub octave: Option<i8>,
    pub main_volume: Option<f32>,
    pub tuner: Option<bool>,
    pub voicing: Option<Voicing>,
}

impl SettingsPatch {
    pub fn oscillator(mut self, index: usize, settings: OscillatorSettings) -> Self {
        if let Some(slot) = self.oscillators.get_mut(index) {
            *slot = Some(settings);
        }
        self
    }

    pub fn mod_wheel(mut self, value: f32) -> Self {
        self.mod_wheel = Some(value);
        self
    }

    pub fn pitch_wheel(mut self, value: f32) -> Self {
        self.pitch_wheel = Some(value);
        self
    }

    pub fn tuner(mut self, on: bool) -> Self {
        self.tuner = Some(on);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
