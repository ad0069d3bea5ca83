//! Low Frequency Oscillator (LFO) for the modulation bus.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Low Frequency Oscillators
=========================

An LFO is an oscillator running below the audio band. It doesn't make sound
on its own; it moves a parameter (pitch, cutoff, volume) up and down.

Vocabulary
----------

  control-rate    Frequencies below hearing, here 0.1 Hz to 20 Hz.

  bipolar         Output swings -1.0 to +1.0. Used so vibrato goes sharp
                  AND flat around the played pitch.

  unipolar        Output in 0.0 to 1.0.
                  Convert: unipolar = (bipolar + 1.0) / 2.0

  free-running    Phase is unrelated to notes. Every voice's LFO starts
                  from the engine-wide reference phase, so a new note joins
                  the sweep already in progress instead of restarting it.


Rate Knob
---------

The 0-10 rate knob is exponential:

    rate = 0.1 Hz · 200^(knob / 10)

    knob   0       2.5      5       7.5     10
    rate   0.1 Hz  0.38 Hz  1.4 Hz  5.3 Hz  20 Hz


Shapes
------

TRIANGLE   smooth, constant-speed sweep. Vibrato, slow filter movement.

SQUARE     hard switch between two values. Trills, gated tremolo.
*/

pub const MIN_LFO_RATE: f32 = 0.1;
pub const MAX_LFO_RATE: f32 = 20.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoWaveform {
    Triangle,
    Square,
}

/// Convert unipolar signal (0.0 to 1.0) to bipolar (-1.0 to +1.0).
#[inline]
pub fn unipolar_to_bipolar(unipolar: f32) -> f32 {
    (unipolar * 2.0) - 1.0
}

/// Rate knob (0-10) to Hz.
///
/// # Example
/// ```
/// use ladder_mono::dsp::lfo::lfo_rate_hz;
/// assert!((lfo_rate_hz(0.0) - 0.1).abs() < 1e-6);
/// assert!((lfo_rate_hz(10.0) - 20.0).abs() < 1e-3);
/// ```
#[inline]
pub fn lfo_rate_hz(knob: f32) -> f32 {
    let knob = if knob.is_finite() { knob.clamp(0.0, 10.0) } else { 0.0 };
    MIN_LFO_RATE * (MAX_LFO_RATE / MIN_LFO_RATE).powf(knob / 10.0)
}

#[derive(Debug, Clone)]
pub struct Lfo {
    waveform: LfoWaveform,
    frequency: f32,
    phase: f64,
}

impl Lfo {
    pub fn new(waveform: LfoWaveform, frequency: f32) -> Self {
        Self {
            waveform,
            frequency,
            phase: 0.0,
        }
    }

    /// A new LFO locked to `reference`'s phase.
    pub fn synced_to(reference: &Lfo) -> Self {
        reference.clone()
    }

    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        if frequency.is_finite() {
            self.frequency = frequency.clamp(MIN_LFO_RATE, MAX_LFO_RATE);
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Bipolar output at the current phase.
    #[inline]
    pub fn value(&self) -> f32 {
        let unipolar = match self.waveform {
            LfoWaveform::Triangle => 1.0 - 2.0 * (self.phase as f32 - 0.5).abs(),
            LfoWaveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        };
        unipolar_to_bipolar(unipolar)
    }

    /// Advance by `frames` samples without rendering.
    pub fn advance(&mut self, frames: usize, sample_rate: f32) {
        let step = self.frequency as f64 / sample_rate as f64;
        self.phase = (self.phase + step * frames as f64).rem_euclid(1.0);
    }

    pub fn render(&mut self, out: &mut [f32], sample_rate: f32) {
        let step = self.frequency as f64 / sample_rate as f64;
        for sample in out.iter_mut() {
            *sample = self.value();
            self.phase += step;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}
