#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Band-limited Oscillators
========================

The three audio oscillators share one phase accumulator design. Phase runs
from 0 to 1 and wraps; the waveform is a function of phase. Naive saw and
pulse waves jump instantly at the wrap, and that jump aliases badly at high
pitches. PolyBLEP patches the two samples either side of each jump with a
polynomial that rounds the corner off, which removes most of the aliasing for
almost no CPU.

    naive saw      ╱│╱│╱│        polyBLEP saw    ╱╮╱╮╱╮
                  ╱ │╱ │╱                       ╱ ╰╱ ╰╱

Waveforms
---------

  Triangle          odd harmonics falling as 1/n²; soft
  TriangleSaw       triangle blended with a saw ("shark tooth")
  Sawtooth          every harmonic, 1/n; bright
  ReverseSawtooth   same spectrum, falling ramp
  Square            50% pulse; odd harmonics
  WidePulse         25% pulse; nasal
  NarrowPulse       12.5% pulse; thin

Range (footage)
---------------

Organ-style footage sets the octave: 8' is concert pitch, 16' one octave
down, 4' one up. "Lo" drops the oscillator to sub-audio so it can be used as
a modulation source.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Triangle,
    TriangleSaw,
    Sawtooth,
    ReverseSawtooth,
    Square,
    WidePulse,
    NarrowPulse,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    #[cfg_attr(feature = "serde", serde(rename = "32"))]
    ThirtyTwo,
    #[cfg_attr(feature = "serde", serde(rename = "16"))]
    Sixteen,
    #[cfg_attr(feature = "serde", serde(rename = "8"))]
    Eight,
    #[cfg_attr(feature = "serde", serde(rename = "4"))]
    Four,
    #[cfg_attr(feature = "serde", serde(rename = "2"))]
    Two,
    #[cfg_attr(feature = "serde", serde(rename = "lo"))]
    Lo,
}

impl Range {
    /// Frequency multiplier relative to the played note.
    pub fn multiplier(self) -> f32 {
        match self {
            Range::ThirtyTwo => 0.25,
            Range::Sixteen => 0.5,
            Range::Eight => 1.0,
            Range::Four => 2.0,
            Range::Two => 4.0,
            Range::Lo => 0.01,
        }
    }
}

pub struct OscillatorBlock {
    waveform: Waveform,
    phase: f32,
}

impl OscillatorBlock {
    pub fn new(waveform: Waveform) -> Self {
        Self { waveform, phase: 0.0 }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn reset_phase(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }

    /// Render one sample per entry of `frequency` (Hz).
    pub fn render(&mut self, destination: &mut [f32], frequency: &[f32], sample_rate: f32) {
        for (out, &hz) in destination.iter_mut().zip(frequency) {
            *out = self.next_sample(hz, sample_rate);
        }
    }

    #[inline]
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let frequency = if frequency.is_finite() { frequency.abs() } else { 0.0 };
        let dt = (frequency / sample_rate).min(0.5);
        let t = self.phase;

        let sample = match self.waveform {
            Waveform::Triangle => triangle(t),
            Waveform::TriangleSaw => 0.5 * (triangle(t) + saw(t, dt)),
            Waveform::Sawtooth => saw(t, dt),
            Waveform::ReverseSawtooth => -saw(t, dt),
            Waveform::Square => pulse(t, dt, 0.5),
            Waveform::WidePulse => pulse(t, dt, 0.25),
            Waveform::NarrowPulse => pulse(t, dt, 0.125),
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample
    }
}

/// Pitch of the tuning reference.
pub const TUNER_HZ: f32 = 440.0;

/// Pure sine at a fixed pitch, used as a tuning reference.
pub struct ReferenceTone {
    frequency: f32,
    phase: f32,
}

impl ReferenceTone {
    pub fn new(frequency: f32) -> Self {
        Self { frequency, phase: 0.0 }
    }

    pub fn render(&mut self, destination: &mut [f32], sample_rate: f32) {
        let dt = self.frequency / sample_rate;
        for out in destination.iter_mut() {
            *out = (std::f32::consts::TAU * self.phase).sin();
            self.phase += dt;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}

#[inline]
fn triangle(t: f32) -> f32 {
    1.0 - 4.0 * (t - 0.5).abs()
}

#[inline]
fn saw(t: f32, dt: f32) -> f32 {
    (2.0 * t - 1.0) - poly_blep(t, dt)
}

#[inline]
fn pulse(t: f32, dt: f32, width: f32) -> f32 {
    let naive = if t < width { 1.0 } else { -1.0 };
    naive + poly_blep(t, dt) - poly_blep((t + 1.0 - width).rem_euclid(1.0), dt)
}

/// Polynomial band-limited step correction around a phase wrap.
#[inline]
pub fn poly_blep(t: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Waveform; 7] = [
        Waveform::Triangle,
        Waveform::TriangleSaw,
        Waveform::Sawtooth,
        Waveform::ReverseSawtooth,
        Waveform::Square,
        Waveform::WidePulse,
        Waveform::NarrowPulse,
    ];

    #[test]
    fn every_waveform_is_bounded() {
        for waveform in ALL {
            let mut osc = OscillatorBlock::new(waveform);
            let freq = vec![3_520.0f32; 4_096];
            let mut buffer = vec![0.0f32; 4_096];
            osc.render(&mut buffer, &freq, 48_000.0);
            assert!(
                buffer.iter().all(|s| s.is_finite() && s.abs() <= 1.5),
                "{waveform:?} left the expected range"
            );
        }
    }

    #[test]
    fn phase_advances_by_frequency() {
        let mut osc = OscillatorBlock::new(Waveform::Sawtooth);
        for _ in 0..100 {
            osc.next_sample(480.0, 48_000.0);
        }
        assert!((osc.phase() - 0.0).abs() < 1e-4 || (osc.phase() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn square_is_zero_mean() {
        let mut osc = OscillatorBlock::new(Waveform::Square);
        let freq = vec![100.0f32; 48_000];
        let mut buffer = vec![0.0f32; 48_000];
        osc.render(&mut buffer, &freq, 48_000.0);
        let mean: f32 = buffer.iter().sum::<f32>() / buffer.len() as f32;
        assert!(mean.abs() < 0.01, "square mean was {mean}");
    }

    #[test]
    fn narrow_pulse_spends_less_time_high() {
        let mut osc = OscillatorBlock::new(Waveform::NarrowPulse);
        let freq = vec![100.0f32; 4_800];
        let mut buffer = vec![0.0f32; 4_800];
        osc.render(&mut buffer, &freq, 48_000.0);
        let high = buffer.iter().filter(|&&s| s > 0.0).count() as f32 / buffer.len() as f32;
        assert!((high - 0.125).abs() < 0.02, "duty cycle was {high}");
    }

    #[test]
    fn range_multipliers() {
        assert_eq!(Range::Eight.multiplier(), 1.0);
        assert_eq!(Range::Sixteen.multiplier(), 0.5);
        assert_eq!(Range::Two.multiplier(), 4.0);
        assert_eq!(Range::Lo.multiplier(), 0.01);
    }

    #[test]
    fn reference_tone_cycles_at_its_pitch() {
        let mut tone = ReferenceTone::new(TUNER_HZ);
        let mut buffer = vec![0.0f32; 4_800];
        tone.render(&mut buffer, 48_000.0);

        let rising = buffer.windows(2).filter(|pair| pair[0] < 0.0 && pair[1] >= 0.0).count();
        assert!((43..=45).contains(&rising), "{rising} cycles in 100 ms");
        assert!(buffer.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn non_finite_frequency_holds_phase() {
        let mut osc = OscillatorBlock::new(Waveform::Triangle);
        osc.reset_phase(0.25);
        let out = osc.next_sample(f32::NAN, 48_000.0);
        assert!(out.is_finite());
        assert!((osc.phase() - 0.25).abs() < 1e-6);
    }
}
