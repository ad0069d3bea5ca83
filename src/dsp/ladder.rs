/*
Nonlinear Ladder Filter
=======================

A 4-pole low-pass modelled on the transistor ladder: four one-pole stages in
series, with the output of the last stage fed back (inverted) into the input.
The feedback is what produces the resonant peak at the cutoff frequency.

Vocabulary
----------

  stage       One one-pole low-pass integrator. Four in series give the
              classic 24 dB/octave slope.

  cutoff      The -3 dB corner of each stage, in Hz (20 Hz - 20 kHz).

  resonance   Feedback gain from stage 4 back to the input (0 - 3.99).
              At 4.0 the loop self-oscillates, so it is clamped just below.

  G           The per-sample integrator coefficient, in (0, 1). Derived
              from the cutoff with the bilinear-transform prewarp.

  oversample  Running the stages twice per output sample. The saturator
              creates harmonics; doubling the internal rate keeps most of
              them below the internal Nyquist before they fold back.


Signal Flow
-----------

            ┌─────────────── res × stage[3] ◄──────────────────┐
            ▼                                                  │
  in ──► (−) ──► sat ─► [1] ─► sat ─► [2] ─► sat ─► [3] ─► sat ─► [4] ─┴─► sat ─► out

  each [n]:  stage[n] += G · (sat(stage[n-1]) − stage[n])


Prewarp (zero-delay-feedback form)
----------------------------------

The analog one-pole has its corner at fc. The bilinear transform bends the
frequency axis, so we prewarp against the host sample period T = 1/fs:

    g = tan(π · fc · T)
    G = g / (1 + g)

Both oversampling passes reuse the same G.

Because g > 0 for any cutoff below Nyquist, G stays strictly
inside (0, 1), which makes every stage update a convex blend of its previous
value and a saturated input. That is the whole stability argument: no stage
can leave the saturator's range.


Saturation
----------

    |x| ≤ 0.5           y = x                          (clean)
    0.5 < |x| ≤ 1.0     y = 0.5 + u − u²/2, u = |x|−0.5 (quadratic knee)
    |x| > 1.0           y = ±0.875                     (hard clamp)

The knee meets the clean region with slope 1 and the clamp with slope 0, so
the curve is continuous with a continuous first derivative.


Parameter Smoothing
-------------------

Cutoff and resonance glide toward their targets with a one-pole smoother
(coefficient 0.99). When both are constant over a block the smoother and the
prewarp run once per block; when a modulation signal varies them inside the
block they run per sample.
*/

use std::f32::consts::PI;

pub const MIN_CUTOFF: f32 = 20.0;
pub const MAX_CUTOFF: f32 = 20_000.0;
pub const MAX_RESONANCE: f32 = 3.99;

const OVERSAMPLING: usize = 2;
const SMOOTHING: f32 = 0.99;
// Keeps tan() well away from its pole at low sample rates.
const MAX_PREWARP_RATIO: f32 = 0.45;

/// Soft saturator applied before every stage.
#[inline]
pub fn saturate(x: f32) -> f32 {
    let magnitude = x.abs();
    if magnitude <= 0.5 {
        x
    } else if magnitude <= 1.0 {
        let u = magnitude - 0.5;
        (0.5 + u - 0.5 * u * u).copysign(x)
    } else {
        0.875f32.copysign(x)
    }
}

/// Integrator coefficient `G` for `cutoff`.
#[inline]
pub fn prewarp(cutoff: f32, sample_rate: f32) -> f32 {
    let fc = clamp_cutoff(cutoff).min(sample_rate * MAX_PREWARP_RATIO);
    let g = (PI * fc / sample_rate).tan();
    g / (1.0 + g)
}

#[inline]
pub fn clamp_cutoff(cutoff: f32) -> f32 {
    if cutoff.is_finite() {
        cutoff.clamp(MIN_CUTOFF, MAX_CUTOFF)
    } else {
        MIN_CUTOFF
    }
}

#[inline]
pub fn clamp_resonance(resonance: f32) -> f32 {
    if resonance.is_finite() {
        resonance.clamp(0.0, MAX_RESONANCE)
    } else {
        0.0
    }
}

pub struct LadderFilter {
    stage: [f32; 4],
    cutoff: f32,
    resonance: f32,
    target_cutoff: f32,
    target_resonance: f32,
    sample_rate: f32,
}

impl LadderFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            stage: [0.0; 4],
            cutoff: 1_000.0,
            resonance: 0.0,
            target_cutoff: 1_000.0,
            target_resonance: 0.0,
            sample_rate,
        }
    }

    /// Set the values the smoother glides toward.
    ///
    /// Non-finite targets keep the last safe value.
    pub fn set_targets(&mut self, cutoff: f32, resonance: f32) {
        if cutoff.is_finite() {
            self.target_cutoff = clamp_cutoff(cutoff);
        }
        if resonance.is_finite() {
            self.target_resonance = clamp_resonance(resonance);
        }
    }

    /// Jump straight to the targets, bypassing the smoother.
    pub fn snap(&mut self, cutoff: f32, resonance: f32) {
        self.set_targets(cutoff, resonance);
        self.cutoff = self.target_cutoff;
        self.resonance = self.target_resonance;
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    pub fn stages(&self) -> [f32; 4] {
        self.stage
    }

    /// Current integrator coefficient for the smoothed cutoff.
    pub fn coefficient(&self) -> f32 {
        prewarp(self.cutoff, self.sample_rate)
    }

    pub fn reset(&mut self) {
        self.stage = [0.0; 4];
    }

    #[inline]
    fn smooth(&mut self) {
        self.cutoff = self.cutoff * SMOOTHING + self.target_cutoff * (1.0 - SMOOTHING);
        self.resonance = self.resonance * SMOOTHING + self.target_resonance * (1.0 - SMOOTHING);
    }

    /// Filter a block whose cutoff and resonance are constant.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        self.smooth();
        let g = self.coefficient();
        let resonance = clamp_resonance(self.resonance);

        for sample in buffer.iter_mut() {
            *sample = self.tick(*sample, g, resonance);
        }
    }

    /// Filter a block with per-sample cutoff and resonance targets.
    pub fn process_block_varying(&mut self, buffer: &mut [f32], cutoff: &[f32], resonance: &[f32]) {
        for ((sample, &fc), &res) in buffer.iter_mut().zip(cutoff).zip(resonance) {
            self.set_targets(fc, res);
            *sample = self.next_sample(*sample);
        }
    }

    /// Advance one sample, smoothing and prewarping on the way.
    pub fn next_sample(&mut self, input: f32) -> f32 {
        self.smooth();
        let g = self.coefficient();
        let resonance = clamp_resonance(self.resonance);
        self.tick(input, g, resonance)
    }

    #[inline]
    fn tick(&mut self, input: f32, g: f32, resonance: f32) -> f32 {
        let input = if input.is_finite() { input } else { 0.0 };

        for _ in 0..OVERSAMPLING {
            let mut previous = input - resonance * self.stage[3];
            for stage in self.stage.iter_mut() {
                *stage += g * (saturate(previous) - *stage);
                previous = *stage;
            }
        }

        if self.stage.iter().any(|s| !s.is_finite()) {
            self.reset();
            return 0.0;
        }

        saturate(self.stage[3])
    }
}

/// One ladder per output channel, driven by the same parameters.
pub struct StereoLadder {
    pub left: LadderFilter,
    pub right: LadderFilter,
}

impl StereoLadder {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: LadderFilter::new(sample_rate),
            right: LadderFilter::new(sample_rate),
        }
    }

    pub fn snap(&mut self, cutoff: f32, resonance: f32) {
        self.left.snap(cutoff, resonance);
        self.right.snap(cutoff, resonance);
    }

    /// Filter both channels; picks the per-block path when the parameter
    /// buffers hold a single value.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32], cutoff: &[f32], resonance: &[f32]) {
        if is_constant(cutoff) && is_constant(resonance) {
            let fc = cutoff.first().copied().unwrap_or(self.left.target_cutoff);
            let res = resonance.first().copied().unwrap_or(self.left.target_resonance);
            self.left.set_targets(fc, res);
            self.right.set_targets(fc, res);
            self.left.process_block(left);
            self.right.process_block(right);
        } else {
            self.left.process_block_varying(left, cutoff, resonance);
            self.right.process_block_varying(right, cutoff, resonance);
        }
    }
}

fn is_constant(values: &[f32]) -> bool {
    match values.first() {
        Some(&first) => values.iter().all(|&v| v == first),
        None => true,
    }
}
