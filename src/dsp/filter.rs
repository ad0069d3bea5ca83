use std::f32::consts::PI;

/*
Noise tone filter: a 2-pole state-variable low-pass (trapezoidal integrators)
that darkens the noise source before it reaches the ladder.

| mode      | tone source                  | effect                         |
| --------- | ---------------------------- | ------------------------------ |
| free      | tone knob, in Hz             | fixed colour for every note    |
| key sync  | note_freq · tone / 440       | brighter for higher notes      |
*/

const MIN_TONE: f32 = 20.0;
const MAX_TONE: f32 = 20_000.0;
// Butterworth-ish damping; no resonant bump on the noise.
const DAMPING: f32 = 1.0;

pub struct ToneFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    cutoff_hz: f32,
}

impl ToneFilter {
    pub fn lowpass(cutoff_hz: f32) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz: clamp_tone(cutoff_hz),
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        if cutoff_hz.is_finite() {
            self.cutoff_hz = clamp_tone(cutoff_hz);
        }
    }

    #[inline]
    fn compute_g(&self, sample_rate: f32) -> f32 {
        let fc = self.cutoff_hz.min(sample_rate * 0.45);
        (PI * fc / sample_rate).tan()
    }

    #[inline]
    fn next_sample(&mut self, sample: f32, g: f32) -> f32 {
        let h = 1.0 / (1.0 + g * (g + DAMPING));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        v2
    }

    pub fn render(&mut self, buffer: &mut [f32], sample_rate: f32) {
        let g = self.compute_g(sample_rate);
        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample, g);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

/// Tone cutoff for the noise chain, optionally tracking the played note.
pub fn tone_cutoff(tone_hz: f32, note_hz: f32, sync: bool) -> f32 {
    let hz = if sync { note_hz * tone_hz / 440.0 } else { tone_hz };
    clamp_tone(hz)
}

fn clamp_tone(hz: f32) -> f32 {
    if hz.is_finite() {
        hz.clamp(MIN_TONE, MAX_TONE)
    } else {
        MAX_TONE
    }
}
