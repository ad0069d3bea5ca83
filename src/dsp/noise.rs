//! White and pink noise sources.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use oorandom::Rand32;

/*
White noise has equal energy per Hz, which sounds bright and hissy. Pink
noise has equal energy per octave (-3 dB/octave), which sounds fuller and is
what the mixer's noise switch selects by default.

Pink is made by running white noise through a bank of one-pole filters with
staggered corner frequencies (Paul Kellet's refined method). Each pole covers
roughly an octave; their sum approximates the -3 dB/octave slope to within
about 0.05 dB from 9 Hz up to Nyquist at 44.1 kHz.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
}

pub struct NoiseSource {
    rng: Rand32,
    color: NoiseColor,
    b: [f32; 7],
}

impl NoiseSource {
    pub fn new(color: NoiseColor, seed: u64) -> Self {
        Self {
            rng: Rand32::new(seed),
            color,
            b: [0.0; 7],
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    pub fn set_color(&mut self, color: NoiseColor) {
        self.color = color;
    }

    #[inline]
    fn white(&mut self) -> f32 {
        self.rng.rand_float() * 2.0 - 1.0
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let white = self.white();
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Pink => {
                let b = &mut self.b;
                b[0] = 0.99886 * b[0] + white * 0.055_517_9;
                b[1] = 0.99332 * b[1] + white * 0.075_075_9;
                b[2] = 0.96900 * b[2] + white * 0.153_852;
                b[3] = 0.86650 * b[3] + white * 0.310_485_6;
                b[4] = 0.55000 * b[4] + white * 0.532_952_2;
                b[5] = -0.7616 * b[5] - white * 0.016_898;
                let pink = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
                b[6] = white * 0.115_926;
                pink * 0.11
            }
        }
    }

    pub fn render(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
    }
}
