//! Benchmarks for band-limited oscillators.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use ladder_mono::dsp::oscillator::{OscillatorBlock, Waveform};

use crate::BLOCK_SIZES;

const WAVEFORMS: [(&str, Waveform); 4] = [
    ("triangle", Waveform::Triangle),
    ("sawtooth", Waveform::Sawtooth),
    ("square", Waveform::Square),
    ("narrow_pulse", Waveform::NarrowPulse),
];

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];
        let frequency = vec![440.0f32; size];

        for (name, waveform) in WAVEFORMS {
            let mut osc = OscillatorBlock::new(waveform);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    osc.render(black_box(&mut buffer), black_box(&frequency), 48_000.0);
                })
            });
        }

        // Gliding pitch: the frequency buffer changes every sample
        let glide: Vec<f32> = (0..size)
            .map(|i| 220.0 + 220.0 * i as f32 / size as f32)
            .collect();
        let mut osc = OscillatorBlock::new(Waveform::Sawtooth);
        group.bench_with_input(BenchmarkId::new("sawtooth_glide", size), &size, |b, _| {
            b.iter(|| {
                osc.render(black_box(&mut buffer), black_box(&glide), 48_000.0);
            })
        });
    }

    group.finish();
}
