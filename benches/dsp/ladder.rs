//! Benchmarks for the nonlinear ladder filter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use ladder_mono::dsp::ladder::{LadderFilter, StereoLadder};

use crate::BLOCK_SIZES;

pub fn bench_ladder(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/ladder");

    for &size in BLOCK_SIZES {
        // Generate a test signal (sawtooth-like ramp)
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        // Constant parameters: coefficient computed once per block
        let mut filter = LadderFilter::new(48_000.0);
        filter.snap(1_000.0, 2.0);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("static", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                filter.process_block(black_box(&mut buffer));
            })
        });

        // Self-oscillation edge: heaviest saturation load
        let mut filter = LadderFilter::new(48_000.0);
        filter.snap(400.0, 3.99);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("max_resonance", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                filter.process_block(black_box(&mut buffer));
            })
        });

        // Per-sample cutoff sweep, as when the modulation bus drives it
        let cutoff: Vec<f32> = (0..size)
            .map(|i| 200.0 + 4_000.0 * i as f32 / size as f32)
            .collect();
        let resonance = vec![1.5f32; size];
        let mut stereo = StereoLadder::new(48_000.0);
        let mut left = input.clone();
        let mut right = input.clone();
        group.bench_with_input(BenchmarkId::new("stereo_swept", size), &size, |b, _| {
            b.iter(|| {
                left.copy_from_slice(&input);
                right.copy_from_slice(&input);
                stereo.process(
                    black_box(&mut left),
                    black_box(&mut right),
                    black_box(&cutoff),
                    black_box(&resonance),
                );
            })
        });
    }

    group.finish();
}
