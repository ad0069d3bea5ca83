//! Benchmarks for contour scheduling and curve evaluation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use ladder_mono::dsp::{
    automation::ParamCurve,
    envelope::{EnvelopeGenerator, EnvelopeParams},
};

use crate::BLOCK_SIZES;

const DT: f64 = 1.0 / 48_000.0;

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");
    let params = EnvelopeParams {
        attack: 5.0,
        decay: 5.0,
        sustain: 7.0,
        release: 5.0,
    };

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Attack phase (ramping up)
        let mut env = EnvelopeGenerator::new(params, false);
        let mut curve = ParamCurve::new(0.0);
        env.trigger(&mut curve, 0.0, 0.0, 1.0);
        group.bench_with_input(BenchmarkId::new("attack", size), &size, |b, _| {
            b.iter(|| {
                curve.fill(black_box(0.01), DT, black_box(&mut buffer));
            })
        });

        // Sustain phase (every ramp has elapsed)
        let mut env = EnvelopeGenerator::new(params, false);
        let mut curve = ParamCurve::new(0.0);
        let sustain_at = env.trigger(&mut curve, 0.0, 0.0, 1.0);
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| {
                curve.fill(black_box(sustain_at + 1.0), DT, black_box(&mut buffer));
            })
        });

        // Retrigger from the live value, then render the start of the ramp
        let mut env = EnvelopeGenerator::new(params, false);
        let mut curve = ParamCurve::new(0.0);
        env.trigger(&mut curve, 0.0, 0.0, 1.0);
        env.release(&mut curve, 1.0, 0.0);
        group.bench_with_input(BenchmarkId::new("retrigger", size), &size, |b, _| {
            b.iter(|| {
                env.trigger(black_box(&mut curve), 1.1, 0.0, 1.0);
                curve.fill(1.1, DT, black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
