//! Benchmarks for a complete monosynth voice.
//!
//! These test the full signal path: oscillator chains, modulation taps, the
//! stereo ladder and the amplitude stage, with and without the mod wheel.

use std::{collections::VecDeque, hint::black_box};

use criterion::{BenchmarkId, Criterion};
use ladder_mono::synth::{
    settings::{NoiseSettings, SynthSettings},
    MonoSynth, Note, SynthMessage,
};

use crate::BLOCK_SIZES;

type Synth = MonoSynth<VecDeque<SynthMessage>>;

fn held(settings: SynthSettings) -> Synth {
    let mut synth = MonoSynth::new(48_000.0, settings, VecDeque::new(), 7);
    synth.note_on(Note::from_midi(45)); // A2, typical bass note
    synth
}

pub fn bench_voice(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voice");

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        // === DEFAULT PATCH ===
        // Three oscillators into the ladder; a baseline for a held note
        let mut plain = held(SynthSettings::default());
        group.bench_with_input(BenchmarkId::new("three_osc", size), &size, |b, _| {
            b.iter(|| {
                plain.render_block(black_box(&mut left), black_box(&mut right));
            })
        });

        // === FULL MODULATION ===
        // Wheel up, every destination routed, noise in the mix
        let mut settings = SynthSettings::default();
        settings.mod_wheel = 100.0;
        settings.modulation.routing.cutoff = true;
        settings.modulation.routing.resonance = true;
        settings.modulation.routing.pitch = true;
        settings.modulation.routing.volume = true;
        settings.noise = NoiseSettings {
            enabled: true,
            volume: 4.0,
            ..NoiseSettings::default()
        };
        let mut modulated = held(settings);
        group.bench_with_input(BenchmarkId::new("full_modulation", size), &size, |b, _| {
            b.iter(|| {
                modulated.render_block(black_box(&mut left), black_box(&mut right));
            })
        });

        // === IDLE ===
        // No voice: the shared filter still runs on silence
        let mut idle = MonoSynth::new(48_000.0, SynthSettings::default(), VecDeque::new(), 7);
        group.bench_with_input(BenchmarkId::new("idle", size), &size, |b, _| {
            b.iter(|| {
                idle.render_block(black_box(&mut left), black_box(&mut right));
            })
        });
    }

    group.finish();
}
