//! Benchmarks for low-level DSP primitives.

mod envelope;
mod ladder;
mod oscillator;

pub use envelope::bench_envelope;
pub use ladder::bench_ladder;
pub use oscillator::bench_oscillator;
