//! Real-world scenario benchmarks.
//!
//! These drive the whole monosynth the way a host does: control messages at
//! block boundaries, then a stereo render through the shared ladder.

mod voice;

pub use voice::bench_voice;
