pub mod dsp;
#[cfg(feature = "rtrb")]
pub mod engine; // Audio device + control handle
pub mod graph; // Per-voice node arena and the shared filter path
pub mod io;
pub mod synth; // Settings, notes and the monophonic lifecycle

pub const MAX_BLOCK_SIZE: usize = 2048;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
