//! Low-level DSP primitives used by the voice graph.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside arena nodes. They stay focused on the signal math;
//! the graph layer adds wiring, scheduling and voice ownership.

/// Time-stamped linear ramps evaluated by the render loop.
pub mod automation;
/// Contour scheduling and knob-to-time mappings.
pub mod envelope;
/// State-variable low-pass for the noise tone control.
pub mod filter;
/// Nonlinear 4-pole ladder filter.
pub mod ladder;
/// Low frequency oscillator for the modulation bus.
pub mod lfo;
/// White and pink noise.
pub mod noise;
/// Band-limited audio oscillators.
pub mod oscillator;

pub use automation::ParamCurve;
pub use envelope::{EnvelopeGenerator, EnvelopeParams, EnvelopeStage};
