//! The per-voice signal graph and the shared filter path.
//!
//! Graph nodes wrap the low-level DSP primitives with what a voice needs:
//! scheduled curves, single-output wiring and block-based rendering. The
//! manager owns the topology; the lifecycle layer above only asks it to
//! build, retune, tear down and free voices.

/// Fixed-capacity node storage with generation-checked voice ids.
pub mod arena;
/// Oscillator, noise, amplitude, LFO and modulation-tap nodes.
pub mod chain;
/// Builds, rewires and renders voices through the shared ladder.
pub mod manager;
/// Two-source modulation bus and its destination gains.
pub mod modulate;
/// Core traits and ids shared by all graph nodes.
pub mod node;

pub use arena::GraphError;
pub use manager::{Glide, VoiceGraphManager};
pub use node::{GraphNode, ModDestination, RenderCtx, VoiceId};
