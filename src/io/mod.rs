// Purpose - external interfaces, format conversions

pub mod converter;
pub mod midi;

pub use converter::{event_to_action, ControlAction};
pub use midi::ControlEvent;
