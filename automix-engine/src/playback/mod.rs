//! Playback channel implementations

pub mod simulated;

pub use simulated::{ChannelProbe, SimulatedChannel};
