//! # Automix Common Library
//!
//! Shared code for the automix engine and its front ends:
//! - Track and playlist model
//! - Event types (MixEvent enum) and the EventBus
//! - Mixer configuration loading
//! - Fade curve definitions and calculations

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod track;

pub use config::MixConfig;
pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use track::{DeckId, Playlist, Track};
