//! # Automix Engine Library
//!
//! Always-on two-deck mixing engine: plays a playlist across alternating
//! decks, crossfades between them, and decides when to transition either
//! from the time left on the active track or from live silence detection.
//!
//! **Architecture:** one engine task owns both decks, the crossfader and the
//! level analyzer. Deck progress, analyzer events, load completions, timers
//! and user commands all arrive as messages on that task's queue, so no
//! component state is ever mutated concurrently.

pub mod analyzer;
pub mod collaborators;
pub mod crossfade;
pub mod deck;
pub mod error;
pub mod orchestrator;
pub mod playback;

pub use collaborators::{PassthroughResolver, PlaybackChannel, SignalLost, SpectrumSource, StreamResolver};
pub use error::{Error, LoadError, Result};
pub use orchestrator::{AutoMixEngine, EngineHandle, EngineSnapshot};
