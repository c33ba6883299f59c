//! Error types for automix-engine
//!
//! No error is fatal to the process. Load failures leave the affected deck
//! empty, analyzer failures disable silence triggering, and only an empty
//! playlist stops the engine from starting.

use automix_common::DeckId;
use thiserror::Error;

/// Why a deck could not take a track
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadFailure {
    /// The stream resolver rejected the media reference
    #[error("stream resolution failed: {0}")]
    Resolve(String),

    /// The playback channel refused the resolved media
    #[error("media attach failed: {0}")]
    Attach(String),
}

/// A deck failed to load a track
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Deck {deck} could not load track {track_id}: {reason}")]
pub struct LoadError {
    pub deck: DeckId,
    pub track_id: String,
    pub reason: LoadFailure,
}

/// Main error type for automix-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Deck load failure
    #[error(transparent)]
    Load(#[from] LoadError),

    /// No analysis signal (permission denied, detached, revoked)
    #[error("Analyzer unavailable: {0}")]
    AnalyzerUnavailable(String),

    /// Playlist has no tracks
    #[error("Cannot start engine with an empty playlist")]
    EmptyPlaylist,

    /// Engine task has shut down; commands can no longer be delivered
    #[error("Engine stopped")]
    EngineStopped,

    /// Shared library error (config, playlist parsing)
    #[error(transparent)]
    Common(#[from] automix_common::Error),
}

/// Convenience Result type using automix-engine Error
pub type Result<T> = std::result::Result<T, Error>;
