//! External collaborator contracts
//!
//! The engine never touches media, network or capture devices directly.
//! It consumes three narrow interfaces:
//! - [`StreamResolver`]: media reference to playable URL
//! - [`PlaybackChannel`]: one play/pause/seek/volume channel per deck
//! - [`SpectrumSource`]: live frequency magnitudes for the level analyzer

use async_trait::async_trait;
use thiserror::Error;

/// Resolves a track's opaque media reference into a playable URL
///
/// Failures are reported once and never retried by the engine.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, media_ref: &str) -> std::result::Result<String, String>;
}

/// Resolver that treats the media reference as the URL itself
///
/// Useful for local files and pre-resolved playlists.
#[derive(Debug, Clone, Default)]
pub struct PassthroughResolver;

#[async_trait]
impl StreamResolver for PassthroughResolver {
    async fn resolve(&self, media_ref: &str) -> std::result::Result<String, String> {
        if media_ref.trim().is_empty() {
            return Err("empty media reference".to_string());
        }
        Ok(media_ref.to_string())
    }
}

/// Black-box playback primitive behind a deck
///
/// Every call must return promptly; the engine invokes these from its
/// single task.
pub trait PlaybackChannel: Send {
    /// Attach a resolved stream with its initial cue point
    ///
    /// The channel starts paused at `cue_seconds`.
    fn attach(&mut self, url: &str, cue_seconds: f64) -> std::result::Result<(), String>;

    /// Release the current media
    fn detach(&mut self);

    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, seconds: f64);

    /// Channel gain, 0.0-1.0
    fn set_volume(&mut self, volume: f32);

    fn position(&self) -> f64;

    /// Media length in seconds; 0.0 while unknown
    fn duration(&self) -> f64;

    fn is_playing(&self) -> bool;

    /// True once playback has reached the end of media
    fn has_ended(&self) -> bool;
}

/// The analysis signal is gone (permission revoked, device detached)
#[derive(Error, Debug, Clone, PartialEq)]
#[error("signal lost: {0}")]
pub struct SignalLost(pub String);

/// Live frequency spectrum of the audible mix
pub trait SpectrumSource: Send {
    /// Fill `bins` with magnitudes normalized to 0.0-1.0
    ///
    /// The source decides the bin count. An empty result reads as silence.
    fn read_spectrum(&mut self, bins: &mut Vec<f32>) -> std::result::Result<(), SignalLost>;
}
