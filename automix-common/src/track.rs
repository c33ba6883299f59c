//! Track, playlist and deck identifiers
//!
//! The playlist is a static, ordered sequence read by index with modulo
//! wraparound. Tracks are immutable once loaded.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// One of the two playback channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    /// Both decks in index order
    pub const ALL: [DeckId; 2] = [DeckId::A, DeckId::B];

    /// Slot of this deck in a `[_; 2]` pair
    pub fn index(self) -> usize {
        match self {
            DeckId::A => 0,
            DeckId::B => 1,
        }
    }

    /// The opposite deck
    pub fn other(self) -> DeckId {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }

    /// Crossfade ratio at which this deck is the only audible one
    ///
    /// Deck A sits at 0.0, deck B at 1.0.
    pub fn ratio(self) -> f32 {
        match self {
            DeckId::A => 0.0,
            DeckId::B => 1.0,
        }
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckId::A => write!(f, "A"),
            DeckId::B => write!(f, "B"),
        }
    }
}

/// Immutable track record
///
/// `media_ref` is opaque to the engine; a stream resolver turns it into a
/// playable URL. Field aliases accept the camelCase names used by web
/// playlists (`videoId`, `introSkip`, `outroSkip`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Stable identifier (defaults to `media_ref` when absent)
    #[serde(default)]
    pub id: String,
    pub artist: String,
    pub title: String,
    #[serde(alias = "mediaRef", alias = "videoId")]
    pub media_ref: String,
    /// Initial cue point in seconds
    #[serde(default, alias = "introSkip", alias = "introSkipSeconds")]
    pub intro_skip_seconds: f64,
    /// Seconds trimmed from the effective end of the track
    #[serde(default, alias = "outroSkip", alias = "outroSkipSeconds")]
    pub outro_skip_seconds: f64,
}

impl Track {
    /// Create a track with no intro/outro trimming
    pub fn new(
        id: impl Into<String>,
        artist: impl Into<String>,
        title: impl Into<String>,
        media_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            artist: artist.into(),
            title: title.into(),
            media_ref: media_ref.into(),
            intro_skip_seconds: 0.0,
            outro_skip_seconds: 0.0,
        }
    }

    /// Set the initial cue point
    pub fn with_intro_skip(mut self, seconds: f64) -> Self {
        self.intro_skip_seconds = seconds;
        self
    }

    /// Set the outro trim
    pub fn with_outro_skip(mut self, seconds: f64) -> Self {
        self.outro_skip_seconds = seconds;
        self
    }

    /// "Artist - Title" for logs and displays
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    fn validate(&mut self, position: usize) -> Result<()> {
        if self.media_ref.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "track {} has an empty media reference",
                position
            )));
        }
        if !self.intro_skip_seconds.is_finite() || self.intro_skip_seconds < 0.0 {
            return Err(Error::InvalidInput(format!(
                "track {} ({}) has invalid intro skip {}",
                position, self.media_ref, self.intro_skip_seconds
            )));
        }
        if !self.outro_skip_seconds.is_finite() || self.outro_skip_seconds < 0.0 {
            return Err(Error::InvalidInput(format!(
                "track {} ({}) has invalid outro skip {}",
                position, self.media_ref, self.outro_skip_seconds
            )));
        }
        if self.id.is_empty() {
            self.id = self.media_ref.clone();
        }
        Ok(())
    }
}

/// Playlist documents come either as a bare array or as `{ tracks = [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum PlaylistDocument {
    Bare(Vec<Track>),
    Wrapped { tracks: Vec<Track> },
}

impl PlaylistDocument {
    fn into_tracks(self) -> Vec<Track> {
        match self {
            PlaylistDocument::Bare(tracks) => tracks,
            PlaylistDocument::Wrapped { tracks } => tracks,
        }
    }
}

/// Ordered, static, non-empty track sequence
///
/// Cloning is cheap; the tracks are shared.
#[derive(Debug, Clone)]
pub struct Playlist {
    tracks: Arc<[Track]>,
}

impl Playlist {
    /// Build a playlist, rejecting empty input and malformed tracks
    pub fn new(tracks: Vec<Track>) -> Result<Self> {
        if tracks.is_empty() {
            return Err(Error::EmptyPlaylist);
        }
        let mut tracks = tracks;
        for (position, track) in tracks.iter_mut().enumerate() {
            track.validate(position)?;
        }
        Ok(Self {
            tracks: tracks.into(),
        })
    }

    /// Parse a JSON playlist (array or `{"tracks": [...]}`)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: PlaylistDocument = serde_json::from_str(json)?;
        Self::new(doc.into_tracks())
    }

    /// Parse a TOML playlist (`[[tracks]]` tables)
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let doc: PlaylistDocument = toml::from_str(toml_str)?;
        Self::new(doc.into_tracks())
    }

    /// Load a playlist file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(Error::Config(format!(
                "Unsupported playlist format {:?} for {}",
                other,
                path.display()
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track at `index`, wrapping modulo the playlist length
    pub fn get(&self, index: usize) -> &Track {
        &self.tracks[index % self.tracks.len()]
    }

    /// Wrap any signed index into `0..len`
    pub fn wrap(&self, index: i64) -> usize {
        index.rem_euclid(self.tracks.len() as i64) as usize
    }

    /// Index after `index`; N-1 wraps to 0
    pub fn next_index(&self, index: usize) -> usize {
        self.wrap(index as i64 + 1)
    }

    /// Index before `index`; 0 wraps to N-1
    pub fn previous_index(&self, index: usize) -> usize {
        self.wrap(index as i64 - 1)
    }
}
