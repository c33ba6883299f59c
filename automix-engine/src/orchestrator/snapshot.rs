//! Point-in-time engine state for displays and tests

use automix_common::events::MixState;
use automix_common::{DeckId, Track};
use serde::Serialize;

/// One deck as seen from outside
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeckSnapshot {
    pub deck: DeckId,
    pub track: Option<Track>,
    /// Loaded track's playlist index, or the index being loaded
    pub track_index: Option<usize>,
    pub loading: bool,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub is_playing: bool,
    pub volume: f32,
}

/// Whole engine state, captured on the engine task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub state: MixState,
    /// Deck whose track is shown as "now playing"
    pub active_deck: DeckId,
    pub crossfade_ratio: f32,
    pub is_fading: bool,
    pub fade_target: Option<DeckId>,
    pub master_volume: f32,
    pub decks: [DeckSnapshot; 2],
    pub live_analysis: bool,
    pub analyzer_available: bool,
    pub loudness: f32,
    /// False after a full playlist pass of failed loads
    pub auto_advance: bool,
}

impl EngineSnapshot {
    pub fn deck(&self, deck: DeckId) -> &DeckSnapshot {
        &self.decks[deck.index()]
    }

    pub fn active(&self) -> &DeckSnapshot {
        self.deck(self.active_deck)
    }
}
