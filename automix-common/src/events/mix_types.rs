//! Mixer state types carried by events and snapshots

use serde::{Deserialize, Serialize};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixState {
    /// Before engine start
    Idle,
    /// One deck audible, the other silent or stopped
    SingleDeckActive,
    /// Fade in progress, both decks audible
    Transitioning,
}

impl std::fmt::Display for MixState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MixState::Idle => write!(f, "idle"),
            MixState::SingleDeckActive => write!(f, "single-deck"),
            MixState::Transitioning => write!(f, "transitioning"),
        }
    }
}

/// What armed a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    /// Remaining time on the active deck fell inside the lead window
    TimeWindow,
    /// Live analysis reported sustained silence
    Silence,
    /// Active deck reached the end of its media
    TrackEnded,
    /// `next` command
    ManualNext,
    /// `previous` command
    ManualPrevious,
}
