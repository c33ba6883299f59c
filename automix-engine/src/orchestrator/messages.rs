//! Engine task queue messages
//!
//! Everything that can change engine state arrives here. Commands come from
//! an [`EngineHandle`](super::EngineHandle); internal messages are posted by
//! tasks the engine spawns itself (stream resolution, grace timers). Neither
//! type ever leaves the engine; consumers see [`MixEvent`]s instead.
//!
//! [`MixEvent`]: automix_common::events::MixEvent

use super::snapshot::EngineSnapshot;
use crate::collaborators::SpectrumSource;
use crate::deck::LoadTicket;
use automix_common::DeckId;
use tokio::sync::oneshot;

/// Requests from outside the engine task
pub enum EngineCommand {
    /// Skip forward one track
    Next,
    /// Skip back one track, or reverse an in-flight transition
    Previous,
    SetMasterVolume(f32),
    /// Enable or disable the silence trigger
    SetLiveAnalysis(bool),
    /// Hand the analyzer a new signal source
    AttachSignal(Box<dyn SpectrumSource>),
    Snapshot(oneshot::Sender<EngineSnapshot>),
    /// Stop both decks and end the task
    Shutdown,
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::Next => write!(f, "Next"),
            EngineCommand::Previous => write!(f, "Previous"),
            EngineCommand::SetMasterVolume(v) => write!(f, "SetMasterVolume({})", v),
            EngineCommand::SetLiveAnalysis(on) => write!(f, "SetLiveAnalysis({})", on),
            EngineCommand::AttachSignal(_) => write!(f, "AttachSignal(..)"),
            EngineCommand::Snapshot(_) => write!(f, "Snapshot"),
            EngineCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Completions posted back by engine-spawned tasks
#[derive(Debug)]
pub enum EngineMessage {
    /// Stream resolution finished for a deck load
    LoadResolved {
        ticket: LoadTicket,
        resolved: std::result::Result<String, String>,
    },

    /// The post-fade grace delay ran out for a silent deck
    GraceElapsed { deck: DeckId, token: u64 },
}
