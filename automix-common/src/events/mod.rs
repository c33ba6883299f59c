//! Event types for the automix event system
//!
//! Provides the outward event enum and the EventBus that fans it out to
//! every listener (UI bridges, loggers, tests).

mod mix_types;

pub use mix_types::{MixState, TransitionTrigger};

use crate::{DeckId, Track};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Automix event types
///
/// Events are broadcast via EventBus and can be serialized for transport to
/// a display layer. Internal engine messages are a separate type and never
/// leave the engine task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MixEvent {
    /// Engine left `Idle`; deck A is starting the first track
    EngineStarted {
        track_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Active deck changed; this track is now shown as "now playing"
    ///
    /// Emitted at the *start* of a transition, not at its end.
    NowPlaying {
        deck: DeckId,
        track_index: usize,
        track: Track,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track was assigned to a deck and its stream is being resolved
    TrackQueued {
        deck: DeckId,
        track_index: usize,
        track_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A deck finished attaching its media and is cued
    TrackLoaded {
        deck: DeckId,
        track_index: usize,
        track_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Stream resolution or media attach failed; the deck is left empty
    LoadFailed {
        deck: DeckId,
        track_index: usize,
        track_id: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Periodic deck position report (at least once per second)
    DeckProgress {
        deck: DeckId,
        position_seconds: f64,
        duration_seconds: f64,
        is_playing: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A deck reached the end of its media
    DeckEnded {
        deck: DeckId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Crossfade started
    TransitionStarted {
        transition_id: Uuid,
        from: DeckId,
        to: DeckId,
        track_index: usize,
        trigger: TransitionTrigger,
        fade_duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Crossfade reached its target; the silent deck has been paused
    TransitionCompleted {
        transition_id: Uuid,
        active: DeckId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An in-flight crossfade was turned back toward the outgoing deck
    TransitionReversed {
        transition_id: Uuid,
        active: DeckId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Throttled loudness report from live analysis
    LevelChanged {
        loudness: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Sustained silence detected by live analysis
    SilenceDetected {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Low-band transient detected by live analysis
    BeatDetected {
        loudness: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Live analysis lost its signal; silence triggering is disabled
    AnalyzerUnavailable {
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Engine torn down; both decks stopped
    EngineStopped {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl MixEvent {
    /// Short event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            MixEvent::EngineStarted { .. } => "EngineStarted",
            MixEvent::NowPlaying { .. } => "NowPlaying",
            MixEvent::TrackQueued { .. } => "TrackQueued",
            MixEvent::TrackLoaded { .. } => "TrackLoaded",
            MixEvent::LoadFailed { .. } => "LoadFailed",
            MixEvent::DeckProgress { .. } => "DeckProgress",
            MixEvent::DeckEnded { .. } => "DeckEnded",
            MixEvent::TransitionStarted { .. } => "TransitionStarted",
            MixEvent::TransitionCompleted { .. } => "TransitionCompleted",
            MixEvent::TransitionReversed { .. } => "TransitionReversed",
            MixEvent::LevelChanged { .. } => "LevelChanged",
            MixEvent::SilenceDetected { .. } => "SilenceDetected",
            MixEvent::BeatDetected { .. } => "BeatDetected",
            MixEvent::AnalyzerUnavailable { .. } => "AnalyzerUnavailable",
            MixEvent::EngineStopped { .. } => "EngineStopped",
        }
    }
}

/// Broadcast fan-out for [`MixEvent`]s
///
/// Lagging subscribers lose the oldest events rather than blocking the
/// engine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MixEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use automix_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MixEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: MixEvent) -> Result<usize, broadcast::error::SendError<MixEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MixEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
