//! Deck - one typed playback channel
//!
//! A deck wraps a [`PlaybackChannel`] with the track bookkeeping the
//! orchestrator needs: what is loaded, whether a load is in flight, buffered
//! play intent and the outro-aware remaining time.
//!
//! Loading is split in two so the stream resolution can run off the engine
//! task: [`Deck::begin_load`] hands out a [`LoadTicket`], and
//! [`Deck::complete_load`] applies the resolver's answer. A ticket from an
//! older load is recognised and discarded.
//!
//! A deck never decides to advance on its own. It only reports progress and
//! a one-shot `Ended` event.

use crate::collaborators::{PlaybackChannel, StreamResolver};
use crate::error::{LoadError, LoadFailure};
use automix_common::{DeckId, Track};
use tracing::{debug, info, warn};

/// A track currently attached to a deck
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTrack {
    /// Playlist index the track was taken from
    pub index: usize,
    pub track: Track,
}

/// Handle for an in-flight load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTicket {
    pub deck: DeckId,
    pub generation: u64,
    pub index: usize,
    pub media_ref: String,
}

/// Result of applying a resolved stream
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Media attached and cued at the intro-skip offset
    Loaded { index: usize },
    /// A newer load superseded this one; nothing changed
    Stale,
}

/// Position report for one deck
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeckStatus {
    pub deck: DeckId,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub is_playing: bool,
}

/// Events a deck emits when polled
#[derive(Debug, Clone, PartialEq)]
pub enum DeckEvent {
    Progress(DeckStatus),
    /// Playback reached the end of media (reported once per load)
    Ended(DeckId),
}

#[derive(Debug, Clone)]
struct PendingLoad {
    generation: u64,
    index: usize,
    track: Track,
}

/// One of the two playback channels
pub struct Deck {
    id: DeckId,
    channel: Box<dyn PlaybackChannel>,
    loaded: Option<LoadedTrack>,
    pending: Option<PendingLoad>,
    generation: u64,
    /// play() arrived before the media finished loading
    play_requested: bool,
    volume: f32,
    ended_reported: bool,
}

impl Deck {
    pub fn new(id: DeckId, channel: Box<dyn PlaybackChannel>) -> Self {
        Self {
            id,
            channel,
            loaded: None,
            pending: None,
            generation: 0,
            play_requested: false,
            volume: 0.0,
            ended_reported: false,
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Start assigning a new track
    ///
    /// The previous media is released immediately, so the deck reports no
    /// loaded track until [`Deck::complete_load`] succeeds. Does not
    /// auto-play.
    pub fn begin_load(&mut self, index: usize, track: Track) -> LoadTicket {
        self.generation += 1;
        if self.loaded.take().is_some() {
            self.channel.pause();
            self.channel.detach();
        }
        self.play_requested = false;
        self.ended_reported = false;

        debug!(
            "Deck {}: loading track {} ({}) [gen {}]",
            self.id,
            index,
            track.display_name(),
            self.generation
        );

        let ticket = LoadTicket {
            deck: self.id,
            generation: self.generation,
            index,
            media_ref: track.media_ref.clone(),
        };
        self.pending = Some(PendingLoad {
            generation: self.generation,
            index,
            track,
        });
        ticket
    }

    /// Apply the resolver's answer for a ticket
    ///
    /// On success the media is attached with the intro-skip offset as its
    /// initial cue point, and any buffered play intent is honoured. On
    /// failure the deck is left empty.
    pub fn complete_load(
        &mut self,
        ticket: &LoadTicket,
        resolved: std::result::Result<String, String>,
    ) -> std::result::Result<LoadOutcome, LoadError> {
        let pending = match self.pending.take() {
            Some(p) if p.generation == ticket.generation => p,
            other => {
                debug!(
                    "Deck {}: discarding stale load result [gen {}]",
                    self.id, ticket.generation
                );
                self.pending = other;
                return Ok(LoadOutcome::Stale);
            }
        };

        let fail = |deck: &mut Deck, reason: LoadFailure| {
            deck.play_requested = false;
            let error = LoadError {
                deck: deck.id,
                track_id: pending.track.id.clone(),
                reason,
            };
            warn!("{}", error);
            error
        };

        let url = match resolved {
            Ok(url) => url,
            Err(e) => return Err(fail(self, LoadFailure::Resolve(e))),
        };

        let cue = pending.track.intro_skip_seconds.max(0.0);
        if let Err(e) = self.channel.attach(&url, cue) {
            return Err(fail(self, LoadFailure::Attach(e)));
        }
        self.channel.set_volume(self.volume);

        info!(
            "Deck {}: loaded track {} ({}) cued at {:.1}s",
            self.id,
            pending.index,
            pending.track.display_name(),
            cue
        );

        let index = pending.index;
        self.loaded = Some(LoadedTrack {
            index,
            track: pending.track,
        });

        if self.play_requested {
            self.play_requested = false;
            self.channel.play();
        }

        Ok(LoadOutcome::Loaded { index })
    }

    /// Resolve and attach in one step
    pub async fn load(
        &mut self,
        index: usize,
        track: Track,
        resolver: &dyn StreamResolver,
    ) -> std::result::Result<(), LoadError> {
        let ticket = self.begin_load(index, track);
        let resolved = resolver.resolve(&ticket.media_ref).await;
        self.complete_load(&ticket, resolved).map(|_| ())
    }

    /// Start playback
    ///
    /// Idempotent. Before the media has loaded the intent is buffered and
    /// applied when the load completes.
    pub fn play(&mut self) {
        if self.loaded.is_some() {
            if !self.channel.is_playing() {
                self.ended_reported = false;
                self.channel.play();
            }
        } else if self.pending.is_some() {
            self.play_requested = true;
        } else {
            debug!("Deck {}: play ignored, nothing loaded", self.id);
        }
    }

    pub fn pause(&mut self) {
        self.play_requested = false;
        if self.loaded.is_some() {
            self.channel.pause();
        }
    }

    /// Pause and release the media
    pub fn stop(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.play_requested = false;
        if self.loaded.take().is_some() {
            self.channel.pause();
            self.channel.detach();
        }
    }

    /// Move the playback cursor, clamped to `[0, duration]`
    pub fn seek(&mut self, seconds: f64) {
        if self.loaded.is_none() {
            return;
        }
        let duration = self.channel.duration();
        let mut target = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if duration > 0.0 {
            target = target.min(duration);
        }
        self.channel.seek(target);
    }

    /// Channel gain; affects this deck only
    pub fn set_volume(&mut self, fraction: f32) {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.volume = fraction;
        self.channel.set_volume(fraction);
    }

    /// Report progress and, once per load, the end of media
    pub fn poll(&mut self) -> Vec<DeckEvent> {
        let mut events = vec![DeckEvent::Progress(self.status())];
        if self.loaded.is_some() && !self.ended_reported && self.channel.has_ended() {
            self.ended_reported = true;
            events.push(DeckEvent::Ended(self.id));
        }
        events
    }

    pub fn status(&self) -> DeckStatus {
        let loaded = self.loaded.is_some();
        DeckStatus {
            deck: self.id,
            position_seconds: if loaded { self.channel.position() } else { 0.0 },
            duration_seconds: if loaded { self.channel.duration() } else { 0.0 },
            is_playing: loaded && self.channel.is_playing(),
        }
    }

    /// Seconds until the effective end of the track
    ///
    /// The outro trim only applies once playback is past the midpoint, so
    /// corrupt or very short duration metadata cannot skip a track the
    /// moment it starts. `None` while the duration is unknown.
    pub fn remaining_seconds(&self) -> Option<f64> {
        let loaded = self.loaded.as_ref()?;
        let duration = self.channel.duration();
        if !(duration.is_finite() && duration > 0.0) {
            return None;
        }
        let position = self.channel.position();
        let end = if position > duration / 2.0 {
            (duration - loaded.track.outro_skip_seconds).max(0.0)
        } else {
            duration
        };
        Some(end - position)
    }

    pub fn loaded(&self) -> Option<&LoadedTrack> {
        self.loaded.as_ref()
    }

    pub fn track(&self) -> Option<&Track> {
        self.loaded.as_ref().map(|l| &l.track)
    }

    /// Playlist index of the loaded track, or of the track being loaded
    pub fn track_index(&self) -> Option<usize> {
        self.loaded
            .as_ref()
            .map(|l| l.index)
            .or_else(|| self.pending.as_ref().map(|p| p.index))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.loaded.is_some() && self.channel.is_playing()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl std::fmt::Debug for Deck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deck")
            .field("id", &self.id)
            .field("loaded", &self.loaded)
            .field("loading", &self.pending.is_some())
            .field("volume", &self.volume)
            .finish()
    }
}
