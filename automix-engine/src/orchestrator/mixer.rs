//! Auto-mix state machine
//!
//! `AutoMixer` is the only owner of the two decks, the crossfader and the
//! level analyzer. It runs entirely on the engine task: every method here is
//! called from the runner loop in response to one queue message, so state is
//! never touched concurrently and no locks are involved.
//!
//! State flow:
//! - `Idle` → `SingleDeckActive` on start (A loads track 0 and plays, B cues
//!   track 1)
//! - `SingleDeckActive` → `Transitioning` on the time trigger, the silence
//!   trigger, end of media or a manual skip
//! - `Transitioning` → `SingleDeckActive` when the fade completes; the silent
//!   deck is paused and reloaded with the next track after a grace delay
//!   equal to the fade duration

use super::messages::{EngineCommand, EngineMessage};
use super::snapshot::{DeckSnapshot, EngineSnapshot};
use crate::analyzer::{AnalyzerEvent, LevelAnalyzer};
use crate::collaborators::{PlaybackChannel, SpectrumSource, StreamResolver};
use crate::crossfade::{Crossfader, FadeStep};
use crate::deck::{Deck, DeckEvent, LoadOutcome, LoadTicket};
use automix_common::events::{EventBus, MixEvent, MixState, TransitionTrigger};
use automix_common::{DeckId, MixConfig, Playlist};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The transition currently in flight
#[derive(Debug, Clone, Copy)]
struct Transition {
    id: Uuid,
    from: DeckId,
    reversed: bool,
}

pub(crate) struct AutoMixer {
    config: MixConfig,
    playlist: Playlist,
    decks: [Deck; 2],
    crossfader: Crossfader,
    analyzer: LevelAnalyzer,
    bus: EventBus,
    resolver: Arc<dyn StreamResolver>,
    internal_tx: mpsc::UnboundedSender<EngineMessage>,
    /// Stream resolutions and grace timers; aborted on shutdown
    pub(super) tasks: JoinSet<()>,

    state: MixState,
    active: DeckId,
    /// Playlist index shown as "now playing"
    now_playing: usize,
    /// Most recently assigned upcoming index
    cursor: usize,
    transition: Option<Transition>,
    /// Transition is due but the inactive deck has no cued track yet
    pending: Option<TransitionTrigger>,
    /// Outstanding reload timer per deck
    grace: [Option<u64>; 2],
    grace_tokens: u64,
    consecutive_failures: usize,
    auto_advance: bool,
    live_analysis: bool,
    last_level_report: Option<Instant>,
}

impl AutoMixer {
    pub(crate) fn new(
        config: MixConfig,
        playlist: Playlist,
        channels: [Box<dyn PlaybackChannel>; 2],
        resolver: Arc<dyn StreamResolver>,
        bus: EventBus,
        internal_tx: mpsc::UnboundedSender<EngineMessage>,
        signal: Option<Box<dyn SpectrumSource>>,
    ) -> Self {
        let [a, b] = channels;
        let decks = [Deck::new(DeckId::A, a), Deck::new(DeckId::B, b)];

        let mut analyzer = LevelAnalyzer::new();
        analyzer.on_sustained_silence(config.silence_threshold, config.silence_duration());
        analyzer.on_beat(config.beat_threshold, config.beat_cooldown(), config.beat_bins);
        if let Some(source) = signal {
            analyzer.attach(source);
        }

        Self {
            crossfader: Crossfader::new(config.fade_curve, config.master_volume),
            live_analysis: config.live_analysis,
            config,
            playlist,
            decks,
            analyzer,
            bus,
            resolver,
            internal_tx,
            tasks: JoinSet::new(),
            state: MixState::Idle,
            active: DeckId::A,
            now_playing: 0,
            cursor: 0,
            transition: None,
            pending: None,
            grace: [None, None],
            grace_tokens: 0,
            consecutive_failures: 0,
            auto_advance: true,
            last_level_report: None,
        }
    }

    pub(crate) fn config(&self) -> &MixConfig {
        &self.config
    }

    pub(crate) fn is_fading(&self) -> bool {
        self.crossfader.is_fading()
    }

    pub(crate) fn analyzer_available(&self) -> bool {
        self.analyzer.is_available()
    }

    /// `Idle` → `SingleDeckActive`
    pub(crate) fn start(&mut self) {
        info!(
            "Starting auto-mix: {} tracks, {:.1}s lead window, {} ms fades ({})",
            self.playlist.len(),
            self.config.lead_window_secs,
            self.config.fade_duration_ms,
            self.config.fade_curve
        );
        self.state = MixState::SingleDeckActive;
        self.active = DeckId::A;
        self.crossfader.cut_to(DeckId::A, &mut self.decks);
        self.emit(MixEvent::EngineStarted {
            track_count: self.playlist.len(),
            timestamp: Utc::now(),
        });

        self.queue_load(DeckId::A, 0);
        self.decks[DeckId::A.index()].play();
        self.announce_now_playing(DeckId::A, 0);

        let upcoming = self.playlist.next_index(0);
        self.queue_load(DeckId::B, upcoming);
        self.cursor = upcoming;
    }

    /// Apply one command; returns false once the engine should stop
    pub(crate) fn handle_command(&mut self, command: EngineCommand, now: Instant) -> bool {
        debug!("Engine command: {:?}", command);
        match command {
            EngineCommand::Next => self.manual_next(now),
            EngineCommand::Previous => self.manual_previous(now),
            EngineCommand::SetMasterVolume(volume) => {
                self.crossfader.set_master_volume(volume, &mut self.decks);
            }
            EngineCommand::SetLiveAnalysis(enabled) => {
                info!("Live analysis {}", if enabled { "enabled" } else { "disabled" });
                self.live_analysis = enabled;
            }
            EngineCommand::AttachSignal(source) => {
                self.analyzer.attach(source);
                self.last_level_report = None;
            }
            EngineCommand::Snapshot(reply) => {
                // Caller may have given up waiting
                let _ = reply.send(self.snapshot());
            }
            EngineCommand::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    pub(crate) fn handle_message(&mut self, message: EngineMessage, now: Instant) {
        match message {
            EngineMessage::LoadResolved { ticket, resolved } => {
                self.on_load_resolved(ticket, resolved, now)
            }
            EngineMessage::GraceElapsed { deck, token } => self.on_grace_elapsed(deck, token),
        }
    }

    /// Progress polling: report positions, then evaluate the time trigger
    pub(crate) fn on_progress_tick(&mut self, now: Instant) {
        let mut active_ended = false;
        for id in DeckId::ALL {
            let loaded = self.decks[id.index()].is_loaded();
            for event in self.decks[id.index()].poll() {
                match event {
                    DeckEvent::Progress(status) if loaded => self.emit(MixEvent::DeckProgress {
                        deck: status.deck,
                        position_seconds: status.position_seconds,
                        duration_seconds: status.duration_seconds,
                        is_playing: status.is_playing,
                        timestamp: Utc::now(),
                    }),
                    DeckEvent::Progress(_) => {}
                    DeckEvent::Ended(deck) => {
                        debug!("Deck {} reached end of media", deck);
                        self.emit(MixEvent::DeckEnded {
                            deck,
                            timestamp: Utc::now(),
                        });
                        active_ended |= deck == self.active;
                    }
                }
            }
        }

        if self.state != MixState::SingleDeckActive {
            return;
        }
        // Time trigger is evaluated first; end of media is the fallback
        if self.time_trigger_due() {
            self.trigger(TransitionTrigger::TimeWindow, now);
        } else if active_ended {
            self.trigger(TransitionTrigger::TrackEnded, now);
        }
    }

    /// Crossfade animation step
    pub(crate) fn on_animation_tick(&mut self, now: Instant) {
        if let FadeStep::Completed { target } = self.crossfader.step(now, &mut self.decks) {
            self.on_fade_complete(target);
        }
    }

    /// Analyzer sampling: loudness report, beats and the silence trigger
    pub(crate) fn on_analysis_tick(&mut self, now: Instant) {
        let (sample, events) = self.analyzer.sample(now);

        if self.analyzer.is_available() {
            let report_due = self.last_level_report.map_or(true, |last| {
                now.saturating_duration_since(last) >= self.config.progress_interval()
            });
            if report_due {
                self.last_level_report = Some(now);
                self.emit(MixEvent::LevelChanged {
                    loudness: sample.loudness,
                    timestamp: Utc::now(),
                });
            }
        }

        for event in events {
            match event {
                AnalyzerEvent::Silence { .. } => {
                    self.emit(MixEvent::SilenceDetected {
                        timestamp: Utc::now(),
                    });
                    if self.live_analysis {
                        self.trigger(TransitionTrigger::Silence, now);
                    } else {
                        debug!("Silence detected, live analysis disabled");
                    }
                }
                AnalyzerEvent::Beat { loudness, .. } => self.emit(MixEvent::BeatDetected {
                    loudness,
                    timestamp: Utc::now(),
                }),
                AnalyzerEvent::Unavailable { reason } => {
                    self.last_level_report = None;
                    self.emit(MixEvent::AnalyzerUnavailable {
                        reason,
                        timestamp: Utc::now(),
                    });
                }
            }
        }
    }

    /// Cancel timers, detach the analyzer and stop both decks
    pub(crate) fn shutdown(&mut self) {
        if self.state == MixState::Idle {
            return;
        }
        self.tasks.abort_all();
        self.analyzer.detach();
        for deck in self.decks.iter_mut() {
            deck.stop();
        }
        self.crossfader.cut_to(self.active, &mut self.decks);
        self.transition = None;
        self.pending = None;
        self.grace = [None, None];
        self.state = MixState::Idle;
        info!("Auto-mix engine stopped");
        self.emit(MixEvent::EngineStopped {
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn snapshot(&self) -> EngineSnapshot {
        let fade = self.crossfader.state();
        EngineSnapshot {
            state: self.state,
            active_deck: self.active,
            crossfade_ratio: fade.ratio,
            is_fading: fade.is_fading,
            fade_target: fade.target,
            master_volume: self.crossfader.master_volume(),
            decks: DeckId::ALL.map(|id| self.deck_snapshot(id)),
            live_analysis: self.live_analysis,
            analyzer_available: self.analyzer.is_available(),
            loudness: self.analyzer.loudness(),
            auto_advance: self.auto_advance,
        }
    }

    fn deck_snapshot(&self, id: DeckId) -> DeckSnapshot {
        let deck = &self.decks[id.index()];
        let status = deck.status();
        DeckSnapshot {
            deck: id,
            track: deck.track().cloned(),
            track_index: deck.track_index(),
            loading: deck.is_loading(),
            position_seconds: status.position_seconds,
            duration_seconds: status.duration_seconds,
            is_playing: status.is_playing,
            volume: deck.volume(),
        }
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Assign a track to a deck and resolve its stream off-task
    fn queue_load(&mut self, deck: DeckId, index: usize) {
        let track = self.playlist.get(index).clone();
        let track_id = track.id.clone();
        self.grace[deck.index()] = None;
        let ticket = self.decks[deck.index()].begin_load(index, track);

        self.emit(MixEvent::TrackQueued {
            deck,
            track_index: index,
            track_id,
            timestamp: Utc::now(),
        });

        let resolver = Arc::clone(&self.resolver);
        let tx = self.internal_tx.clone();
        self.tasks.spawn(async move {
            let resolved = resolver.resolve(&ticket.media_ref).await;
            // Receiver only closes at shutdown
            let _ = tx.send(EngineMessage::LoadResolved { ticket, resolved });
        });
    }

    fn on_load_resolved(
        &mut self,
        ticket: LoadTicket,
        resolved: std::result::Result<String, String>,
        now: Instant,
    ) {
        let deck = ticket.deck;
        match self.decks[deck.index()].complete_load(&ticket, resolved) {
            Ok(LoadOutcome::Stale) => {}
            Ok(LoadOutcome::Loaded { index }) => {
                self.consecutive_failures = 0;
                self.emit(MixEvent::TrackLoaded {
                    deck,
                    track_index: index,
                    track_id: self.playlist.get(index).id.clone(),
                    timestamp: Utc::now(),
                });
                if deck != self.active && self.state == MixState::SingleDeckActive {
                    if let Some(trigger) = self.pending {
                        self.begin_transition(trigger, now);
                    }
                }
            }
            Err(error) => {
                self.consecutive_failures += 1;
                self.emit(MixEvent::LoadFailed {
                    deck,
                    track_index: ticket.index,
                    track_id: error.track_id.clone(),
                    reason: error.reason.to_string(),
                    timestamp: Utc::now(),
                });

                if self.consecutive_failures >= self.playlist.len() {
                    warn!(
                        "{} consecutive load failures; automatic advance paused until the next manual command",
                        self.consecutive_failures
                    );
                    self.auto_advance = false;
                    self.pending = None;
                    return;
                }

                if deck == self.active {
                    // Nothing audible on the active deck: move on
                    if self.state == MixState::SingleDeckActive {
                        self.trigger(TransitionTrigger::TrackEnded, now);
                    }
                } else if self.pending.is_some() {
                    let index = self.playlist.next_index(self.cursor);
                    self.cursor = index;
                    self.queue_load(deck, index);
                }
            }
        }
    }

    fn schedule_grace(&mut self, deck: DeckId) {
        self.grace_tokens += 1;
        let token = self.grace_tokens;
        self.grace[deck.index()] = Some(token);

        let delay = self.config.fade_duration();
        let tx = self.internal_tx.clone();
        self.tasks.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(EngineMessage::GraceElapsed { deck, token });
        });
    }

    fn on_grace_elapsed(&mut self, deck: DeckId, token: u64) {
        if self.grace[deck.index()] != Some(token) {
            debug!("Deck {}: grace timer superseded", deck);
            return;
        }
        self.grace[deck.index()] = None;
        if deck == self.active {
            return;
        }
        let index = self.playlist.next_index(self.cursor);
        self.cursor = index;
        self.queue_load(deck, index);
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn time_trigger_due(&self) -> bool {
        let active = &self.decks[self.active.index()];
        let inactive = &self.decks[self.active.other().index()];
        match active.remaining_seconds() {
            Some(remaining) => remaining <= self.config.lead_window_secs && !inactive.is_playing(),
            None => false,
        }
    }

    /// Automatic trigger entry point, guarded against reentry
    fn trigger(&mut self, trigger: TransitionTrigger, now: Instant) {
        if self.state != MixState::SingleDeckActive || self.pending.is_some() {
            debug!("{:?} trigger suppressed ({})", trigger, self.state);
            return;
        }
        if !self.auto_advance {
            debug!("{:?} trigger ignored, automatic advance paused", trigger);
            return;
        }
        self.begin_transition(trigger, now);
    }

    /// True when the deck holds a track ready to be faded in
    fn is_cued(&self, deck: DeckId) -> bool {
        self.decks[deck.index()].is_loaded() && self.grace[deck.index()].is_none()
    }

    /// `SingleDeckActive` → `Transitioning`, or wait for the target to load
    fn begin_transition(&mut self, trigger: TransitionTrigger, now: Instant) {
        let from = self.active;
        let to = from.other();

        if !self.is_cued(to) {
            self.pending = Some(trigger);
            if !self.decks[to.index()].is_loading() {
                let index = self.playlist.next_index(self.cursor);
                self.cursor = index;
                info!("Deck {} has no cued track; loading track {} first", to, index);
                self.queue_load(to, index);
            } else {
                debug!("Deck {} still loading; {:?} transition pending", to, trigger);
            }
            return;
        }

        self.pending = None;
        // Silence heard on the outgoing track never counts toward the next
        self.analyzer.reset_silence(now);
        let id = Uuid::new_v4();
        let index = self.decks[to.index()].track_index().unwrap_or(self.cursor);

        self.decks[to.index()].play();
        self.crossfader.fade_to(to, self.config.fade_duration(), now);
        self.active = to;
        self.state = MixState::Transitioning;
        self.transition = Some(Transition {
            id,
            from,
            reversed: false,
        });

        info!(
            "Transition {}: deck {} → deck {} (track {}, {:?})",
            id, from, to, index, trigger
        );
        self.emit(MixEvent::TransitionStarted {
            transition_id: id,
            from,
            to,
            track_index: index,
            trigger,
            fade_duration_ms: self.config.fade_duration_ms,
            timestamp: Utc::now(),
        });
        // Displayed track flips at the start of the fade
        self.announce_now_playing(to, index);
    }

    /// `Transitioning` → `SingleDeckActive`
    fn on_fade_complete(&mut self, target: DeckId) {
        let silent = target.other();
        self.decks[silent.index()].pause();
        self.state = MixState::SingleDeckActive;

        if let Some(transition) = self.transition.take() {
            info!("Transition {} complete, deck {} active", transition.id, target);
            self.emit(MixEvent::TransitionCompleted {
                transition_id: transition.id,
                active: target,
                timestamp: Utc::now(),
            });
        }
        self.schedule_grace(silent);
    }

    fn manual_next(&mut self, now: Instant) {
        if self.state == MixState::Transitioning {
            debug!("Next ignored during a transition");
            return;
        }
        let index = self.playlist.next_index(self.now_playing);
        self.force_transition(index, TransitionTrigger::ManualNext, now);
    }

    fn manual_previous(&mut self, now: Instant) {
        if self.state == MixState::Transitioning {
            self.reverse_transition(now);
            return;
        }
        let index = self.playlist.previous_index(self.now_playing);
        self.force_transition(index, TransitionTrigger::ManualPrevious, now);
    }

    /// Manual skip: cue `index` on the inactive deck and fade to it
    fn force_transition(&mut self, index: usize, trigger: TransitionTrigger, now: Instant) {
        if !self.auto_advance {
            info!("Automatic advance resumed");
        }
        self.auto_advance = true;
        self.consecutive_failures = 0;

        let to = self.active.other();
        let holds_index = self.decks[to.index()].track_index() == Some(index);
        self.cursor = index;

        if holds_index && self.is_cued(to) {
            self.begin_transition(trigger, now);
            return;
        }
        if !(holds_index && self.decks[to.index()].is_loading()) {
            self.queue_load(to, index);
        }
        self.pending = Some(trigger);
    }

    /// Turn the in-flight fade back toward the outgoing deck
    fn reverse_transition(&mut self, now: Instant) {
        let Some(transition) = self.transition.as_mut() else {
            return;
        };
        if transition.reversed {
            debug!("Transition {} already reversed", transition.id);
            return;
        }
        transition.reversed = true;
        let id = transition.id;
        let back = transition.from;

        if let Some(interrupted) = self.crossfader.fade_to(back, self.config.fade_duration(), now) {
            debug!(
                "Transition {} reversed at ratio {:.3}",
                id, interrupted.ratio_at_interrupt
            );
        }
        self.active = back;
        info!("Transition {} reversed, deck {} active", id, back);
        self.emit(MixEvent::TransitionReversed {
            transition_id: id,
            active: back,
            timestamp: Utc::now(),
        });

        if let Some(index) = self.decks[back.index()].track_index() {
            self.cursor = index;
            self.announce_now_playing(back, index);
        }
    }

    fn announce_now_playing(&mut self, deck: DeckId, index: usize) {
        self.now_playing = index;
        let track = self.playlist.get(index).clone();
        info!("Now playing on deck {}: {}", deck, track.display_name());
        self.emit(MixEvent::NowPlaying {
            deck,
            track_index: index,
            track,
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: MixEvent) {
        self.bus.emit_lossy(event);
    }
}
