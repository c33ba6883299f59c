//! Auto-mix orchestrator
//!
//! [`AutoMixEngine::start`] spawns one engine task that owns the mixer state
//! and returns an [`EngineHandle`] for commands and event subscriptions.
//!
//! The task multiplexes, in this fixed priority order:
//! 1. commands from the handle
//! 2. completions from tasks the engine spawned (loads, grace timers)
//! 3. the progress tick (deck positions, time trigger)
//! 4. the animation tick, only while a fade is in flight
//! 5. the analyzer tick, only while a signal is attached
//!
//! Because every branch runs to completion before the next message is taken,
//! at most one transition can be armed per tick.

mod messages;
mod mixer;
mod snapshot;

pub use messages::{EngineCommand, EngineMessage};
pub use snapshot::{DeckSnapshot, EngineSnapshot};

use crate::collaborators::{PlaybackChannel, SpectrumSource, StreamResolver};
use crate::error::{Error, Result};
use automix_common::events::{EventBus, MixEvent};
use automix_common::{MixConfig, Playlist};
use mixer::AutoMixer;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Bound on queued handle commands
const COMMAND_CAPACITY: usize = 32;

/// Entry point for the auto-mix engine
pub struct AutoMixEngine;

impl AutoMixEngine {
    /// Start mixing `playlist` across the two channels
    ///
    /// Fails fast on an empty playlist. `signal`, when given, feeds the level
    /// analyzer; without it the silence trigger never fires.
    pub fn start(
        config: MixConfig,
        playlist: Playlist,
        resolver: Arc<dyn StreamResolver>,
        channels: [Box<dyn PlaybackChannel>; 2],
        signal: Option<Box<dyn SpectrumSource>>,
    ) -> Result<EngineHandle> {
        if playlist.is_empty() {
            return Err(Error::EmptyPlaylist);
        }
        let config = config.validated();

        let bus = EventBus::new(config.event_capacity);
        // Subscribed before the task exists so no startup event is missed
        let first_subscriber = bus.subscribe();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let mixer = AutoMixer::new(
            config,
            playlist,
            channels,
            resolver,
            bus.clone(),
            internal_tx,
            signal,
        );

        let task = tokio::spawn(run(mixer, command_rx, internal_rx));
        info!("Auto-mix engine task spawned");

        Ok(EngineHandle {
            commands: command_tx,
            bus,
            first_subscriber: Mutex::new(Some(first_subscriber)),
            task,
        })
    }
}

/// Engine task main loop
async fn run(
    mut mixer: AutoMixer,
    mut commands: mpsc::Receiver<EngineCommand>,
    mut internal: mpsc::UnboundedReceiver<EngineMessage>,
) {
    let mut progress = interval(mixer.config().progress_interval());
    let mut animation = interval(mixer.config().animation_interval());
    let mut analysis = interval(mixer.config().analysis_interval());
    for tick in [&mut progress, &mut animation, &mut analysis] {
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    mixer.start();

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All engine handles dropped");
                    mixer.shutdown();
                    break;
                };
                if !mixer.handle_command(command, Instant::now()) {
                    break;
                }
            }

            Some(message) = internal.recv() => {
                mixer.handle_message(message, Instant::now());
            }

            _ = progress.tick() => {
                mixer.on_progress_tick(Instant::now());
            }

            _ = animation.tick(), if mixer.is_fading() => {
                mixer.on_animation_tick(Instant::now());
            }

            _ = analysis.tick(), if mixer.analyzer_available() => {
                mixer.on_analysis_tick(Instant::now());
            }

            Some(joined) = mixer.tasks.join_next(), if !mixer.tasks.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!("Engine helper task panicked: {}", e);
                    }
                }
            }
        }
    }

    debug!("Engine task exiting");
}

/// Control surface for a running engine
///
/// Dropping every handle shuts the engine down.
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    bus: EventBus,
    first_subscriber: Mutex<Option<broadcast::Receiver<MixEvent>>>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    async fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::EngineStopped)
    }

    /// Skip to the next track (ignored mid-transition)
    pub async fn next(&self) -> Result<()> {
        self.send(EngineCommand::Next).await
    }

    /// Skip to the previous track, or reverse an in-flight transition
    pub async fn previous(&self) -> Result<()> {
        self.send(EngineCommand::Previous).await
    }

    pub async fn set_master_volume(&self, volume: f32) -> Result<()> {
        self.send(EngineCommand::SetMasterVolume(volume)).await
    }

    /// Enable or disable the silence trigger
    pub async fn set_live_analysis(&self, enabled: bool) -> Result<()> {
        self.send(EngineCommand::SetLiveAnalysis(enabled)).await
    }

    /// Feed the level analyzer from a new signal source
    pub async fn attach_signal(&self, source: Box<dyn SpectrumSource>) -> Result<()> {
        self.send(EngineCommand::AttachSignal(source)).await
    }

    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| Error::EngineStopped)
    }

    /// Subscribe to outward events
    ///
    /// The first call returns a receiver created before the engine started,
    /// so it also sees `EngineStarted` and the initial loads.
    pub fn subscribe(&self) -> broadcast::Receiver<MixEvent> {
        let first = self
            .first_subscriber
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        first.unwrap_or_else(|| self.bus.subscribe())
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop both decks and wait for the engine task to finish
    pub async fn shutdown(self) -> Result<()> {
        // Already stopped if the send fails; still join below
        let _ = self.commands.send(EngineCommand::Shutdown).await;
        self.task.await.map_err(|e| {
            error!("Engine task failed: {}", e);
            Error::EngineStopped
        })
    }
}
