//! Clock-driven playback channel
//!
//! `SimulatedChannel` plays nothing; it advances a position against the
//! tokio clock while "playing". Because it reads `tokio::time::Instant`, a
//! paused test runtime drives it deterministically. The headless CLI uses
//! it to rehearse a playlist's transitions.

use crate::collaborators::PlaybackChannel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

#[derive(Debug)]
struct ChannelState {
    default_duration: f64,
    durations: HashMap<String, f64>,
    attach_error: Option<String>,
    url: Option<String>,
    duration: f64,
    /// Position at the last play/pause/seek
    base_position: f64,
    /// Set while playing
    started_at: Option<Instant>,
    volume: f32,
    /// Only kept once `recording()` is requested
    volume_history: Option<Vec<f32>>,
    play_calls: usize,
}

impl ChannelState {
    fn position(&self) -> f64 {
        let position = match self.started_at {
            Some(started) => self.base_position + started.elapsed().as_secs_f64(),
            None => self.base_position,
        };
        if self.duration > 0.0 {
            position.min(self.duration)
        } else {
            position
        }
    }

    fn has_ended(&self) -> bool {
        self.url.is_some() && self.duration > 0.0 && self.position() >= self.duration
    }
}

/// Simulated [`PlaybackChannel`]
#[derive(Debug)]
pub struct SimulatedChannel {
    state: Arc<Mutex<ChannelState>>,
}

/// Read-only view into a [`SimulatedChannel`] after it has been boxed
#[derive(Debug, Clone)]
pub struct ChannelProbe {
    state: Arc<Mutex<ChannelState>>,
}

fn lock(state: &Mutex<ChannelState>) -> MutexGuard<'_, ChannelState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedChannel {
    /// Every attached stream lasts `default_duration` seconds unless
    /// overridden with [`SimulatedChannel::with_duration`]
    pub fn new(default_duration: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState {
                default_duration,
                durations: HashMap::new(),
                attach_error: None,
                url: None,
                duration: 0.0,
                base_position: 0.0,
                started_at: None,
                volume: 0.0,
                volume_history: None,
                play_calls: 0,
            })),
        }
    }

    /// Give one URL its own length
    pub fn with_duration(self, url: impl Into<String>, seconds: f64) -> Self {
        lock(&self.state).durations.insert(url.into(), seconds);
        self
    }

    /// Make every attach fail with `reason`
    pub fn failing_attach(self, reason: impl Into<String>) -> Self {
        lock(&self.state).attach_error = Some(reason.into());
        self
    }

    /// Keep every gain written, for [`ChannelProbe::volume_history`]
    pub fn recording(self) -> Self {
        lock(&self.state).volume_history.get_or_insert_with(Vec::new);
        self
    }

    pub fn probe(&self) -> ChannelProbe {
        ChannelProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl PlaybackChannel for SimulatedChannel {
    fn attach(&mut self, url: &str, cue_seconds: f64) -> Result<(), String> {
        let mut state = lock(&self.state);
        if let Some(reason) = &state.attach_error {
            return Err(reason.clone());
        }
        let duration = state
            .durations
            .get(url)
            .copied()
            .unwrap_or(state.default_duration);
        state.url = Some(url.to_string());
        state.duration = duration;
        state.base_position = if duration > 0.0 {
            cue_seconds.clamp(0.0, duration)
        } else {
            cue_seconds.max(0.0)
        };
        state.started_at = None;
        Ok(())
    }

    fn detach(&mut self) {
        let mut state = lock(&self.state);
        state.url = None;
        state.duration = 0.0;
        state.base_position = 0.0;
        state.started_at = None;
    }

    fn play(&mut self) {
        let mut state = lock(&self.state);
        if state.url.is_none() || state.started_at.is_some() {
            return;
        }
        state.play_calls += 1;
        state.started_at = Some(Instant::now());
    }

    fn pause(&mut self) {
        let mut state = lock(&self.state);
        state.base_position = state.position();
        state.started_at = None;
    }

    fn seek(&mut self, seconds: f64) {
        let mut state = lock(&self.state);
        state.base_position = seconds;
        if state.started_at.is_some() {
            state.started_at = Some(Instant::now());
        }
    }

    fn set_volume(&mut self, volume: f32) {
        let mut state = lock(&self.state);
        state.volume = volume;
        if let Some(history) = state.volume_history.as_mut() {
            history.push(volume);
        }
    }

    fn position(&self) -> f64 {
        lock(&self.state).position()
    }

    fn duration(&self) -> f64 {
        lock(&self.state).duration
    }

    fn is_playing(&self) -> bool {
        let state = lock(&self.state);
        state.started_at.is_some() && !state.has_ended()
    }

    fn has_ended(&self) -> bool {
        lock(&self.state).has_ended()
    }
}

impl ChannelProbe {
    pub fn volume(&self) -> f32 {
        lock(&self.state).volume
    }

    /// Every gain written, oldest first; empty unless the channel is recording
    pub fn volume_history(&self) -> Vec<f32> {
        lock(&self.state).volume_history.clone().unwrap_or_default()
    }

    pub fn attached_url(&self) -> Option<String> {
        lock(&self.state).url.clone()
    }

    pub fn is_playing(&self) -> bool {
        let state = lock(&self.state);
        state.started_at.is_some() && !state.has_ended()
    }

    pub fn position(&self) -> f64 {
        lock(&self.state).position()
    }

    /// Number of times playback actually started
    pub fn play_count(&self) -> usize {
        lock(&self.state).play_calls
    }
}
