//! Shared fixtures for engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use automix_common::events::MixEvent;
use automix_common::{MixConfig, Playlist, Track};
use automix_engine::playback::{ChannelProbe, SimulatedChannel};
use automix_engine::{PlaybackChannel, SignalLost, SpectrumSource, StreamResolver};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Resolver that fails for chosen media refs (or all of them)
#[derive(Debug, Default)]
pub struct ScriptedResolver {
    failing: HashSet<String>,
    fail_all: bool,
}

impl ScriptedResolver {
    pub fn failing(refs: &[&str]) -> Self {
        Self {
            failing: refs.iter().map(|r| r.to_string()).collect(),
            fail_all: false,
        }
    }

    pub fn failing_all() -> Self {
        Self {
            failing: HashSet::new(),
            fail_all: true,
        }
    }
}

#[async_trait]
impl StreamResolver for ScriptedResolver {
    async fn resolve(&self, media_ref: &str) -> Result<String, String> {
        if self.fail_all || self.failing.contains(media_ref) {
            return Err(format!("no stream for {}", media_ref));
        }
        Ok(media_ref.to_string())
    }
}

/// Flat spectrum whose level the test sets at will
#[derive(Clone)]
pub struct LevelControl {
    level: Arc<Mutex<Option<f32>>>,
}

impl LevelControl {
    pub fn new(level: f32) -> Self {
        Self {
            level: Arc::new(Mutex::new(Some(level))),
        }
    }

    pub fn set(&self, level: f32) {
        *self.level.lock().unwrap() = Some(level);
    }

    /// Make the next read report signal loss
    pub fn revoke(&self) {
        *self.level.lock().unwrap() = None;
    }

    pub fn source(&self) -> Box<dyn SpectrumSource> {
        Box::new(self.clone())
    }
}

impl SpectrumSource for LevelControl {
    fn read_spectrum(&mut self, bins: &mut Vec<f32>) -> Result<(), SignalLost> {
        match *self.level.lock().unwrap() {
            Some(level) => {
                bins.extend(std::iter::repeat(level).take(16));
                Ok(())
            }
            None => Err(SignalLost("capture revoked".into())),
        }
    }
}

pub fn playlist(count: usize) -> Playlist {
    Playlist::new((0..count).map(track).collect()).unwrap()
}

pub fn track(i: usize) -> Track {
    Track::new(
        format!("t{}", i),
        "Artist",
        format!("Track {}", i),
        format!("media://t{}", i),
    )
}

/// 5 s lead window, 1 s fades
pub fn fast_config() -> MixConfig {
    MixConfig {
        lead_window_secs: 5.0,
        fade_duration_ms: 1000,
        ..MixConfig::default()
    }
}

/// Two simulated channels where every track lasts `seconds`
pub fn channels(seconds: f64) -> ([Box<dyn PlaybackChannel>; 2], [ChannelProbe; 2]) {
    let a = SimulatedChannel::new(seconds).recording();
    let b = SimulatedChannel::new(seconds).recording();
    let probes = [a.probe(), b.probe()];
    ([Box::new(a), Box::new(b)], probes)
}

/// Wait (on the virtual clock) for the first event matching `pred`
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<MixEvent>, mut pred: F) -> MixEvent
where
    F: FnMut(&MixEvent) -> bool,
{
    let found = tokio::time::timeout(Duration::from_secs(300), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await;
    found.expect("timed out waiting for event")
}

/// Every event received during the next `window` of virtual time
pub async fn collect_for(rx: &mut broadcast::Receiver<MixEvent>, window: Duration) -> Vec<MixEvent> {
    let mut events = Vec::new();
    let _ = tokio::time::timeout(window, async {
        loop {
            match rx.recv().await {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
    .await;
    events
}

pub fn is_transition_started(event: &MixEvent) -> bool {
    matches!(event, MixEvent::TransitionStarted { .. })
}

pub fn is_transition_completed(event: &MixEvent) -> bool {
    matches!(event, MixEvent::TransitionCompleted { .. })
}
