//! Level analyzer
//!
//! Samples the live spectrum of the audible mix, reduces it to a loudness
//! scalar (mean of all bins, 0.0-1.0) and runs the silence and beat
//! detectors over it.
//!
//! Without a signal the analyzer is inert: loudness reads 0.0 and no
//! detector is fed, so nothing ever fires. Losing the signal mid-stream
//! degrades to inert once, with a single `Unavailable` event.

mod detectors;
pub mod pcm;

pub use detectors::{BeatDetector, SilenceDetector};
pub use pcm::PcmSpectrumSource;

use crate::collaborators::SpectrumSource;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One loudness reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSample {
    pub loudness: f32,
    pub at: Instant,
}

/// Detector output for the orchestrator's queue
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerEvent {
    /// Loudness stayed below the silence threshold for the minimum duration
    Silence { at: Instant },
    /// Low band exceeded the beat threshold
    Beat { loudness: f32, at: Instant },
    /// The signal went away; analysis is now inert
    Unavailable { reason: String },
}

/// Spectrum-to-loudness analyzer with silence and beat detection
pub struct LevelAnalyzer {
    source: Option<Box<dyn SpectrumSource>>,
    bins: Vec<f32>,
    silence: Option<SilenceDetector>,
    beat: Option<BeatDetector>,
    last: Option<LevelSample>,
}

impl LevelAnalyzer {
    /// New analyzer with no signal attached
    pub fn new() -> Self {
        Self {
            source: None,
            bins: Vec::new(),
            silence: None,
            beat: None,
            last: None,
        }
    }

    /// Attach a signal source, replacing any previous one
    pub fn attach(&mut self, source: Box<dyn SpectrumSource>) {
        info!("Level analyzer attached to signal");
        self.source = Some(source);
        self.reset_detectors();
    }

    /// Drop the signal source; the analyzer becomes inert
    pub fn detach(&mut self) {
        if self.source.take().is_some() {
            info!("Level analyzer detached");
        }
        self.reset_detectors();
        self.last = None;
    }

    pub fn is_available(&self) -> bool {
        self.source.is_some()
    }

    /// Arm the sustained-silence detector
    pub fn on_sustained_silence(&mut self, threshold: f32, min_duration: Duration) {
        debug!(
            "Silence detector armed: threshold {:.3}, {} ms",
            threshold,
            min_duration.as_millis()
        );
        self.silence = Some(SilenceDetector::new(threshold, min_duration));
    }

    /// Arm the beat detector
    pub fn on_beat(&mut self, threshold: f32, cooldown: Duration, band_bins: usize) {
        self.beat = Some(BeatDetector::new(threshold, cooldown, band_bins));
    }

    /// Take one sample and run the detectors
    pub fn sample(&mut self, now: Instant) -> (LevelSample, Vec<AnalyzerEvent>) {
        let mut events = Vec::new();

        let Some(source) = self.source.as_mut() else {
            return (LevelSample { loudness: 0.0, at: now }, events);
        };

        self.bins.clear();
        if let Err(lost) = source.read_spectrum(&mut self.bins) {
            warn!("Level analyzer unavailable, silence triggering disabled: {}", lost);
            self.source = None;
            self.reset_detectors();
            self.last = None;
            events.push(AnalyzerEvent::Unavailable { reason: lost.0 });
            return (LevelSample { loudness: 0.0, at: now }, events);
        }

        let loudness = loudness_of(&self.bins);
        let sample = LevelSample { loudness, at: now };
        self.last = Some(sample);

        if let Some(silence) = self.silence.as_mut() {
            if silence.update(loudness, now) {
                debug!("Sustained silence detected");
                events.push(AnalyzerEvent::Silence { at: now });
            }
        }
        if let Some(beat) = self.beat.as_mut() {
            let low = beat.low_band(&self.bins);
            if beat.update(low, now) {
                events.push(AnalyzerEvent::Beat { loudness: low, at: now });
            }
        }

        (sample, events)
    }

    /// Latest loudness; 0.0 while inert
    pub fn loudness(&self) -> f32 {
        self.last.map(|s| s.loudness).unwrap_or(0.0)
    }

    /// Close any open silence window so the next one starts from `now`
    pub fn reset_silence(&mut self, now: Instant) {
        let Some(silence) = self.silence.as_mut() else {
            return;
        };
        if let Some(started) = silence.silence_started_at() {
            debug!(
                "Discarding silence window open for {} ms",
                now.saturating_duration_since(started).as_millis()
            );
        }
        silence.reset();
    }

    fn reset_detectors(&mut self) {
        if let Some(silence) = self.silence.as_mut() {
            silence.reset();
        }
        if let Some(beat) = self.beat.as_mut() {
            beat.reset();
        }
    }
}

impl Default for LevelAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean bin magnitude, clamped to 0.0-1.0
fn loudness_of(bins: &[f32]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let mean = bins.iter().map(|b| b.clamp(0.0, 1.0)).sum::<f32>() / bins.len() as f32;
    mean.clamp(0.0, 1.0)
}
