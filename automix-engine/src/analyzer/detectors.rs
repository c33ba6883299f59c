//! Edge detectors over a loudness stream
//!
//! Both detectors take `now` explicitly. They are only as precise as the
//! sampling interval that feeds them.

use std::time::Duration;
use tokio::time::Instant;

/// Sustained-silence detector
///
/// Starts a window the first sample loudness drops below the threshold and
/// fires once when the window reaches `min_duration`. Any sample at or above
/// the threshold closes the window. After firing, the detector stays quiet
/// until loudness has risen again.
#[derive(Debug, Clone)]
pub struct SilenceDetector {
    threshold: f32,
    min_duration: Duration,
    silence_started_at: Option<Instant>,
    fired: bool,
}

impl SilenceDetector {
    pub fn new(threshold: f32, min_duration: Duration) -> Self {
        Self {
            threshold,
            min_duration,
            silence_started_at: None,
            fired: false,
        }
    }

    /// Feed one loudness sample; returns true exactly when silence fires
    pub fn update(&mut self, loudness: f32, now: Instant) -> bool {
        if loudness >= self.threshold {
            self.silence_started_at = None;
            self.fired = false;
            return false;
        }

        let started = *self.silence_started_at.get_or_insert(now);
        if self.fired {
            return false;
        }
        if now.saturating_duration_since(started) >= self.min_duration {
            self.fired = true;
            return true;
        }
        false
    }

    /// Start of the current silence window, if one is open
    pub fn silence_started_at(&self) -> Option<Instant> {
        self.silence_started_at
    }

    pub fn reset(&mut self) {
        self.silence_started_at = None;
        self.fired = false;
    }
}

/// Low-band transient detector with re-fire cooldown
#[derive(Debug, Clone)]
pub struct BeatDetector {
    threshold: f32,
    cooldown: Duration,
    band_bins: usize,
    last_fired: Option<Instant>,
}

impl BeatDetector {
    /// `band_bins` lowest bins are averaged into the low band
    pub fn new(threshold: f32, cooldown: Duration, band_bins: usize) -> Self {
        Self {
            threshold,
            cooldown,
            band_bins: band_bins.max(1),
            last_fired: None,
        }
    }

    /// Average magnitude of the low band
    pub fn low_band(&self, bins: &[f32]) -> f32 {
        let band = &bins[..bins.len().min(self.band_bins)];
        if band.is_empty() {
            return 0.0;
        }
        band.iter().sum::<f32>() / band.len() as f32
    }

    /// Feed one low-band value; returns true when a beat fires
    pub fn update(&mut self, low_band: f32, now: Instant) -> bool {
        if low_band <= self.threshold {
            return false;
        }
        if let Some(last) = self.last_fired {
            if now.saturating_duration_since(last) < self.cooldown {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}
