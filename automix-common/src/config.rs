//! Mixer configuration loading
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `AUTOMIX_CONFIG` environment variable
//! 3. `<config_dir>/automix/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is never fatal: the engine starts on defaults.

use crate::{Error, FadeCurve, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "AUTOMIX_CONFIG";

/// Tunables for the auto-mix engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Remaining seconds at which the time trigger arms a transition
    pub lead_window_secs: f64,
    /// Crossfade length in milliseconds (also the reload grace delay)
    pub fade_duration_ms: u64,
    /// Gain law applied to the crossfade ratio
    pub fade_curve: FadeCurve,
    /// Overall output gain, 0.0-1.0
    pub master_volume: f32,
    /// Deck progress polling interval
    pub progress_interval_ms: u64,
    /// Crossfade animation step while a fade is in flight
    pub animation_interval_ms: u64,
    /// Level analyzer sampling interval
    pub analysis_interval_ms: u64,
    /// Enables the silence trigger
    pub live_analysis: bool,
    /// Loudness below which the signal counts as silent
    pub silence_threshold: f32,
    /// Sustained silence required before the silence trigger fires
    pub silence_duration_ms: u64,
    /// Low-band loudness that counts as a beat
    pub beat_threshold: f32,
    /// Suppression window after a beat fires
    pub beat_cooldown_ms: u64,
    /// Number of lowest frequency bins averaged for beat detection
    pub beat_bins: usize,
    /// Broadcast capacity of the outward event bus
    pub event_capacity: usize,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            lead_window_secs: 5.0,
            fade_duration_ms: 5000,
            fade_curve: FadeCurve::Linear,
            master_volume: 1.0,
            progress_interval_ms: 1000,
            animation_interval_ms: 16,
            analysis_interval_ms: 16,
            live_analysis: false,
            silence_threshold: 0.02,
            silence_duration_ms: 2000,
            beat_threshold: 210.0 / 255.0,
            beat_cooldown_ms: 100,
            beat_bins: 10,
            event_capacity: 256,
        }
    }
}

impl MixConfig {
    /// Parse a TOML document; absent keys take their defaults
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: MixConfig = toml::from_str(toml_str)?;
        Ok(config.validated())
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve the config file and load it, falling back to defaults
    ///
    /// An explicitly named file (CLI or environment) that fails to load is
    /// an error; a missing default-location file is not.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_arg {
            info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                info!("Loading config from ${} = {}", CONFIG_ENV_VAR, path);
                return Self::load(Path::new(&path));
            }
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                info!("Loading config from {}", path.display());
                return Self::load(&path);
            }
        }

        info!("No config file found, using compiled defaults");
        Ok(Self::default())
    }

    /// Clamp out-of-range values, warning about each correction
    pub fn validated(mut self) -> Self {
        if !self.lead_window_secs.is_finite() || self.lead_window_secs < 0.0 {
            warn!("lead_window_secs {} invalid, using 5.0", self.lead_window_secs);
            self.lead_window_secs = 5.0;
        }
        if !(0.0..=1.0).contains(&self.master_volume) {
            warn!("master_volume {} out of range, clamping", self.master_volume);
            self.master_volume = if self.master_volume.is_nan() {
                1.0
            } else {
                self.master_volume.clamp(0.0, 1.0)
            };
        }
        // Progress must be reported at least once per second
        let progress = self.progress_interval_ms.clamp(100, 1000);
        if progress != self.progress_interval_ms {
            warn!(
                "progress_interval_ms {} out of range, using {}",
                self.progress_interval_ms, progress
            );
            self.progress_interval_ms = progress;
        }
        let animation = self.animation_interval_ms.clamp(1, 1000);
        if animation != self.animation_interval_ms {
            warn!(
                "animation_interval_ms {} out of range, using {}",
                self.animation_interval_ms, animation
            );
            self.animation_interval_ms = animation;
        }
        let analysis = self.analysis_interval_ms.clamp(1, 1000);
        if analysis != self.analysis_interval_ms {
            warn!(
                "analysis_interval_ms {} out of range, using {}",
                self.analysis_interval_ms, analysis
            );
            self.analysis_interval_ms = analysis;
        }
        if !(0.0..=1.0).contains(&self.silence_threshold) {
            warn!("silence_threshold {} out of range, using 0.02", self.silence_threshold);
            self.silence_threshold = 0.02;
        }
        if !(0.0..=1.0).contains(&self.beat_threshold) {
            warn!("beat_threshold {} out of range, using default", self.beat_threshold);
            self.beat_threshold = 210.0 / 255.0;
        }
        if self.beat_bins == 0 {
            warn!("beat_bins must be positive, using 10");
            self.beat_bins = 10;
        }
        if self.event_capacity == 0 {
            self.event_capacity = 256;
        }
        self
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn animation_interval(&self) -> Duration {
        Duration::from_millis(self.animation_interval_ms)
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_interval_ms)
    }

    pub fn silence_duration(&self) -> Duration {
        Duration::from_millis(self.silence_duration_ms)
    }

    pub fn beat_cooldown(&self) -> Duration {
        Duration::from_millis(self.beat_cooldown_ms)
    }
}

/// Platform config location: `~/.config/automix/config.toml` on Linux,
/// `~/Library/Application Support/automix/config.toml` on macOS,
/// `%APPDATA%\automix\config.toml` on Windows
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("automix").join("config.toml"))
}
