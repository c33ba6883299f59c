//! Crossfade controller
//!
//! Owns the single mix ratio (0.0 = deck A only, 1.0 = deck B only) and
//! ramps it linearly in time toward a target deck. Both deck gains are
//! derived from that one ratio on every step:
//!
//! - deck A: `fade_out(ratio) × master`
//! - deck B: `fade_in(ratio) × master`
//!
//! With the default linear law this is `(1 - r) × master` and
//! `r × master`, so the two gains always sum to the master volume.
//!
//! Only one fade is ever in flight. A new `fade_to` replaces the running
//! one and starts from the ratio reached so far. At completion the ratio is
//! set to the exact target, so the silent deck is at exactly zero gain
//! before the orchestrator pauses it.

use crate::deck::Deck;
use automix_common::{DeckId, FadeCurve};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Public view of the crossfader
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadeState {
    pub ratio: f32,
    pub is_fading: bool,
    pub fade_started_at: Option<Instant>,
    pub fade_duration: Duration,
    pub target: Option<DeckId>,
}

/// A fade was replaced before it finished
///
/// Internal bookkeeping only; the superseded fade never reports completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeInterrupted {
    pub superseded: DeckId,
    pub ratio_at_interrupt: f32,
}

/// Outcome of one animation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    /// No fade in flight
    Idle,
    /// Ramp still running
    Progress { ratio: f32 },
    /// Ratio reached the target exactly; reported once per fade
    Completed { target: DeckId },
}

#[derive(Debug, Clone, Copy)]
struct Fade {
    from: f32,
    target: DeckId,
    started_at: Instant,
    duration: Duration,
}

/// Two-deck crossfader
#[derive(Debug, Clone)]
pub struct Crossfader {
    ratio: f32,
    fade: Option<Fade>,
    curve: FadeCurve,
    master_volume: f32,
}

impl Crossfader {
    /// Starts at rest on deck A
    pub fn new(curve: FadeCurve, master_volume: f32) -> Self {
        Self {
            ratio: DeckId::A.ratio(),
            fade: None,
            curve,
            master_volume: master_volume.clamp(0.0, 1.0),
        }
    }

    /// Begin ramping toward `target` over `duration`
    ///
    /// The ramp starts from the current ratio. A fade already in flight is
    /// cancelled and returned as [`FadeInterrupted`].
    pub fn fade_to(&mut self, target: DeckId, duration: Duration, now: Instant) -> Option<FadeInterrupted> {
        let interrupted = self.fade.take().map(|old| FadeInterrupted {
            superseded: old.target,
            ratio_at_interrupt: self.ratio,
        });
        if let Some(i) = &interrupted {
            debug!(
                "Fade toward deck {} superseded at ratio {:.3}",
                i.superseded, i.ratio_at_interrupt
            );
        }

        debug!(
            "Fading to deck {} over {} ms from ratio {:.3}",
            target,
            duration.as_millis(),
            self.ratio
        );
        self.fade = Some(Fade {
            from: self.ratio,
            target,
            started_at: now,
            duration,
        });
        interrupted
    }

    /// Advance the ramp to `now` and write both deck gains
    pub fn step(&mut self, now: Instant, decks: &mut [Deck; 2]) -> FadeStep {
        let Some(fade) = self.fade else {
            return FadeStep::Idle;
        };

        let elapsed = now.saturating_duration_since(fade.started_at);
        let progress = if fade.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / fade.duration.as_secs_f64()).min(1.0)
        };

        if progress >= 1.0 {
            self.ratio = fade.target.ratio();
            self.fade = None;
            self.apply(decks);
            debug!("Fade to deck {} complete", fade.target);
            return FadeStep::Completed { target: fade.target };
        }

        let to = fade.target.ratio();
        self.ratio = (fade.from + (to - fade.from) * progress as f32).clamp(0.0, 1.0);
        self.apply(decks);
        FadeStep::Progress { ratio: self.ratio }
    }

    /// Jump straight to `deck` with no ramp, cancelling any fade
    pub fn cut_to(&mut self, deck: DeckId, decks: &mut [Deck; 2]) {
        self.fade = None;
        self.ratio = deck.ratio();
        self.apply(decks);
    }

    /// Write the gains for the current ratio to both decks
    pub fn apply(&self, decks: &mut [Deck; 2]) {
        let [a, b] = self.gains();
        decks[DeckId::A.index()].set_volume(a);
        decks[DeckId::B.index()].set_volume(b);
    }

    /// `[deck A, deck B]` gains at the current ratio
    pub fn gains(&self) -> [f32; 2] {
        [
            self.curve.calculate_fade_out(self.ratio) * self.master_volume,
            self.curve.calculate_fade_in(self.ratio) * self.master_volume,
        ]
    }

    pub fn set_master_volume(&mut self, volume: f32, decks: &mut [Deck; 2]) {
        self.master_volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.apply(decks);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Deck the in-flight fade is heading to
    pub fn target(&self) -> Option<DeckId> {
        self.fade.map(|f| f.target)
    }

    pub fn state(&self) -> CrossfadeState {
        CrossfadeState {
            ratio: self.ratio,
            is_fading: self.fade.is_some(),
            fade_started_at: self.fade.map(|f| f.started_at),
            fade_duration: self.fade.map(|f| f.duration).unwrap_or_default(),
            target: self.fade.map(|f| f.target),
        }
    }
}
