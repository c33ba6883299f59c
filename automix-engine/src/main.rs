//! Automix (automix) - headless rehearsal entry point
//!
//! Runs the auto-mix engine over simulated playback channels so a playlist's
//! transition timing can be checked without audio hardware. Every event the
//! engine broadcasts is logged.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use automix_common::events::MixEvent;
use automix_common::{FadeCurve, MixConfig, Playlist};
use automix_engine::playback::SimulatedChannel;
use automix_engine::{AutoMixEngine, PassthroughResolver, PlaybackChannel};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for automix
#[derive(Parser, Debug)]
#[command(name = "automix")]
#[command(about = "Always-on two-deck auto-mix engine (simulated playback)")]
#[command(version)]
struct Args {
    /// Playlist file (.json or .toml)
    #[arg(short, long)]
    playlist: PathBuf,

    /// Mixer config file
    #[arg(short, long, env = "AUTOMIX_CONFIG")]
    config: Option<PathBuf>,

    /// Override the crossfade duration (milliseconds)
    #[arg(long)]
    fade_ms: Option<u64>,

    /// Override the lead window (seconds before track end)
    #[arg(long)]
    lead_window: Option<f64>,

    /// Override the fade curve (linear, s_curve, equal_power)
    #[arg(long)]
    fade_curve: Option<String>,

    /// Simulated length of every track (seconds)
    #[arg(long, default_value = "30")]
    track_seconds: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automix=info,automix_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = MixConfig::resolve(args.config.as_deref())
        .context("Failed to load mixer configuration")?;
    if let Some(fade_ms) = args.fade_ms {
        config.fade_duration_ms = fade_ms;
    }
    if let Some(lead_window) = args.lead_window {
        config.lead_window_secs = lead_window;
    }
    if let Some(name) = args.fade_curve.as_deref() {
        config.fade_curve = FadeCurve::from_str(name)
            .ok_or_else(|| anyhow!("Unknown fade curve: {}", name))?;
    }
    if !config.fade_curve.preserves_sum() {
        warn!(
            "Fade curve {} does not keep deck gains summing to the master volume",
            config.fade_curve
        );
    }

    let playlist = Playlist::load(&args.playlist)
        .with_context(|| format!("Failed to load playlist {}", args.playlist.display()))?;
    info!(
        "Loaded {} tracks from {}",
        playlist.len(),
        args.playlist.display()
    );

    let channels: [Box<dyn PlaybackChannel>; 2] = [
        Box::new(SimulatedChannel::new(args.track_seconds)),
        Box::new(SimulatedChannel::new(args.track_seconds)),
    ];
    let engine = AutoMixEngine::start(
        config,
        playlist,
        Arc::new(PassthroughResolver),
        channels,
        None,
    )
    .context("Failed to start auto-mix engine")?;

    let mut events = engine.subscribe();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!("Event log lagged, {} events skipped", skipped),
                Err(RecvError::Closed) => {
                    error!("Engine event bus closed unexpectedly");
                    break;
                }
            },
        }
    }

    engine.shutdown().await.context("Engine shutdown failed")?;
    info!("Shutdown complete");
    Ok(())
}

fn log_event(event: &MixEvent) {
    match event {
        MixEvent::DeckProgress {
            deck,
            position_seconds,
            duration_seconds,
            ..
        } => debug!(
            "Deck {} at {:.1}/{:.1}s",
            deck, position_seconds, duration_seconds
        ),
        MixEvent::LevelChanged { .. } | MixEvent::BeatDetected { .. } => {
            debug!("{}", event.name())
        }
        other => match serde_json::to_string(other) {
            Ok(json) => info!("{}", json),
            Err(_) => info!("{}", other.name()),
        },
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
