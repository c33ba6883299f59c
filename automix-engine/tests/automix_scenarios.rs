//! End-to-end auto-mix scenarios on a paused clock
//!
//! Every test runs with `start_paused = true`: the simulated channels, the
//! fade ramp, the lead window and the silence window all follow tokio's
//! virtual clock, so timings can be asserted exactly.

mod helpers;

use automix_common::events::{MixEvent, MixState, TransitionTrigger};
use automix_common::{DeckId, MixConfig, Playlist, Track};
use automix_engine::{AutoMixEngine, PassthroughResolver};
use helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn secs(since: Instant) -> f64 {
    since.elapsed().as_secs_f64()
}

#[tokio::test(start_paused = true)]
async fn test_time_trigger_fades_to_next_deck_and_reloads() {
    let (channels, probes) = channels(10.0);
    let t0 = Instant::now();
    let engine = AutoMixEngine::start(
        fast_config(),
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        None,
    )
    .unwrap();
    let mut rx = engine.subscribe();

    wait_for(&mut rx, |e| matches!(e, MixEvent::EngineStarted { track_count: 3, .. })).await;

    let started = wait_for(&mut rx, is_transition_started).await;
    let at = secs(t0);
    match started {
        MixEvent::TransitionStarted {
            from,
            to,
            track_index,
            trigger,
            fade_duration_ms,
            ..
        } => {
            assert_eq!((from, to), (DeckId::A, DeckId::B));
            assert_eq!(track_index, 1);
            assert_eq!(trigger, TransitionTrigger::TimeWindow);
            assert_eq!(fade_duration_ms, 1000);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!((5.0..6.0).contains(&at), "transition armed at {}s", at);

    // Displayed track flips at the start of the fade
    let now_playing = wait_for(&mut rx, |e| matches!(e, MixEvent::NowPlaying { .. })).await;
    assert!(matches!(
        now_playing,
        MixEvent::NowPlaying { deck: DeckId::B, track_index: 1, .. }
    ));
    assert!(secs(t0) < at + 0.1);

    wait_for(&mut rx, is_transition_completed).await;
    let done = secs(t0);
    assert!(done >= at + 1.0 && done < at + 1.1, "fade finished at {}s", done);
    assert_eq!(probes[0].volume(), 0.0);
    assert_eq!(probes[1].volume(), 1.0);
    assert!(!probes[0].is_playing(), "silent deck is paused");
    assert!(probes[1].is_playing());

    let queued = wait_for(&mut rx, |e| {
        matches!(e, MixEvent::TrackQueued { deck: DeckId::A, .. })
    })
    .await;
    assert!(matches!(queued, MixEvent::TrackQueued { track_index: 2, .. }));
    assert!(secs(t0) >= done + 1.0, "reload waits out the grace delay");

    wait_for(&mut rx, |e| {
        matches!(e, MixEvent::TrackLoaded { deck: DeckId::A, track_index: 2, .. })
    })
    .await;
    assert!(!probes[0].is_playing(), "reloaded deck stays cued");

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_gains_always_sum_to_master_volume() {
    let (channels, probes) = channels(10.0);
    let config = MixConfig {
        master_volume: 0.8,
        ..fast_config()
    };
    let engine = AutoMixEngine::start(
        config,
        playlist(2),
        Arc::new(PassthroughResolver),
        channels,
        None,
    )
    .unwrap();
    let mut rx = engine.subscribe();
    wait_for(&mut rx, is_transition_completed).await;

    let a = probes[0].volume_history();
    let b = probes[1].volume_history();
    assert_eq!(a.len(), b.len());
    assert!(a.len() > 10, "fade was animated in steps");
    for (va, vb) in a.iter().zip(b.iter()) {
        assert!((va + vb - 0.8).abs() < 1e-5, "{} + {}", va, vb);
    }

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_intro_skip_is_initial_cue_point() {
    let tracks = vec![track(0).with_intro_skip(3.0), track(1)];
    let (channels, _probes) = channels(60.0);
    let engine = AutoMixEngine::start(
        fast_config(),
        Playlist::new(tracks).unwrap(),
        Arc::new(PassthroughResolver),
        channels,
        None,
    )
    .unwrap();
    let mut rx = engine.subscribe();
    wait_for(&mut rx, |e| {
        matches!(e, MixEvent::TrackLoaded { deck: DeckId::A, .. })
    })
    .await;

    let snapshot = engine.snapshot().await.unwrap();
    let deck_a = snapshot.deck(DeckId::A);
    assert!(deck_a.is_playing);
    assert!((deck_a.position_seconds - 3.0).abs() < 0.01);
    assert_eq!(deck_a.track.as_ref().map(|t| t.id.as_str()), Some("t0"));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_outro_skip_only_after_midpoint() {
    // Effective end is 12 s, but only honoured past the 10 s midpoint
    let tracks = vec![track(0).with_outro_skip(8.0), track(1)];
    let (channels, _probes) = channels(20.0);
    let t0 = Instant::now();
    let engine = AutoMixEngine::start(
        fast_config(),
        Playlist::new(tracks).unwrap(),
        Arc::new(PassthroughResolver),
        channels,
        None,
    )
    .unwrap();
    let mut rx = engine.subscribe();

    wait_for(&mut rx, is_transition_started).await;
    let at = secs(t0);
    // Without the midpoint rule this would fire at 7 s
    assert!((9.9..11.5).contains(&at), "transition armed at {}s", at);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_no_signal_never_triggers_on_silence() {
    let config = MixConfig {
        live_analysis: true,
        ..fast_config()
    };
    let (channels, _probes) = channels(60.0);
    let engine = AutoMixEngine::start(
        config,
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        None,
    )
    .unwrap();
    let mut rx = engine.subscribe();

    let events = collect_for(&mut rx, Duration::from_secs(30)).await;
    assert!(events.iter().any(|e| matches!(e, MixEvent::DeckProgress { .. })));
    assert!(!events.iter().any(is_transition_started));
    assert!(!events
        .iter()
        .any(|e| matches!(e, MixEvent::SilenceDetected { .. } | MixEvent::LevelChanged { .. })));

    let snapshot = engine.snapshot().await.unwrap();
    assert_eq!(snapshot.state, MixState::SingleDeckActive);
    assert!(!snapshot.analyzer_available);
    assert_eq!(snapshot.loudness, 0.0);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_sustained_silence_triggers_transition() {
    let level = LevelControl::new(0.5);
    let config = MixConfig {
        live_analysis: true,
        ..fast_config()
    };
    let (channels, _probes) = channels(60.0);
    let t0 = Instant::now();
    let engine = AutoMixEngine::start(
        config,
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        Some(level.source()),
    )
    .unwrap();
    let mut rx = engine.subscribe();

    tokio::time::sleep(Duration::from_secs(10)).await;
    level.set(0.0);

    let started = wait_for(&mut rx, is_transition_started).await;
    let at = secs(t0);
    assert!(matches!(
        started,
        MixEvent::TransitionStarted { trigger: TransitionTrigger::Silence, to: DeckId::B, .. }
    ));
    assert!((11.9..12.2).contains(&at), "silence fired at {}s", at);

    engine.shutdown().await.unwrap();
}

fn trigger_of(event: &MixEvent) -> Option<TransitionTrigger> {
    match event {
        MixEvent::TransitionStarted { trigger, .. } => Some(*trigger),
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_silence_during_time_triggered_fade_is_dropped() {
    // Fade runs 5 s..8 s; the silence window completes inside it
    let level = LevelControl::new(0.5);
    let config = MixConfig {
        live_analysis: true,
        fade_duration_ms: 3000,
        ..fast_config()
    };
    let (channels, _probes) = channels(10.0);
    let engine = AutoMixEngine::start(
        config,
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        Some(level.source()),
    )
    .unwrap();
    let mut rx = engine.subscribe();

    tokio::time::sleep(Duration::from_millis(3200)).await;
    level.set(0.0);
    let events = collect_for(&mut rx, Duration::from_millis(5300)).await;

    let triggers: Vec<_> = events.iter().filter_map(trigger_of).collect();
    assert_eq!(triggers, vec![TransitionTrigger::TimeWindow]);

    let position = |pred: fn(&MixEvent) -> bool| events.iter().position(pred);
    let started = position(is_transition_started).unwrap();
    let completed = position(is_transition_completed).unwrap();
    let silence = position(|e| matches!(e, MixEvent::SilenceDetected { .. }))
        .expect("silence fired during the fade");
    assert!(started < silence && silence < completed);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_time_trigger_wins_when_both_due_on_same_tick() {
    // Analyzer sampled on the progress cadence: silence opens at 3 s and is
    // due at 5 s, the same tick the lead window opens
    let level = LevelControl::new(0.5);
    let config = MixConfig {
        live_analysis: true,
        analysis_interval_ms: 1000,
        ..fast_config()
    };
    let (channels, _probes) = channels(10.0);
    let engine = AutoMixEngine::start(
        config,
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        Some(level.source()),
    )
    .unwrap();
    let mut rx = engine.subscribe();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    level.set(0.0);
    // Up to 6.3 s: past the fade, before a fresh silence window could finish
    let events = collect_for(&mut rx, Duration::from_millis(3800)).await;

    let triggers: Vec<_> = events.iter().filter_map(trigger_of).collect();
    assert_eq!(triggers, vec![TransitionTrigger::TimeWindow]);
    assert_eq!(events.iter().filter(|e| is_transition_completed(e)).count(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_silence_window_restarts_with_each_track() {
    let level = LevelControl::new(0.5);
    let config = MixConfig {
        live_analysis: true,
        ..fast_config()
    };
    let (channels, _probes) = channels(10.0);
    let t0 = Instant::now();
    let engine = AutoMixEngine::start(
        config.clone(),
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        Some(level.source()),
    )
    .unwrap();
    let mut rx = engine.subscribe();

    // Silence opens on track 0, one second before its lead window
    tokio::time::sleep(Duration::from_secs(4)).await;
    level.set(0.0);

    let first = wait_for(&mut rx, is_transition_started).await;
    let first_at = secs(t0);
    assert_eq!(trigger_of(&first), Some(TransitionTrigger::TimeWindow));

    let second = wait_for(&mut rx, is_transition_started).await;
    let second_at = secs(t0);
    assert!(matches!(
        second,
        MixEvent::TransitionStarted { trigger: TransitionTrigger::Silence, to: DeckId::A, .. }
    ));
    // Track 1 had to be silent for the full window on its own
    let window = config.silence_duration_ms as f64 / 1000.0;
    assert!(
        second_at - first_at >= window,
        "track 1 skipped {}s after it started",
        second_at - first_at
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_silence_ignored_while_live_analysis_disabled() {
    let level = LevelControl::new(0.0);
    let (channels, _probes) = channels(60.0);
    let engine = AutoMixEngine::start(
        fast_config(),
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        Some(level.source()),
    )
    .unwrap();
    let mut rx = engine.subscribe();

    let events = collect_for(&mut rx, Duration::from_secs(10)).await;
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, MixEvent::SilenceDetected { .. }))
            .count(),
        1,
        "one continuous silence fires once"
    );
    assert!(!events.iter().any(is_transition_started));

    // Enabling it later does not replay the silence already reported
    engine.set_live_analysis(true).await.unwrap();
    let events = collect_for(&mut rx, Duration::from_secs(5)).await;
    assert!(!events.iter().any(is_transition_started));

    // A rise and a new fall re-arms the detector
    level.set(0.6);
    tokio::time::sleep(Duration::from_millis(100)).await;
    level.set(0.0);
    let started = wait_for(&mut rx, is_transition_started).await;
    assert!(matches!(
        started,
        MixEvent::TransitionStarted { trigger: TransitionTrigger::Silence, .. }
    ));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_signal_loss_degrades_to_time_trigger() {
    let level = LevelControl::new(0.5);
    let config = MixConfig {
        live_analysis: true,
        ..fast_config()
    };
    let (channels, _probes) = channels(10.0);
    let engine = AutoMixEngine::start(
        config,
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        Some(level.source()),
    )
    .unwrap();
    let mut rx = engine.subscribe();

    wait_for(&mut rx, |e| matches!(e, MixEvent::LevelChanged { .. })).await;
    level.revoke();
    wait_for(&mut rx, |e| matches!(e, MixEvent::AnalyzerUnavailable { .. })).await;

    let started = wait_for(&mut rx, is_transition_started).await;
    assert!(matches!(
        started,
        MixEvent::TransitionStarted { trigger: TransitionTrigger::TimeWindow, .. }
    ));
    let snapshot = engine.snapshot().await.unwrap();
    assert!(!snapshot.analyzer_available);

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_attached_signal_drives_silence_trigger() {
    let config = MixConfig {
        live_analysis: true,
        ..fast_config()
    };
    let (channels, _probes) = channels(60.0);
    let engine = AutoMixEngine::start(
        config,
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        None,
    )
    .unwrap();
    let mut rx = engine.subscribe();
    wait_for(&mut rx, |e| {
        matches!(e, MixEvent::TrackLoaded { deck: DeckId::B, .. })
    })
    .await;
    assert!(!engine.snapshot().await.unwrap().analyzer_available);

    let level = LevelControl::new(0.5);
    engine.attach_signal(level.source()).await.unwrap();
    wait_for(&mut rx, |e| matches!(e, MixEvent::LevelChanged { .. })).await;
    let snapshot = engine.snapshot().await.unwrap();
    assert!(snapshot.analyzer_available);
    assert!((snapshot.loudness - 0.5).abs() < 1e-5);

    level.set(0.0);
    let started = wait_for(&mut rx, is_transition_started).await;
    assert!(matches!(
        started,
        MixEvent::TransitionStarted { trigger: TransitionTrigger::Silence, .. }
    ));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_is_never_a_transition_target() {
    let (channels, _probes) = channels(10.0);
    let engine = AutoMixEngine::start(
        fast_config(),
        playlist(3),
        Arc::new(ScriptedResolver::failing(&["media://t1"])),
        channels,
        None,
    )
    .unwrap();
    let mut rx = engine.subscribe();

    let failed = wait_for(&mut rx, |e| matches!(e, MixEvent::LoadFailed { .. })).await;
    match failed {
        MixEvent::LoadFailed {
            deck,
            track_index,
            reason,
            ..
        } => {
            assert_eq!(deck, DeckId::B);
            assert_eq!(track_index, 1);
            assert!(reason.contains("stream resolution failed"), "{}", reason);
        }
        other => panic!("unexpected {:?}", other),
    }
    let snapshot = engine.snapshot().await.unwrap();
    assert!(snapshot.deck(DeckId::B).track.is_none());

    // When the lead window opens, the following track is cued first
    wait_for(&mut rx, |e| {
        matches!(e, MixEvent::TrackQueued { deck: DeckId::B, track_index: 2, .. })
    })
    .await;
    let started = wait_for(&mut rx, is_transition_started).await;
    assert!(matches!(
        started,
        MixEvent::TransitionStarted { to: DeckId::B, track_index: 2, .. }
    ));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_full_pass_of_failures_pauses_auto_advance() {
    let (channels, _probes) = channels(10.0);
    let engine = AutoMixEngine::start(
        fast_config(),
        playlist(2),
        Arc::new(ScriptedResolver::failing_all()),
        channels,
        None,
    )
    .unwrap();
    let mut rx = engine.subscribe();

    let events = collect_for(&mut rx, Duration::from_secs(20)).await;
    let failures = events
        .iter()
        .filter(|e| matches!(e, MixEvent::LoadFailed { .. }))
        .count();
    assert_eq!(failures, 2);
    assert!(!events.iter().any(is_transition_started));

    let snapshot = engine.snapshot().await.unwrap();
    assert!(!snapshot.auto_advance);
    assert!(snapshot.decks.iter().all(|d| d.track.is_none()));

    engine.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_both_decks() {
    let (channels, probes) = channels(60.0);
    let engine = AutoMixEngine::start(
        fast_config(),
        playlist(3),
        Arc::new(PassthroughResolver),
        channels,
        None,
    )
    .unwrap();
    let mut rx = engine.subscribe();
    wait_for(&mut rx, |e| {
        matches!(e, MixEvent::TrackLoaded { deck: DeckId::B, .. })
    })
    .await;
    assert!(probes[0].is_playing());

    engine.shutdown().await.unwrap();

    wait_for(&mut rx, |e| matches!(e, MixEvent::EngineStopped { .. })).await;
    for probe in &probes {
        assert!(!probe.is_playing());
        assert_eq!(probe.attached_url(), None);
    }
}

#[test]
fn test_empty_playlist_fails_fast() {
    let result = Playlist::new(Vec::<Track>::new());
    let error: automix_engine::Error = result.unwrap_err().into();
    assert!(matches!(
        error,
        automix_engine::Error::Common(automix_common::Error::EmptyPlaylist)
    ));
}
