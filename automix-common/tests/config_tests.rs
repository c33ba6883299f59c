//! Configuration and playlist file loading
//!
//! Tests touching `AUTOMIX_CONFIG` are marked with #[serial] so they never
//! race on the process environment.

use automix_common::config::{MixConfig, CONFIG_ENV_VAR};
use automix_common::{Error, FadeCurve, Playlist};
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_path_wins_over_environment() {
    let dir = TempDir::new().unwrap();
    let cli = write_file(&dir, "cli.toml", "fade_duration_ms = 1200\n");
    let from_env = write_file(&dir, "env.toml", "fade_duration_ms = 9000\n");

    env::set_var(CONFIG_ENV_VAR, &from_env);
    let config = MixConfig::resolve(Some(&cli)).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.fade_duration_ms, 1200);
}

#[test]
#[serial]
fn test_environment_path_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let from_env = write_file(
        &dir,
        "env.toml",
        "lead_window_secs = 8.0\nfade_curve = \"equal_power\"\nlive_analysis = true\n",
    );

    env::set_var(CONFIG_ENV_VAR, &from_env);
    let config = MixConfig::resolve(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.lead_window_secs, 8.0);
    assert_eq!(config.fade_curve, FadeCurve::EqualPower);
    assert!(config.live_analysis);
    // Untouched keys keep their defaults
    assert_eq!(config.silence_duration_ms, 2000);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    env::set_var(CONFIG_ENV_VAR, dir.path().join("absent.toml"));
    let result = MixConfig::resolve(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_out_of_range_values_are_clamped_on_load() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "master_volume = 3.0").unwrap();
    writeln!(file, "progress_interval_ms = 5000").unwrap();
    writeln!(file, "analysis_interval_ms = 0").unwrap();

    let config = MixConfig::load(file.path()).unwrap();
    assert_eq!(config.master_volume, 1.0);
    assert_eq!(config.progress_interval_ms, 1000);
    assert_eq!(config.analysis_interval_ms, 1);
}

#[test]
fn test_playlist_loaded_by_extension() {
    let dir = TempDir::new().unwrap();
    let json = write_file(
        &dir,
        "set.json",
        r#"[
            {"id": "a", "artist": "X", "title": "One", "videoId": "abc", "introSkip": 12},
            {"id": "b", "artist": "Y", "title": "Two", "mediaRef": "def", "outroSkip": 20}
        ]"#,
    );
    let toml = write_file(
        &dir,
        "set.toml",
        "[[tracks]]\nartist = \"Z\"\ntitle = \"Three\"\nmedia_ref = \"ghi\"\n",
    );

    let from_json = Playlist::load(&json).unwrap();
    assert_eq!(from_json.len(), 2);
    assert_eq!(from_json.get(0).media_ref, "abc");
    assert_eq!(from_json.get(0).intro_skip_seconds, 12.0);
    assert_eq!(from_json.get(1).outro_skip_seconds, 20.0);

    let from_toml = Playlist::load(&toml).unwrap();
    assert_eq!(from_toml.len(), 1);
    assert_eq!(from_toml.get(0).id, "ghi", "missing id falls back to media ref");
}

#[test]
fn test_empty_and_unknown_playlists_rejected() {
    let dir = TempDir::new().unwrap();
    let empty = write_file(&dir, "empty.json", "[]");
    let unknown = write_file(&dir, "set.m3u", "#EXTM3U\n");

    assert!(matches!(Playlist::load(&empty), Err(Error::EmptyPlaylist)));
    assert!(matches!(Playlist::load(&unknown), Err(Error::Config(_))));
}
