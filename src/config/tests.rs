use super::load::{default_config_path, default_state_dir, resolve_config_path};
use super::schema::*;
use crate::audio::RepeatMode;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(&cfg_path, body).unwrap();
    cfg_path
}

#[test]
fn resolve_config_path_prefers_explicit_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("SPATIAL_PLAYER_CONFIG_PATH", "/tmp/spatial-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/spatial-test-config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("spatial-player")
            .join("config.toml")
    );
}

#[test]
fn default_config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("spatial-player")
            .join("config.toml")
    );
}

#[test]
fn state_dir_falls_back_to_home_local_state() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_STATE_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    assert_eq!(
        default_state_dir().unwrap(),
        std::path::PathBuf::from("/tmp/home-dir/.local/state/spatial-player")
    );
}

#[test]
fn defaults_are_valid() {
    let s = Settings::default();
    assert!(s.validate().is_ok());
    assert_eq!(s.audio.eq_bands, vec![60, 250, 1000, 4000, 16000]);
    assert_eq!(s.audio.initial_volume, 0.7);
    assert_eq!(s.audio.fft_size, 512);
    assert_eq!(s.playback.repeat_mode, RepeatModeSetting::Off);
    assert_eq!(s.playback.restart_threshold_secs, 3.0);
}

#[test]
fn settings_load_from_config_file_and_parse_repeat_aliases() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = write_config(
        &dir,
        r#"
[playback]
shuffle = true
repeat_mode = "repeat-one"
restart_threshold_secs = 5.0
auto_advance_on_failure = false

[audio]
sample_rate = 48000
initial_volume = 0.5
eq_bands = [100, 1000, 10000]
reverb_seconds = 1.5
fft_size = 1024

[library]
extensions = ["mp3"]
recursive = false
include_hidden = true

[logging]
level = "debug"
file = "/tmp/spatial.log"
"#,
    );

    let _g1 = EnvGuard::set("SPATIAL_PLAYER_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("SPATIAL_PLAYER__AUDIO__INITIAL_VOLUME");

    let s = Settings::load().unwrap();
    assert!(s.playback.shuffle);
    assert_eq!(RepeatMode::from(s.playback.repeat_mode), RepeatMode::One);
    assert_eq!(s.playback.restart_threshold_secs, 5.0);
    assert!(!s.playback.auto_advance_on_failure);
    assert_eq!(s.audio.sample_rate, 48_000);
    assert_eq!(s.audio.initial_volume, 0.5);
    assert_eq!(s.audio.eq_bands, vec![100, 1000, 10000]);
    assert_eq!(s.audio.reverb_seconds, 1.5);
    assert_eq!(s.audio.fft_size, 1024);
    // Untouched keys keep their defaults.
    assert_eq!(s.audio.eq_q, 1.0);
    assert_eq!(s.audio.smoothing, 0.8);
    assert_eq!(s.library.extensions, vec!["mp3".to_string()]);
    assert!(!s.library.recursive);
    assert!(s.library.include_hidden);
    assert_eq!(s.logging.level, "debug");
    assert_eq!(
        s.logging.file.as_deref(),
        Some(std::path::Path::new("/tmp/spatial.log"))
    );
    assert!(s.validate().is_ok());
}

#[test]
fn repeat_mode_accepts_all_spellings() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().unwrap();

    for (raw, expected) in [
        ("off", RepeatModeSetting::Off),
        ("none", RepeatModeSetting::Off),
        ("all", RepeatModeSetting::All),
        ("loop-all", RepeatModeSetting::All),
        ("repeat_all", RepeatModeSetting::All),
        ("one", RepeatModeSetting::One),
        ("loop_one", RepeatModeSetting::One),
    ] {
        let cfg_path = write_config(&dir, &format!("[playback]\nrepeat_mode = \"{raw}\"\n"));
        let _g = EnvGuard::set("SPATIAL_PLAYER_CONFIG_PATH", cfg_path.to_str().unwrap());
        let s = Settings::load().unwrap();
        assert_eq!(s.playback.repeat_mode, expected, "{raw}");
    }
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = write_config(
        &dir,
        r#"
[audio]
initial_volume = 0.9
"#,
    );

    let _g1 = EnvGuard::set("SPATIAL_PLAYER_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("SPATIAL_PLAYER__AUDIO__INITIAL_VOLUME", "0.25");

    let s = Settings::load().unwrap();
    assert_eq!(s.audio.initial_volume, 0.25);
}

#[test]
fn missing_config_file_yields_defaults() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().unwrap();
    let _g1 = EnvGuard::set(
        "SPATIAL_PLAYER_CONFIG_PATH",
        dir.path().join("absent.toml").to_str().unwrap(),
    );

    let s = Settings::load().unwrap();
    assert_eq!(s.audio.sample_rate, 44_100);
    assert!(s.playback.auto_advance_on_failure);
}

#[test]
fn validate_rejects_bad_values() {
    let mut s = Settings::default();
    s.audio.eq_bands = vec![1000, 250];
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.audio.eq_bands.clear();
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.audio.fft_size = 500;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.audio.initial_volume = 1.5;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.audio.smoothing = 1.0;
    assert!(s.validate().is_err());
}

#[test]
fn validate_rejects_unbounded_durations() {
    let mut s = Settings::default();
    s.playback.restart_threshold_secs = f64::INFINITY;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.playback.restart_threshold_secs = f64::NAN;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.audio.reverb_seconds = f32::INFINITY;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.audio.reverb_seconds = 1e9;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.audio.reverb_decay = f32::INFINITY;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.audio.reverb_seconds = MAX_REVERB_SECONDS;
    s.playback.restart_threshold_secs = MAX_RESTART_THRESHOLD_SECS;
    assert!(s.validate().is_ok());
}

#[test]
fn infinite_threshold_from_env_is_rejected() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().unwrap();
    let _cfg = EnvGuard::set(
        "SPATIAL_PLAYER_CONFIG_PATH",
        dir.path().join("missing.toml").to_str().unwrap(),
    );
    let _threshold = EnvGuard::set("SPATIAL_PLAYER__PLAYBACK__RESTART_THRESHOLD_SECS", "inf");

    let s = Settings::load().unwrap();
    assert!(s.playback.restart_threshold_secs.is_infinite());
    assert!(s.validate().is_err());
}
