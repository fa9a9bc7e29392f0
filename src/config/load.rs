use std::{env, path::PathBuf};

use super::schema::{MAX_RESTART_THRESHOLD_SECS, MAX_REVERB_SECONDS, Settings};

const APP_DIR: &str = "spatial-player";

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix
/// `SPATIAL_PLAYER__`), then an optional config file and falls back to
/// struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("SPATIAL_PLAYER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("audio.eq_bands")
                .with_list_parse_key("library.extensions"),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings. Float ranges are
    /// closed, so `inf` and `NaN` are rejected too.
    pub fn validate(&self) -> Result<(), String> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err("audio.sample_rate must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&audio.initial_volume) {
            return Err("audio.initial_volume must be within 0.0..=1.0".to_string());
        }
        if audio.eq_bands.is_empty() {
            return Err("audio.eq_bands must name at least one band".to_string());
        }
        if audio.eq_bands.windows(2).any(|w| w[0] >= w[1]) {
            return Err("audio.eq_bands must be strictly ascending".to_string());
        }
        if audio.eq_bands.iter().any(|&f| f == 0 || f >= audio.sample_rate / 2) {
            return Err("audio.eq_bands must lie between 0 Hz and Nyquist".to_string());
        }
        if !(audio.eq_q > 0.0) {
            return Err("audio.eq_q must be > 0".to_string());
        }
        if !audio.fft_size.is_power_of_two() || audio.fft_size < 32 {
            return Err("audio.fft_size must be a power of two >= 32".to_string());
        }
        if !(0.0..1.0).contains(&audio.smoothing) {
            return Err("audio.smoothing must be within 0.0..1.0".to_string());
        }
        if !(0.0..=MAX_REVERB_SECONDS).contains(&audio.reverb_seconds) {
            return Err(format!(
                "audio.reverb_seconds must be within 0..={MAX_REVERB_SECONDS}"
            ));
        }
        if !(audio.reverb_decay > 0.0 && audio.reverb_decay.is_finite()) {
            return Err("audio.reverb_decay must be a finite value > 0".to_string());
        }
        if !(0.0..=MAX_RESTART_THRESHOLD_SECS).contains(&self.playback.restart_threshold_secs) {
            return Err(format!(
                "playback.restart_threshold_secs must be within 0..={MAX_RESTART_THRESHOLD_SECS}"
            ));
        }
        Ok(())
    }
}

/// Resolve the config path from `SPATIAL_PLAYER_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("SPATIAL_PLAYER_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// Compute the default config path under
/// `$XDG_CONFIG_HOME/spatial-player/config.toml` or
/// `~/.config/spatial-player/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Where the log file goes when none is configured:
/// `$XDG_STATE_HOME/spatial-player/` or `~/.local/state/spatial-player/`.
pub fn default_state_dir() -> Option<PathBuf> {
    let state_home = if let Some(xdg) = env::var_os("XDG_STATE_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
    };

    state_home.map(|d| d.join(APP_DIR))
}
