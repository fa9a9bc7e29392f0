use std::path::PathBuf;

use serde::Deserialize;

use crate::audio::RepeatMode;

/// Longest reverb tail the impulse generator will build.
pub const MAX_REVERB_SECONDS: f32 = 10.0;
/// Upper bound for `playback.restart_threshold_secs`.
pub const MAX_RESTART_THRESHOLD_SECS: f64 = 600.0;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/spatial-player/config.toml` or
/// `~/.config/spatial-player/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `SPATIAL_PLAYER__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub playback: PlaybackSettings,
    pub library: LibrarySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Render rate of the signal graph (Hz). Sources are resampled to it.
    pub sample_rate: u32,
    /// Master volume at startup, `0.0..=1.0`.
    pub initial_volume: f32,
    /// Equalizer band centre frequencies (Hz), ascending.
    ///
    /// The lowest band is a low shelf, the highest a high shelf and the
    /// rest are peaking filters.
    pub eq_bands: Vec<u32>,
    /// Q shared by the peaking bands.
    pub eq_q: f32,
    /// Corner frequency of the bass-boost shelf (Hz).
    pub bass_boost_frequency: f32,
    /// Length of the generated reverb impulse (seconds).
    pub reverb_seconds: f32,
    /// Decay time constant of the reverb envelope (seconds).
    pub reverb_decay: f32,
    /// Analyser FFT size. Must be a power of two.
    pub fft_size: usize,
    /// Analyser smoothing between frames, `0.0..1.0`.
    pub smoothing: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            initial_volume: 0.7,
            eq_bands: vec![60, 250, 1000, 4000, 16000],
            eq_q: 1.0,
            bass_boost_frequency: 200.0,
            reverb_seconds: 2.5,
            reverb_decay: 0.6,
            fft_size: 512,
            smoothing: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Whether shuffle starts enabled.
    pub shuffle: bool,
    /// Default repeat mode.
    pub repeat_mode: RepeatModeSetting,
    /// `previous` restarts the current track instead once playback is past
    /// this many seconds.
    pub restart_threshold_secs: f64,
    /// Skip to the next track when a track fails to load during playback.
    pub auto_advance_on_failure: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            shuffle: false,
            repeat_mode: RepeatModeSetting::Off,
            restart_threshold_secs: 3.0,
            auto_advance_on_failure: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatModeSetting {
    #[serde(alias = "none", alias = "no-repeat", alias = "no_repeat")]
    Off,
    #[serde(
        alias = "repeat-all",
        alias = "repeat_all",
        alias = "loop-all",
        alias = "loop_all"
    )]
    All,
    #[serde(
        alias = "repeat-one",
        alias = "repeat_one",
        alias = "loop-one",
        alias = "loop_one"
    )]
    One,
}

impl From<RepeatModeSetting> for RepeatMode {
    fn from(setting: RepeatModeSetting) -> Self {
        match setting {
            RepeatModeSetting::Off => RepeatMode::Off,
            RepeatModeSetting::All => RepeatMode::All,
            RepeatModeSetting::One => RepeatMode::One,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec![
                "mp3".into(),
                "flac".into(),
                "wav".into(),
                "ogg".into(),
                "m4a".into(),
            ],
            recursive: true,
            include_hidden: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `spatial_player=debug`.
    /// `SPATIAL_PLAYER_LOG` wins when set.
    pub level: String,
    /// Log file. Defaults to `spatial-player.log` in the state directory.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
