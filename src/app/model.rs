//! Controller state types: transport flags, load tracking and the events
//! the controller emits for the runtime to act on.

use std::path::PathBuf;
use std::time::Duration;

use crate::audio::RepeatMode;
use crate::config::Settings;
use crate::library::TrackId;

const DEFAULT_RESTART_THRESHOLD: Duration = Duration::from_secs(3);

/// Transport flags. Mutated only by transport commands and the end-of-track
/// transition policy.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackState {
    /// Play intent. Stays set across track changes so the next track starts
    /// as soon as it is ready.
    pub is_playing: bool,
    pub is_shuffle: bool,
    pub repeat_mode: RepeatMode,
}

/// Progress of the load for the current selection, tagged with the
/// generation it belongs to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Pending(u64),
    Ready(u64),
    Failed(u64),
}

/// Coarse transport view: there is no edge from `Empty` straight to
/// `Playing`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transport {
    Empty,
    Paused,
    Playing,
}

/// Side effects requested by the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    /// A new track was selected and must be loaded. Signals about it carry
    /// `generation`.
    TrackChanging {
        index: usize,
        generation: u64,
        path: PathBuf,
    },
    /// Start (or keep) the current source running.
    Resume,
    Pause,
    /// Seek the current source back to zero; `play` says whether it should
    /// run afterwards.
    Restart { play: bool },
    /// A track left the playlist; drop anything cached for it.
    Released { id: TrackId },
    /// The playlist became empty.
    Stopped,
    LoadFailed { index: usize, reason: String },
}

/// Controller knobs taken from the settings.
#[derive(Clone, Debug)]
pub struct PlayerOptions {
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    pub restart_threshold: Duration,
    pub auto_advance_on_failure: bool,
    pub library: crate::config::LibrarySettings,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for PlayerOptions {
    fn from(settings: &Settings) -> Self {
        let playback = &settings.playback;
        Self {
            shuffle: playback.shuffle,
            repeat_mode: playback.repeat_mode.into(),
            restart_threshold: Duration::try_from_secs_f64(playback.restart_threshold_secs.max(0.0))
                .unwrap_or(DEFAULT_RESTART_THRESHOLD),
            auto_advance_on_failure: playback.auto_advance_on_failure,
            library: settings.library.clone(),
        }
    }
}
