//! The playlist and transport controller.
//!
//! `Player` owns the ordered track list, the cursor, transport flags and
//! the load generation. Every selection bumps the generation; ready, ended
//! and failure signals carry the generation they belong to and are dropped
//! when it is no longer current.

use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::model::{LoadState, PlaybackState, PlayerEvent, PlayerOptions, Transport};
use crate::audio::RepeatMode;
use crate::library::{Track, TrackId, collect_audio_files};

pub struct Player {
    tracks: Vec<Track>,
    current: Option<usize>,
    state: PlaybackState,
    load: LoadState,
    generation: u64,
    next_id: u64,
    position: Duration,
    waveform: Option<Vec<f32>>,
    consecutive_failures: usize,
    options: PlayerOptions,
    events: Sender<PlayerEvent>,
}

impl Player {
    pub fn new(options: PlayerOptions, events: Sender<PlayerEvent>) -> Self {
        let state = PlaybackState {
            is_playing: false,
            is_shuffle: options.shuffle,
            repeat_mode: options.repeat_mode,
        };
        Self {
            tracks: Vec::new(),
            current: None,
            state,
            load: LoadState::Idle,
            generation: 0,
            next_id: 0,
            position: Duration::ZERO,
            waveform: None,
            consecutive_failures: 0,
            options,
            events,
        }
    }

    fn emit(&self, event: PlayerEvent) {
        // The receiver only goes away during shutdown.
        let _ = self.events.send(event);
    }

    /// Append every audio file found in `inputs` (directories are expanded).
    /// Selects the first track, paused, when nothing was selected yet.
    ///
    /// Returns the number of tracks added.
    pub fn add_tracks<P: AsRef<Path>>(&mut self, inputs: &[P]) -> usize {
        let files = collect_audio_files(inputs, &self.options.library);
        let added = files.len();
        for path in files {
            let id = TrackId(self.next_id);
            self.next_id += 1;
            self.tracks.push(Track::new(id, path));
        }
        if added > 0 {
            info!(added, total = self.tracks.len(), "tracks added");
        }
        if self.current.is_none() && !self.tracks.is_empty() {
            self.select_track(0);
        }
        added
    }

    /// Remove the track at `index`. Out-of-range indices are ignored.
    pub fn remove_track(&mut self, index: usize) {
        if index >= self.tracks.len() {
            return;
        }
        let removed = self.tracks.remove(index);
        self.emit(PlayerEvent::Released { id: removed.id });

        if self.tracks.is_empty() {
            self.reset();
            return;
        }
        match self.current {
            Some(cur) if cur == index => self.select_track(index.min(self.tracks.len() - 1)),
            Some(cur) if index < cur => self.current = Some(cur - 1),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.current = None;
        self.state.is_playing = false;
        // Bump so in-flight signals for the removed track go stale.
        self.generation += 1;
        self.load = LoadState::Idle;
        self.position = Duration::ZERO;
        self.waveform = None;
        self.consecutive_failures = 0;
        self.emit(PlayerEvent::Stopped);
    }

    /// Make `index` current and request its load. Out-of-range indices are
    /// ignored.
    pub fn select_track(&mut self, index: usize) {
        let Some(track) = self.tracks.get(index) else {
            return;
        };
        let path = track.path.clone();
        self.current = Some(index);
        self.generation += 1;
        self.load = LoadState::Pending(self.generation);
        self.position = Duration::ZERO;
        self.waveform = None;
        debug!(index, generation = self.generation, "track selected");
        self.emit(PlayerEvent::TrackChanging {
            index,
            generation: self.generation,
            path,
        });
    }

    /// Set play intent. Applied now when the track is ready, otherwise
    /// replayed once it becomes ready.
    pub fn play(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.state.is_playing = true;
        if matches!(self.load, LoadState::Ready(_)) {
            self.emit(PlayerEvent::Resume);
        }
    }

    pub fn pause(&mut self) {
        if self.current.is_none() {
            return;
        }
        self.state.is_playing = false;
        self.emit(PlayerEvent::Pause);
    }

    pub fn toggle(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Advance according to shuffle and repeat. When the resolved index is
    /// the current one and repeat-all is off, playback stops in place.
    pub fn next(&mut self) {
        let Some(cur) = self.current else {
            return;
        };
        let len = self.tracks.len();
        let target = if self.state.is_shuffle {
            rand::random_range(0..len)
        } else if cur + 1 < len {
            cur + 1
        } else if self.state.repeat_mode == RepeatMode::All {
            0
        } else {
            cur
        };

        if target != cur || self.state.repeat_mode == RepeatMode::All {
            self.select_track(target);
        } else {
            self.state.is_playing = false;
            self.emit(PlayerEvent::Pause);
        }
    }

    /// Restart the current track when past the restart threshold, otherwise
    /// step back one track (no wrap).
    pub fn previous(&mut self) {
        let Some(cur) = self.current else {
            return;
        };
        if self.position > self.options.restart_threshold {
            self.position = Duration::ZERO;
            self.emit(PlayerEvent::Restart {
                play: self.state.is_playing,
            });
        } else if cur > 0 {
            self.select_track(cur - 1);
        }
    }

    /// The current source ran out.
    pub fn handle_track_ended(&mut self, generation: u64) {
        if self.load != LoadState::Ready(generation) {
            debug!(generation, current = self.generation, "stale end-of-track ignored");
            return;
        }
        if self.state.repeat_mode == RepeatMode::One {
            self.position = Duration::ZERO;
            self.state.is_playing = true;
            self.emit(PlayerEvent::Restart { play: true });
        } else {
            self.next();
        }
    }

    /// The load for `generation` finished. Returns `false` when the signal
    /// is stale and its source should be dropped.
    pub fn track_ready(&mut self, generation: u64, duration: Option<Duration>) -> bool {
        if self.load != LoadState::Pending(generation) {
            debug!(generation, current = self.generation, "stale ready signal ignored");
            return false;
        }
        self.load = LoadState::Ready(generation);
        self.consecutive_failures = 0;
        if let Some(track) = self.current.and_then(|i| self.tracks.get_mut(i)) {
            if track.duration.is_none() {
                track.duration = duration;
            }
        }
        if self.state.is_playing {
            self.emit(PlayerEvent::Resume);
        }
        true
    }

    /// The load for `generation` failed. The playlist is kept; with
    /// auto-advance on and play intent set, the next track is tried until
    /// every track has failed in a row.
    pub fn load_failed(&mut self, generation: u64, reason: impl Into<String>) {
        if self.load != LoadState::Pending(generation) {
            debug!(generation, current = self.generation, "stale load failure ignored");
            return;
        }
        let Some(index) = self.current else {
            return;
        };
        let reason = reason.into();
        warn!(index, %reason, "track failed to load");
        self.load = LoadState::Failed(generation);
        self.consecutive_failures += 1;
        self.emit(PlayerEvent::LoadFailed { index, reason });

        if !(self.options.auto_advance_on_failure && self.state.is_playing) {
            return;
        }
        if self.consecutive_failures >= self.tracks.len() {
            warn!(failures = self.consecutive_failures, "every track failed to load, stopping");
            self.state.is_playing = false;
            self.emit(PlayerEvent::Pause);
        } else {
            self.next();
        }
    }

    /// Feed the playback clock for the current load.
    pub fn update_position(&mut self, generation: u64, position: Duration) {
        if self.load == LoadState::Ready(generation) {
            self.position = position;
        }
    }

    /// Attach cover art read after the load of `generation`.
    pub fn set_album_art(&mut self, generation: u64, art: Vec<u8>) {
        if generation != self.generation {
            return;
        }
        if let Some(track) = self.current.and_then(|i| self.tracks.get_mut(i)) {
            track.album_art = Some(art);
        }
    }

    /// Attach the waveform summary computed for `generation`.
    pub fn set_waveform(&mut self, generation: u64, summary: Vec<f32>) {
        if generation == self.generation && self.current.is_some() {
            self.waveform = Some(summary);
        }
    }

    pub fn set_shuffle(&mut self, on: bool) {
        self.state.is_shuffle = on;
    }

    pub fn toggle_shuffle(&mut self) {
        self.set_shuffle(!self.state.is_shuffle);
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.state.repeat_mode = mode;
    }

    /// Cycle `Off -> All -> One -> Off`.
    pub fn cycle_repeat_mode(&mut self) {
        self.set_repeat_mode(match self.state.repeat_mode {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        });
    }

    /// Re-request the load of the current track, e.g. when an in-place
    /// restart is not possible.
    pub fn reload_current(&mut self) {
        if let Some(cur) = self.current {
            self.select_track(cur);
        }
    }

    pub fn transport(&self) -> Transport {
        if self.tracks.is_empty() {
            Transport::Empty
        } else if self.state.is_playing {
            Transport::Playing
        } else {
            Transport::Paused
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn load_state(&self) -> LoadState {
        self.load
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn waveform(&self) -> Option<&[f32]> {
        self.waveform.as_deref()
    }
}
