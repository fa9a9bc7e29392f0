//! The control-thread session: owns the controller and the signal chain and
//! routes commands, controller events and loader signals between them.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::loader::{Loader, Signal};
use crate::app::{Player, PlayerEvent, PlayerOptions};
use crate::audio::{HostOpener, SignalChain};
use crate::config::Settings;
use crate::error::{PlayerError, Result};

/// Everything the front-end can ask for.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    TogglePlay,
    Next,
    Previous,
    /// Select a track and start playing it.
    PlayIndex(usize),
    Remove(usize),
    Add(Vec<PathBuf>),
    ToggleShuffle,
    CycleRepeat,
    SetEqGain { band: u32, gain_db: f32 },
    SetBassBoost(f32),
    SetPan(f32),
    SetReverbMix(f32),
    SetVolume(f32),
    ToggleMute,
    Quit,
}

pub struct Session {
    player: Player,
    chain: SignalChain,
    events: Receiver<PlayerEvent>,
    loader: Loader,
    status: Option<String>,
    // The current source's end was already handed to the controller.
    end_reported: bool,
}

impl Session {
    pub fn new(settings: &Settings, opener: HostOpener) -> Self {
        let (tx, events) = mpsc::channel();
        Self {
            player: Player::new(PlayerOptions::from(settings), tx),
            chain: SignalChain::new(settings.audio.clone(), opener),
            events,
            loader: Loader::new(),
            status: None,
            end_reported: false,
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn chain(&self) -> &SignalChain {
        &self.chain
    }

    /// Last error or notice worth showing to the user.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Apply one command. Returns `true` when the session should end.
    pub fn apply(&mut self, command: Command) -> bool {
        let result = match command {
            Command::Play => {
                self.player.play();
                Ok(())
            }
            Command::Pause => {
                self.player.pause();
                Ok(())
            }
            Command::TogglePlay => {
                self.player.toggle();
                Ok(())
            }
            Command::Next => {
                self.player.next();
                Ok(())
            }
            Command::Previous => {
                self.player.previous();
                Ok(())
            }
            Command::PlayIndex(index) => {
                self.player.select_track(index);
                self.player.play();
                Ok(())
            }
            Command::Remove(index) => {
                self.player.remove_track(index);
                Ok(())
            }
            Command::Add(paths) => {
                let added = self.player.add_tracks(&paths);
                if added == 0 {
                    self.status = Some("no audio files found".to_string());
                }
                Ok(())
            }
            Command::ToggleShuffle => {
                self.player.toggle_shuffle();
                Ok(())
            }
            Command::CycleRepeat => {
                self.player.cycle_repeat_mode();
                Ok(())
            }
            Command::SetEqGain { band, gain_db } => self.chain.set_eq_gain(band, gain_db),
            Command::SetBassBoost(db) => self.chain.set_bass_boost(db),
            Command::SetPan(pan) => self.chain.set_pan_angle(pan),
            Command::SetReverbMix(mix) => self.chain.set_reverb_mix(mix),
            Command::SetVolume(volume) => self.chain.set_master_volume(volume),
            Command::ToggleMute => self.chain.toggle_mute(),
            Command::Quit => {
                info!("quit requested");
                if let Err(e) = self.chain.detach_source() {
                    debug!(error = %e, "detach on quit failed");
                }
                return true;
            }
        };
        if let Err(e) = result {
            self.report(e);
        }
        self.process_events();
        false
    }

    /// Pull loader signals and source status, then settle controller events.
    pub fn tick(&mut self) {
        let signals: Vec<Signal> = self.loader.try_iter().collect();
        for signal in signals {
            self.handle_signal(signal);
            self.process_events();
        }
        self.poll_source();
        self.process_events();
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Ready {
                generation,
                duration,
                source,
            } => {
                if !self.player.track_ready(generation, duration) {
                    return;
                }
                self.end_reported = false;
                match self.chain.attach_source(source) {
                    Ok(()) => self.status = None,
                    Err(e) => self.report(e),
                }
            }
            Signal::LoadFailed { generation, reason } => self.player.load_failed(generation, reason),
            Signal::AlbumArt { generation, art } => self.player.set_album_art(generation, art),
            Signal::Waveform {
                generation,
                summary,
            } => self.player.set_waveform(generation, summary),
        }
    }

    fn poll_source(&mut self) {
        let Some(status) = self.chain.source_status() else {
            return;
        };
        // The attached source always belongs to the current generation:
        // selecting a track detaches the previous one first.
        let generation = self.player.generation();
        self.player.update_position(generation, status.position);
        if !status.ended {
            self.end_reported = false;
        } else if !self.end_reported {
            self.end_reported = true;
            self.player.handle_track_ended(generation);
        }
    }

    fn process_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let result = match event {
                PlayerEvent::TrackChanging {
                    index,
                    generation,
                    path,
                } => {
                    debug!(index, generation, path = %path.display(), "loading track");
                    self.loader.request(generation, path);
                    self.chain.detach_source()
                }
                PlayerEvent::Resume => self.resume(),
                PlayerEvent::Pause => self.set_running(false),
                PlayerEvent::Restart { play } => self.restart(play),
                PlayerEvent::Released { id } => {
                    debug!(?id, "track released");
                    Ok(())
                }
                PlayerEvent::Stopped => {
                    self.status = None;
                    self.chain.detach_source()
                }
                PlayerEvent::LoadFailed { index, reason } => {
                    self.status = Some(format!("could not load track {}: {reason}", index + 1));
                    Ok(())
                }
            };
            if let Err(e) = result {
                self.report(e);
            }
        }
    }

    fn set_running(&mut self, running: bool) -> Result<()> {
        if !self.chain.has_source() {
            return Ok(());
        }
        self.chain.set_running(running)
    }

    fn resume(&mut self) -> Result<()> {
        if !self.chain.has_source() {
            return Ok(());
        }
        // Playing a finished track starts it over.
        if self.chain.source_ended() && !self.rewind() {
            return Ok(());
        }
        self.chain.set_running(true)
    }

    fn restart(&mut self, play: bool) -> Result<()> {
        if !self.chain.has_source() || !self.rewind() {
            return Ok(());
        }
        self.chain.set_running(play)
    }

    /// Seek the source back to zero, or reload the track when the decoder
    /// cannot seek. Returns whether the source was rewound in place.
    fn rewind(&mut self) -> bool {
        match self.chain.seek(Duration::ZERO) {
            Ok(()) => {
                self.end_reported = false;
                true
            }
            Err(e) => {
                debug!(error = %e, "in-place restart failed, reloading");
                self.player.reload_current();
                false
            }
        }
    }

    fn report(&mut self, error: PlayerError) {
        // The chain already logged losing the audio capability.
        if !matches!(error, PlayerError::CapabilityUnavailable(_)) {
            warn!(error = %error, "audio operation failed");
        }
        self.status = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests;
