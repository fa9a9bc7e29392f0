use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};

use super::session::{Command, Session};
use crate::app::Player;
use crate::ui;

pub const VOLUME_STEP: f32 = 0.05;
pub const PAN_STEP: f32 = 0.1;
pub const REVERB_STEP: f32 = 0.05;
pub const GAIN_STEP_DB: f32 = 1.0;
/// EQ band gains stay within `±EQ_LIMIT_DB`.
pub const EQ_LIMIT_DB: f32 = 12.0;
pub const BASS_LIMIT_DB: f32 = 15.0;

/// View state tracked by the runtime event loop across iterations.
pub struct EventLoopState {
    /// Cursor in the playlist.
    pub selected: usize,
    /// Index of the EQ band the `[`/`]` keys adjust.
    pub eq_focus: usize,
    /// Whether the cursor jumps to the playing track when it changes.
    pub follow_playback: bool,
    /// Internal two-key prefix state used for `gg` handling.
    pub pending_gg: bool,
    last_current: Option<usize>,
}

impl EventLoopState {
    pub fn new() -> Self {
        Self {
            selected: 0,
            eq_focus: 0,
            follow_playback: true,
            pending_gg: false,
            last_current: None,
        }
    }

    /// Keep the cursor inside the playlist and, in follow mode, on the
    /// current track whenever that changes.
    pub fn sync(&mut self, player: &Player) {
        let current = player.current_index();
        if self.follow_playback && current != self.last_current {
            if let Some(i) = current {
                self.selected = i;
            }
        }
        self.last_current = current;
        let len = player.tracks().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}

impl Default for EventLoopState {
    fn default() -> Self {
        Self::new()
    }
}

/// Main terminal event loop: settles the session, draws and handles input.
/// Returns `Ok(())` when shutdown is requested.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    session: &mut Session,
    state: &mut EventLoopState,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        session.tick();
        state.sync(session.player());

        terminal.draw(|f| ui::draw(f, session, state))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(command) = command_for_key(key, session, state) {
                    if session.apply(command) {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Translate a key press into a session command. Cursor movement only
/// touches `state` and yields `None`.
pub fn command_for_key(key: KeyEvent, session: &Session, state: &mut EventLoopState) -> Option<Command> {
    let player = session.player();
    let chain = session.chain();
    let len = player.tracks().len();

    if key.code != KeyCode::Char('g') {
        state.pending_gg = false;
    }

    match key.code {
        KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Char('j') | KeyCode::Down => {
            state.follow_playback = false;
            if state.selected + 1 < len {
                state.selected += 1;
            }
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            state.follow_playback = false;
            state.selected = state.selected.saturating_sub(1);
            None
        }
        KeyCode::Char('g') => {
            if state.pending_gg {
                state.pending_gg = false;
                state.follow_playback = false;
                state.selected = 0;
            } else {
                state.pending_gg = true;
            }
            None
        }
        KeyCode::Char('G') => {
            state.follow_playback = false;
            state.selected = len.saturating_sub(1);
            None
        }
        KeyCode::Char('f') => {
            state.follow_playback = true;
            if let Some(i) = player.current_index() {
                state.selected = i;
            }
            None
        }
        KeyCode::Enter if len > 0 => {
            state.follow_playback = true;
            Some(Command::PlayIndex(state.selected))
        }
        KeyCode::Char(' ') | KeyCode::Char('p') => Some(Command::TogglePlay),
        KeyCode::Char('l') => {
            state.follow_playback = true;
            Some(Command::Next)
        }
        KeyCode::Char('h') => {
            state.follow_playback = true;
            Some(Command::Previous)
        }
        KeyCode::Char('d') | KeyCode::Delete if len > 0 => Some(Command::Remove(state.selected)),
        KeyCode::Char('s') => Some(Command::ToggleShuffle),
        KeyCode::Char('r') => Some(Command::CycleRepeat),
        KeyCode::Char('m') => Some(Command::ToggleMute),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            Some(Command::SetVolume(chain.unmuted_volume() + VOLUME_STEP))
        }
        KeyCode::Char('-') => Some(Command::SetVolume(chain.unmuted_volume() - VOLUME_STEP)),
        KeyCode::Char(',') => Some(Command::SetPan(chain.pan_angle() - PAN_STEP)),
        KeyCode::Char('.') => Some(Command::SetPan(chain.pan_angle() + PAN_STEP)),
        KeyCode::Char('v') => Some(Command::SetReverbMix(chain.reverb_mix() - REVERB_STEP)),
        KeyCode::Char('V') => Some(Command::SetReverbMix(chain.reverb_mix() + REVERB_STEP)),
        KeyCode::Char('b') => Some(Command::SetBassBoost(
            (chain.bass_boost() - GAIN_STEP_DB).clamp(0.0, BASS_LIMIT_DB),
        )),
        KeyCode::Char('B') => Some(Command::SetBassBoost(
            (chain.bass_boost() + GAIN_STEP_DB).clamp(0.0, BASS_LIMIT_DB),
        )),
        KeyCode::Tab => {
            let bands = chain.eq_gains().len().max(1);
            state.eq_focus = (state.eq_focus + 1) % bands;
            None
        }
        KeyCode::BackTab => {
            let bands = chain.eq_gains().len().max(1);
            state.eq_focus = (state.eq_focus + bands - 1) % bands;
            None
        }
        KeyCode::Char('[') | KeyCode::Char(']') => {
            let &(band, gain) = chain.eq_gains().get(state.eq_focus)?;
            let step = if key.code == KeyCode::Char(']') {
                GAIN_STEP_DB
            } else {
                -GAIN_STEP_DB
            };
            Some(Command::SetEqGain {
                band,
                gain_db: (gain + step).clamp(-EQ_LIMIT_DB, EQ_LIMIT_DB),
            })
        }
        _ => None,
    }
}
