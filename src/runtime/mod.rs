use std::env;
use std::path::PathBuf;

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::audio::{AudioHost, HostError, SoftwareHost};
use crate::config::AudioSettings;

mod event_loop;
mod loader;
mod logging;
mod session;
mod settings;

pub use event_loop::EventLoopState;
pub use session::{Command, Session};


fn open_device(audio: &AudioSettings) -> Result<Box<dyn AudioHost>, HostError> {
    Ok(Box::new(SoftwareHost::open_default(audio.sample_rate)?))
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (settings, config_warning) = settings::load_settings();

    // Logging is optional; the player runs without it.
    match logging::init(&settings.logging) {
        Ok(path) => info!(log = %path.display(), "spatial-player starting"),
        Err(e) => eprintln!("spatial-player: logging disabled: {e}"),
    }
    if let Some(msg) = config_warning {
        warn!("{msg}");
    }

    let mut inputs: Vec<PathBuf> = env::args_os().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        inputs.push(env::current_dir()?);
    }

    let mut session = Session::new(&settings, Box::new(open_device));
    session.apply(Command::Add(inputs));

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result: Result<(), Box<dyn std::error::Error>> = (|| {
        let mut state = EventLoopState::new();
        event_loop::run(&mut terminal, &mut session, &mut state)
    })();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("spatial-player stopped");
    run_result
}
