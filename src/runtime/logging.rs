use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{self, LoggingSettings};
use crate::error::{PlayerError, Result};

/// Environment variable holding a filter that overrides `logging.level`.
pub const LOG_ENV: &str = "SPATIAL_PLAYER_LOG";

/// Pick the log file: configured path, else the XDG state dir, else the
/// system temp dir.
pub fn log_path(settings: &LoggingSettings) -> PathBuf {
    settings.file.clone().unwrap_or_else(|| {
        config::default_state_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("spatial-player.log")
    })
}

/// Build the filter from `SPATIAL_PLAYER_LOG`, then the configured level.
pub fn filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Output goes to a file without colours;
/// stdout belongs to the TUI.
pub fn init(settings: &LoggingSettings) -> Result<PathBuf> {
    let path = log_path(settings);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = File::options().create(true).append(true).open(&path)?;

    tracing_subscriber::registry()
        .with(filter(settings))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| PlayerError::Logging(e.to_string()))?;
    Ok(path)
}
