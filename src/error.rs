//! Error taxonomy shared by the player core and the runtime.

use std::path::PathBuf;

use thiserror::Error;

use crate::audio::HostError;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The host cannot provide an audio graph. Fatal to every audio feature
    /// for the rest of the session.
    #[error("audio capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A specific track could not be opened or decoded.
    #[error("failed to load {path:?}: {reason}")]
    LoadFailure { path: PathBuf, reason: String },

    /// Best-effort enrichment (waveform, album art) failed.
    #[error("extraction failed: {0}")]
    TransientExtraction(String),

    #[error("no equalizer band at {0} Hz")]
    UnknownBand(u32),

    #[error("signal chain is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
