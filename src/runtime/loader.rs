//! Background track loading.
//!
//! Each request runs on a short-lived thread that opens the decoder and
//! probes the duration, then reports back through the signal channel. Art
//! and waveform extraction follow on the same thread and are best-effort;
//! a load superseded by a newer request stops before its next step.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryIter};
use std::thread;
use std::time::Duration;

use rodio::{Decoder, Source};
use tracing::{debug, warn};

use crate::audio::SourceHandle;
use crate::error::PlayerError;
use crate::library::{self, WAVEFORM_BUCKETS};

/// Results delivered back to the control thread, tagged with the load
/// generation they belong to.
pub enum Signal {
    Ready {
        generation: u64,
        duration: Option<Duration>,
        source: SourceHandle,
    },
    LoadFailed {
        generation: u64,
        reason: String,
    },
    AlbumArt {
        generation: u64,
        art: Vec<u8>,
    },
    Waveform {
        generation: u64,
        summary: Vec<f32>,
    },
}

pub struct Loader {
    tx: Sender<Signal>,
    rx: Receiver<Signal>,
    // Generation of the most recent request.
    latest: Arc<AtomicU64>,
}

impl Loader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start loading `path` for `generation`. Earlier requests still in
    /// flight give up at their next step.
    pub fn request(&self, generation: u64, path: PathBuf) {
        self.latest.store(generation, Ordering::Release);
        let tx = self.tx.clone();
        let current = Current {
            generation,
            latest: Arc::clone(&self.latest),
        };
        let spawned = thread::Builder::new()
            .name("track-loader".into())
            .spawn(move || {
                if current.superseded() {
                    debug!(generation, "load superseded before opening");
                    return;
                }
                let signal = match open(&path) {
                    Ok((source, duration)) => Signal::Ready {
                        generation,
                        duration,
                        source,
                    },
                    Err(e) => Signal::LoadFailed {
                        generation,
                        reason: e.to_string(),
                    },
                };
                let loaded = matches!(signal, Signal::Ready { .. });
                // A closed channel means shutdown; the decoder drops with it.
                if tx.send(signal).is_err() || !loaded {
                    return;
                }
                enrich(&current, &path, &tx);
            });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn loader thread");
            let _ = self.tx.send(Signal::LoadFailed {
                generation,
                reason: e.to_string(),
            });
        }
    }

    /// Signals delivered so far, without blocking.
    pub fn try_iter(&self) -> TryIter<'_, Signal> {
        self.rx.try_iter()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

fn open(path: &Path) -> Result<(SourceHandle, Option<Duration>), PlayerError> {
    let failure = |reason: String| PlayerError::LoadFailure {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| failure(e.to_string()))?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| failure(e.to_string()))?;
    let duration = library::probe_duration(path).or_else(|| decoder.total_duration());
    Ok((Box::new(decoder), duration))
}

/// A request's generation together with the loader's latest one.
struct Current {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl Current {
    fn superseded(&self) -> bool {
        self.latest.load(Ordering::Acquire) != self.generation
    }
}

/// Best-effort extras for a loaded track. Failures are logged and dropped.
fn enrich(current: &Current, path: &Path, tx: &Sender<Signal>) {
    let generation = current.generation;
    if current.superseded() {
        debug!(generation, "load superseded, skipping album art");
        return;
    }
    match fs::read(path) {
        Ok(bytes) => {
            if let Some(art) = library::extract_album_art(&bytes) {
                let _ = tx.send(Signal::AlbumArt { generation, art });
            }
        }
        Err(e) => debug!(error = %e, path = %path.display(), "album art read failed"),
    }

    if current.superseded() {
        debug!(generation, "load superseded, skipping waveform");
        return;
    }
    match library::extract_waveform(path, WAVEFORM_BUCKETS) {
        Ok(summary) => {
            let _ = tx.send(Signal::Waveform {
                generation,
                summary,
            });
        }
        Err(e) => debug!(error = %e, path = %path.display(), "waveform extraction failed"),
    }
}
