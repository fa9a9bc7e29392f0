//! Library helpers: turning paths into playlist entries and enriching them.
//!
//! Ingestion (`ingest`) is synchronous and cheap. Metadata probing, album
//! art and waveform extraction touch file contents and are run off the
//! control thread by the runtime loader.

mod art;
mod ingest;
mod metadata;
mod model;
mod waveform;

pub use art::extract_album_art;
pub use ingest::collect_audio_files;
pub use metadata::probe_duration;
pub use model::*;
pub use waveform::{WAVEFORM_BUCKETS, extract_waveform};
