use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{Decoder, Source};

use crate::error::{PlayerError, Result};

/// Number of points in a track's waveform summary.
pub const WAVEFORM_BUCKETS: usize = 200;

/// Mean absolute amplitude of the first channel in `buckets` equal blocks.
///
/// Trailing samples that do not fill a whole block are ignored. Inputs
/// shorter than `buckets` samples produce an empty summary.
pub fn summarize(first_channel: &[f32], buckets: usize) -> Vec<f32> {
    if buckets == 0 {
        return Vec::new();
    }
    let block = first_channel.len() / buckets;
    if block == 0 {
        return Vec::new();
    }
    first_channel
        .chunks_exact(block)
        .take(buckets)
        .map(|chunk| chunk.iter().map(|s| s.abs()).sum::<f32>() / block as f32)
        .collect()
}

/// Decode the whole file and summarize its first channel.
pub fn extract_waveform(path: &Path, buckets: usize) -> Result<Vec<f32>> {
    let file = File::open(path)?;
    let decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| PlayerError::TransientExtraction(e.to_string()))?;

    let channels = usize::from(decoder.channels().max(1));
    let first: Vec<f32> = decoder.step_by(channels).collect();
    if first.is_empty() {
        return Err(PlayerError::TransientExtraction(format!(
            "no samples decoded from {}",
            path.display()
        )));
    }
    Ok(summarize(&first, buckets))
}
