//! Audio-related small types and handles.
//!
//! This module defines common enums and type aliases shared by the signal
//! chain, the render graph and the playback controller.

use rodio::Source;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Stop on the last track instead of wrapping.
    #[default]
    Off,
    /// Restart the current track when it ends.
    One,
    /// Wrap around to the first track after the last one.
    All,
}

/// Filter response of a biquad stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterKind {
    LowShelf,
    HighShelf,
    Peaking,
}

/// Decoded audio feeding the head of the graph.
pub type SourceHandle = Box<dyn Source + Send>;

/// Data read from the analysis tap for the visualizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSnapshot {
    /// Smoothed magnitude per frequency bin, mapped to `0..=255`.
    pub frequency: Vec<u8>,
    /// Most recent time-domain samples, `128` is silence.
    pub waveform: Vec<u8>,
}

impl AnalysisSnapshot {
    #[cfg(test)]
    pub fn bin_count(&self) -> usize {
        self.frequency.len()
    }
}

/// A stereo impulse response for the convolver.
#[derive(Debug, Clone, Default)]
pub struct ImpulseResponse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl ImpulseResponse {
    pub fn len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
