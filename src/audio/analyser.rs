//! Analysis tap: a pass-through node that keeps a smoothed magnitude
//! spectrum and the latest time-domain window for the visualizer.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::types::AnalysisSnapshot;

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

pub(crate) struct Analyser {
    fft_size: usize,
    smoothing: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    ring: Vec<f32>,
    write: usize,
    smoothed: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Analyser {
    pub(crate) fn new(fft_size: usize, smoothing: f32) -> Self {
        let fft_size = fft_size.max(32).next_power_of_two();
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        // Blackman window
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / fft_size as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            fft,
            window,
            ring: vec![0.0; fft_size],
            write: 0,
            smoothed: vec![0.0; fft_size / 2],
            buffer: vec![Complex::default(); fft_size],
        }
    }

    /// Record one frame (down-mixed to mono).
    #[inline]
    pub(crate) fn push(&mut self, [l, r]: [f32; 2]) {
        self.ring[self.write] = 0.5 * (l + r);
        self.write = (self.write + 1) % self.fft_size;
    }

    /// Recompute the smoothed spectrum from the current window. Called by
    /// the graph once per render block.
    pub(crate) fn analyse(&mut self) {
        for i in 0..self.fft_size {
            let sample = self.ring[(self.write + i) % self.fft_size];
            self.buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (prev, bin) in self.smoothed.iter_mut().zip(&self.buffer) {
            let magnitude = bin.norm() * scale;
            let next = tau * *prev + (1.0 - tau) * magnitude;
            *prev = if next.is_finite() { next } else { 0.0 };
        }
    }

    pub(crate) fn snapshot(&self) -> AnalysisSnapshot {
        let range = MAX_DECIBELS - MIN_DECIBELS;
        let frequency = self
            .smoothed
            .iter()
            .map(|&m| {
                let db = if m > 0.0 { 20.0 * m.log10() } else { MIN_DECIBELS };
                (255.0 * (db - MIN_DECIBELS) / range).clamp(0.0, 255.0) as u8
            })
            .collect();

        let waveform = (0..self.fft_size)
            .map(|i| {
                let s = self.ring[(self.write + i) % self.fft_size];
                (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8
            })
            .collect();

        AnalysisSnapshot {
            frequency,
            waveform,
        }
    }
}
