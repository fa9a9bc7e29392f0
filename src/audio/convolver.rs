//! Uniformly partitioned FFT convolution (overlap-save with a
//! frequency-domain delay line).
//!
//! The impulse response is cut into partitions of `partition` frames, each
//! transformed once when the kernel is loaded. Input is processed in blocks
//! of the same size, so the wet path lags the input by one partition.

use std::collections::VecDeque;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::types::ImpulseResponse;

pub(crate) const DEFAULT_PARTITION: usize = 1024;

pub(crate) struct Convolver {
    partition: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    channels: [ChannelState; 2],
    pos: usize,
    scratch: Vec<Complex<f32>>,
}

#[derive(Default)]
struct ChannelState {
    kernel: Vec<Vec<Complex<f32>>>,
    delay_line: VecDeque<Vec<Complex<f32>>>,
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl Convolver {
    pub(crate) fn new(partition: usize) -> Self {
        let partition = partition.max(1);
        let size = partition * 2;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());

        let mut conv = Self {
            partition,
            fft,
            ifft,
            channels: [ChannelState::default(), ChannelState::default()],
            pos: 0,
            scratch: vec![Complex::default(); scratch_len],
        };
        for ch in &mut conv.channels {
            ch.window = vec![0.0; size];
            ch.input = vec![0.0; partition];
            ch.output = vec![0.0; partition];
        }
        conv
    }

    #[cfg(test)]
    pub(crate) fn latency(&self) -> usize {
        self.partition
    }

    #[cfg(test)]
    pub(crate) fn has_kernel(&self) -> bool {
        self.channels.iter().any(|c| !c.kernel.is_empty())
    }

    /// Replace the kernel and clear any signal still in flight.
    pub(crate) fn set_impulse(&mut self, impulse: &ImpulseResponse) {
        let size = self.partition * 2;
        let taps = [&impulse.left, &impulse.right];

        for (ch, ir) in self.channels.iter_mut().zip(taps) {
            ch.kernel = ir
                .chunks(self.partition)
                .map(|chunk| {
                    let mut spectrum = vec![Complex::default(); size];
                    for (slot, &tap) in spectrum.iter_mut().zip(chunk) {
                        slot.re = tap;
                    }
                    self.fft.process_with_scratch(&mut spectrum, &mut self.scratch);
                    spectrum
                })
                .collect();
            ch.delay_line = (0..ch.kernel.len())
                .map(|_| vec![Complex::default(); size])
                .collect();
            ch.window.fill(0.0);
            ch.input.fill(0.0);
            ch.output.fill(0.0);
        }
        self.pos = 0;
    }

    #[inline]
    pub(crate) fn process(&mut self, frame: [f32; 2]) -> [f32; 2] {
        let mut out = [0.0; 2];
        for (i, ch) in self.channels.iter_mut().enumerate() {
            ch.input[self.pos] = frame[i];
            out[i] = ch.output[self.pos];
        }

        self.pos += 1;
        if self.pos == self.partition {
            self.pos = 0;
            for i in 0..2 {
                self.run_partition(i);
            }
        }
        out
    }

    fn run_partition(&mut self, index: usize) {
        let p = self.partition;
        let size = p * 2;
        let ch = &mut self.channels[index];

        if ch.kernel.is_empty() {
            ch.output.fill(0.0);
            return;
        }

        // Slide the overlap-save window and append the fresh block.
        ch.window.copy_within(p.., 0);
        ch.window[p..].copy_from_slice(&ch.input);

        let mut spectrum = ch
            .delay_line
            .pop_back()
            .unwrap_or_else(|| vec![Complex::default(); size]);
        for (slot, &x) in spectrum.iter_mut().zip(&ch.window) {
            *slot = Complex::new(x, 0.0);
        }
        self.fft.process_with_scratch(&mut spectrum, &mut self.scratch);
        ch.delay_line.push_front(spectrum);

        let mut acc = vec![Complex::default(); size];
        for (x, h) in ch.delay_line.iter().zip(&ch.kernel) {
            for ((a, &xv), &hv) in acc.iter_mut().zip(x).zip(h) {
                *a += xv * hv;
            }
        }
        self.ifft.process_with_scratch(&mut acc, &mut self.scratch);

        let norm = 1.0 / size as f32;
        for (o, c) in ch.output.iter_mut().zip(&acc[p..]) {
            *o = c.re * norm;
        }
    }
}
