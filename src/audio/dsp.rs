//! Per-sample processing primitives used by the render graph.

use std::f32::consts::{FRAC_PI_2, PI};

use super::types::FilterKind;

/// Shelf slope used for the EQ edge bands and the bass boost (S = 1).
const SHELF_SLOPE: f32 = 1.0;

/// A stereo biquad section (RBJ cookbook coefficients, direct form I).
#[derive(Debug, Clone)]
pub(crate) struct Biquad {
    kind: FilterKind,
    sample_rate: f32,
    frequency: f32,
    q: f32,
    gain_db: f32,

    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,

    // [x1, x2, y1, y2] per channel
    state: [[f32; 4]; 2],
}

impl Biquad {
    pub(crate) fn new(kind: FilterKind, sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        let mut filter = Self {
            kind,
            sample_rate,
            frequency,
            q: q.max(1e-3),
            gain_db,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            state: [[0.0; 4]; 2],
        };
        filter.update_coefficients();
        filter
    }

    pub(crate) fn set_gain_db(&mut self, gain_db: f32) {
        self.gain_db = gain_db;
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        if self.sample_rate < 1.0 {
            return;
        }

        let a = 10.0_f32.powf(self.gain_db / 40.0);
        // Keep away from Nyquist; coefficients blow up past it.
        let freq = self.frequency.clamp(1.0, self.sample_rate * 0.45);
        let omega = 2.0 * PI * freq / self.sample_rate;
        let (sin_w, cos_w) = omega.sin_cos();

        let (b0, b1, b2, a0, a1, a2) = match self.kind {
            FilterKind::Peaking => {
                let alpha = sin_w / (2.0 * self.q);
                (
                    1.0 + alpha * a,
                    -2.0 * cos_w,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w,
                    1.0 - alpha / a,
                )
            }
            FilterKind::LowShelf => {
                let alpha = sin_w / 2.0 * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt();
                let beta = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w + beta),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w),
                    a * ((a + 1.0) - (a - 1.0) * cos_w - beta),
                    (a + 1.0) + (a - 1.0) * cos_w + beta,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w),
                    (a + 1.0) + (a - 1.0) * cos_w - beta,
                )
            }
            FilterKind::HighShelf => {
                let alpha = sin_w / 2.0 * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt();
                let beta = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w + beta),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w),
                    a * ((a + 1.0) + (a - 1.0) * cos_w - beta),
                    (a + 1.0) - (a - 1.0) * cos_w + beta,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w),
                    (a + 1.0) - (a - 1.0) * cos_w - beta,
                )
            }
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    #[inline]
    pub(crate) fn process(&mut self, frame: [f32; 2]) -> [f32; 2] {
        let mut out = [0.0; 2];
        for (ch, &x) in frame.iter().enumerate() {
            let [x1, x2, y1, y2] = self.state[ch];
            let mut y = self.b0 * x + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
            // flush denormals
            if y.abs() < 1e-15 {
                y = 0.0;
            }
            self.state[ch] = [x, x1, y, y1];
            out[ch] = y;
        }
        out
    }
}

/// Equal-power stereo panning of a stereo frame.
///
/// At `pan == 0.0` the frame passes through untouched; at the extremes one
/// side is folded into the other.
#[inline]
pub(crate) fn pan_frame(pan: f32, [l, r]: [f32; 2]) -> [f32; 2] {
    let pan = pan.clamp(-1.0, 1.0);
    let x = if pan <= 0.0 { pan + 1.0 } else { pan };
    let gain_l = (x * FRAC_PI_2).cos();
    let gain_r = (x * FRAC_PI_2).sin();

    if pan <= 0.0 {
        [l + r * gain_l, r * gain_r]
    } else {
        [l * gain_l, r + l * gain_r]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn rms_after(filter: &mut Biquad, input: &[f32]) -> f32 {
        let out: Vec<f32> = input.iter().map(|&x| filter.process([x, x])[0]).collect();
        // skip the transient
        let tail = &out[out.len() / 2..];
        (tail.iter().map(|s| s * s).sum::<f32>() / tail.len() as f32).sqrt()
    }

    #[test]
    fn zero_gain_filters_are_transparent() {
        for kind in [FilterKind::LowShelf, FilterKind::HighShelf, FilterKind::Peaking] {
            let mut f = Biquad::new(kind, 44_100.0, 1_000.0, 1.0, 0.0);
            for x in [0.5_f32, -0.25, 1.0, 0.0] {
                let [l, r] = f.process([x, -x]);
                assert!((l - x).abs() < 1e-5, "{kind:?} changed the left channel");
                assert!((r + x).abs() < 1e-5, "{kind:?} changed the right channel");
            }
        }
    }

    #[test]
    fn low_shelf_boosts_below_cutoff_only() {
        let sr = 44_100.0;
        let low = sine(50.0, sr, 8_192);
        let high = sine(8_000.0, sr, 8_192);

        let mut f = Biquad::new(FilterKind::LowShelf, sr, 200.0, 1.0, 12.0);
        let low_rms = rms_after(&mut f, &low);
        let mut f = Biquad::new(FilterKind::LowShelf, sr, 200.0, 1.0, 12.0);
        let high_rms = rms_after(&mut f, &high);

        let unity = std::f32::consts::FRAC_1_SQRT_2;
        assert!(low_rms > unity * 3.0, "low band barely boosted: {low_rms}");
        assert!((high_rms - unity).abs() < 0.05, "high band moved: {high_rms}");
    }

    #[test]
    fn peaking_cut_attenuates_centre_frequency() {
        let sr = 44_100.0;
        let mut f = Biquad::new(FilterKind::Peaking, sr, 1_000.0, 1.0, -12.0);
        let rms = rms_after(&mut f, &sine(1_000.0, sr, 8_192));
        assert!(rms < 0.25, "centre frequency not cut: {rms}");
    }

    #[test]
    fn pan_centre_is_identity_and_extremes_fold() {
        assert_eq!(pan_frame(0.0, [0.3, -0.6]), [0.3, -0.6]);

        let [l, r] = pan_frame(-1.0, [0.5, 0.5]);
        assert!((l - 1.0).abs() < 1e-6);
        assert!(r.abs() < 1e-6);

        let [l, r] = pan_frame(1.0, [0.5, 0.5]);
        assert!(l.abs() < 1e-6);
        assert!((r - 1.0).abs() < 1e-6);
    }
}
