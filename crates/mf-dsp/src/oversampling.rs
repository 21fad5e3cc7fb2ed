//! Windowed-sinc oversampling for non-linear stages
//!
//! Whole-buffer (offline) up/down sampling. The filter is a Blackman-windowed
//! sinc with its cutoff at the original Nyquist. Convolution is centered on
//! the middle tap, so an up/down round trip has no latency.

use std::f64::consts::PI;

use mf_core::Sample;

/// Oversampling factor used by the waveshaper
pub const OVERSAMPLE_FACTOR: usize = 4;

/// Filter half-length in original-rate samples
const HALF_TAPS_PER_PHASE: usize = 8;

/// Offline oversampler
#[derive(Debug, Clone)]
pub struct Oversampler {
    factor: usize,
    /// Lowpass taps with unity DC gain
    taps: Vec<f64>,
}

impl Oversampler {
    pub fn new(factor: usize) -> Self {
        let factor = factor.max(1);
        let len = 2 * HALF_TAPS_PER_PHASE * factor + 1;
        let center = (len - 1) as f64 / 2.0;
        let span = (len - 1) as f64;

        let mut taps: Vec<f64> = (0..len)
            .map(|i| {
                let n = i as f64 - center;
                let sinc = if n.abs() < 1e-9 {
                    1.0
                } else {
                    let x = PI * n / factor as f64;
                    x.sin() / x
                };
                let window = 0.42 - 0.5 * (2.0 * PI * i as f64 / span).cos()
                    + 0.08 * (4.0 * PI * i as f64 / span).cos();
                sinc * window
            })
            .collect();

        let sum: f64 = taps.iter().sum();
        for t in &mut taps {
            *t /= sum;
        }

        Self { factor, taps }
    }

    #[inline]
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Zero-stuff and interpolate. Output length is `input.len() * factor`.
    pub fn upsample(&self, input: &[Sample]) -> Vec<Sample> {
        let factor = self.factor as isize;
        let center = (self.taps.len() / 2) as isize;
        let out_len = input.len() * self.factor;

        (0..out_len as isize)
            .map(|i| {
                let mut sum = 0.0;
                for (k, &tap) in self.taps.iter().enumerate() {
                    let j = i + center - k as isize;
                    if j < 0 || j % factor != 0 {
                        continue;
                    }
                    if let Some(&x) = input.get((j / factor) as usize) {
                        sum += tap * x;
                    }
                }
                // Zero-stuffing divides the passband level by the factor
                sum * self.factor as f64
            })
            .collect()
    }

    /// Lowpass and decimate. Output length is `input.len() / factor`.
    pub fn downsample(&self, input: &[Sample]) -> Vec<Sample> {
        let center = (self.taps.len() / 2) as isize;
        let out_len = input.len() / self.factor;

        (0..out_len)
            .map(|m| {
                let i = (m * self.factor) as isize;
                self.taps
                    .iter()
                    .enumerate()
                    .filter_map(|(k, &tap)| {
                        let j = i + center - k as isize;
                        (j >= 0)
                            .then(|| input.get(j as usize))
                            .flatten()
                            .map(|&x| tap * x)
                    })
                    .sum()
            })
            .collect()
    }

    /// Run `f` at the oversampled rate
    pub fn process<F>(&self, input: &[Sample], mut f: F) -> Vec<Sample>
    where
        F: FnMut(Sample) -> Sample,
    {
        let mut up = self.upsample(input);
        for s in &mut up {
            *s = f(*s);
        }
        self.downsample(&up)
    }
}

impl Default for Oversampler {
    fn default() -> Self {
        Self::new(OVERSAMPLE_FACTOR)
    }
}
