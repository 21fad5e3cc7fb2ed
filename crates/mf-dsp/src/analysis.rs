//! Forward FFT magnitude spectra for offline analysis
//!
//! Two entry points:
//! - [`magnitude_spectrum`]: one unwindowed DFT over the whole input
//! - [`SpectrumAnalyzer::average_spectrum`]: Hann-windowed frames averaged
//!   over the input, for long buffers

use std::f64::consts::PI;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use mf_core::Sample;

use crate::{DspError, DspResult};

/// Default analysis frame length
pub const DEFAULT_FFT_SIZE: usize = 4096;
/// Minimum frame length
const MIN_FFT_SIZE: usize = 64;
/// Maximum frame length
const MAX_FFT_SIZE: usize = 65536;

/// Magnitudes `|X[k]|` for `k in 0..=n/2` of the real input.
///
/// Empty input yields an empty spectrum.
pub fn magnitude_spectrum(samples: &[Sample]) -> DspResult<Vec<f64>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut planner = RealFftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(samples.len());
    let mut input = samples.to_vec();
    let mut output = fft.make_output_vec();
    fft.process(&mut input, &mut output)
        .map_err(|e| DspError::Fft(e.to_string()))?;

    Ok(output.iter().map(|c| c.norm()).collect())
}

/// Center frequency of bin `bin` for a transform of `fft_size` points
#[inline]
pub fn bin_frequency(bin: usize, fft_size: usize, sample_rate: u32) -> f64 {
    bin as f64 * sample_rate as f64 / fft_size as f64
}

/// Frame-averaging spectrum analyzer
pub struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f64>>,
    fft_size: usize,
    hop_size: usize,
    window: Vec<f64>,
}

impl SpectrumAnalyzer {
    /// `fft_size` must be a power of two in `64..=65536`
    pub fn new(fft_size: usize) -> DspResult<Self> {
        if !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) || !fft_size.is_power_of_two() {
            return Err(DspError::InvalidParameter(format!(
                "FFT size must be a power of two in {MIN_FFT_SIZE}..={MAX_FFT_SIZE}, got {fft_size}"
            )));
        }

        let mut planner = RealFftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window
        let window = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (fft_size - 1) as f64).cos()))
            .collect();

        Ok(Self {
            fft,
            fft_size,
            hop_size: fft_size / 2,
            window,
        })
    }

    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Distance between frame starts
    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of bins in every returned spectrum
    #[inline]
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Number of frames `average_spectrum` will take for `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len <= self.fft_size {
            1
        } else {
            (len - self.fft_size) / self.hop_size + 1
        }
    }

    /// Magnitude spectrum of the frame starting at `start`, zero-padded
    /// past the end of `samples`
    pub fn frame_spectrum(&self, samples: &[Sample], start: usize) -> DspResult<Vec<f64>> {
        let mut scratch = vec![0.0; self.fft_size];
        let end = (start + self.fft_size).min(samples.len());
        if start < end {
            for (i, (&s, &w)) in samples[start..end].iter().zip(&self.window).enumerate() {
                scratch[i] = s * w;
            }
        }

        let mut spectrum = vec![Complex::new(0.0, 0.0); self.bin_count()];
        self.fft
            .process(&mut scratch, &mut spectrum)
            .map_err(|e| DspError::Fft(e.to_string()))?;

        Ok(spectrum.iter().map(|c| c.norm()).collect())
    }

    /// Mean magnitude spectrum over hop-spaced frames. Input shorter than
    /// one frame is analysed as a single zero-padded frame.
    pub fn average_spectrum(&self, samples: &[Sample]) -> DspResult<Vec<f64>> {
        let frames = self.frame_count(samples.len());
        let mut avg = vec![0.0; self.bin_count()];

        for frame in 0..frames {
            let spectrum = self.frame_spectrum(samples, frame * self.hop_size)?;
            for (a, m) in avg.iter_mut().zip(&spectrum) {
                *a += m;
            }
        }

        let scale = 1.0 / frames as f64;
        for a in &mut avg {
            *a *= scale;
        }
        Ok(avg)
    }
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("hop_size", &self.hop_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine(freq: f64, sr: f64, len: usize) -> Vec<f64> {
        (0..len).map(|i| (2.0 * PI * freq * i as f64 / sr).sin()).collect()
    }

    #[test]
    fn test_magnitude_spectrum_peak_bin() {
        // 1 kHz at 64 kHz over 64 points lands exactly on bin 1
        let spectrum = magnitude_spectrum(&sine(1000.0, 64000.0, 64)).unwrap();
        assert_eq!(spectrum.len(), 33);
        assert_relative_eq!(spectrum[1], 32.0, epsilon = 1e-9);
        assert!(spectrum[5] < 1e-9);
    }

    #[test]
    fn test_magnitude_spectrum_dc() {
        let spectrum = magnitude_spectrum(&[1.0; 16]).unwrap();
        assert_relative_eq!(spectrum[0], 16.0, epsilon = 1e-12);
        assert!(magnitude_spectrum(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_average_spectrum_locates_tone() {
        let sr = 48000;
        let analyzer = SpectrumAnalyzer::new(4096).unwrap();
        let avg = analyzer.average_spectrum(&sine(3000.0, sr as f64, 48000)).unwrap();

        let peak_bin = avg
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let freq = bin_frequency(peak_bin, analyzer.fft_size(), sr);
        assert!((freq - 3000.0).abs() < 12.0, "peak at {freq} Hz");
    }

    #[test]
    fn test_short_input_is_one_frame() {
        let analyzer = SpectrumAnalyzer::new(1024).unwrap();
        assert_eq!(analyzer.frame_count(10), 1);
        assert_eq!(analyzer.frame_count(1024 + 512), 2);
        let avg = analyzer.average_spectrum(&[0.5; 10]).unwrap();
        assert_eq!(avg.len(), 513);
    }

    #[test]
    fn test_rejects_bad_size() {
        assert!(SpectrumAnalyzer::new(1000).is_err());
        assert!(SpectrumAnalyzer::new(32).is_err());
    }
}
