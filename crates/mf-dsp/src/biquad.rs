//! Biquad filter implementation using Transposed Direct Form II
//!
//! TDF-II is numerically optimal for floating-point arithmetic,
//! minimizing quantization noise and ensuring stability.
//! Coefficients follow the RBJ audio EQ cookbook.

use mf_core::{PcmBuffer, Sample};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{ensure_below_nyquist, ensure_finite, ensure_positive};
use crate::{DspResult, MonoProcessor, Processor};

/// Q used for band-splitting filters; approximates a maximally flat 2-pole split
pub const DEFAULT_CROSSOVER_Q: f64 = 0.71;

/// Biquad filter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    Lowpass,
    Highpass,
    LowShelf,
    HighShelf,
}

/// Complete description of one filter stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub filter_type: FilterType,
    /// Corner / center frequency in Hz
    pub freq: f64,
    pub q: f64,
    /// Shelf gain in dB (ignored by lowpass/highpass)
    pub gain_db: f64,
}

impl FilterSpec {
    pub fn lowpass(freq: f64) -> Self {
        Self {
            filter_type: FilterType::Lowpass,
            freq,
            q: DEFAULT_CROSSOVER_Q,
            gain_db: 0.0,
        }
    }

    pub fn highpass(freq: f64) -> Self {
        Self {
            filter_type: FilterType::Highpass,
            freq,
            q: DEFAULT_CROSSOVER_Q,
            gain_db: 0.0,
        }
    }

    pub fn low_shelf(freq: f64, gain_db: f64) -> Self {
        Self {
            filter_type: FilterType::LowShelf,
            freq,
            q: DEFAULT_CROSSOVER_Q,
            gain_db,
        }
    }

    pub fn high_shelf(freq: f64, gain_db: f64) -> Self {
        Self {
            filter_type: FilterType::HighShelf,
            freq,
            q: DEFAULT_CROSSOVER_Q,
            gain_db,
        }
    }

    pub fn with_q(mut self, q: f64) -> Self {
        self.q = q;
        self
    }

    /// Check the spec against a sample rate
    pub fn validate(&self, sample_rate: u32) -> DspResult<()> {
        ensure_below_nyquist("filter frequency", self.freq, sample_rate)?;
        ensure_positive("filter Q", self.q)?;
        ensure_finite("filter gain", self.gain_db)
    }

    /// Compute normalized coefficients, validating first
    pub fn coeffs(&self, sample_rate: u32) -> DspResult<BiquadCoeffs> {
        self.validate(sample_rate)?;
        let sr = sample_rate as f64;
        Ok(match self.filter_type {
            FilterType::Lowpass => BiquadCoeffs::lowpass(self.freq, self.q, sr),
            FilterType::Highpass => BiquadCoeffs::highpass(self.freq, self.q, sr),
            FilterType::LowShelf => BiquadCoeffs::low_shelf(self.freq, self.q, self.gain_db, sr),
            FilterType::HighShelf => BiquadCoeffs::high_shelf(self.freq, self.q, self.gain_db, sr),
        })
    }
}

/// Biquad coefficients (normalized by a0)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Calculate lowpass filter coefficients
    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let b0 = (1.0 - cos_omega) / 2.0;
        let b1 = 1.0 - cos_omega;
        let b2 = (1.0 - cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Calculate highpass filter coefficients
    pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let b0 = (1.0 + cos_omega) / 2.0;
        let b1 = -(1.0 + cos_omega);
        let b2 = (1.0 + cos_omega) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_omega;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Calculate low shelf filter coefficients
    pub fn low_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha);
        let a0 = (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega);
        let a2 = (a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Calculate high shelf filter coefficients
    pub fn high_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;

        let b0 = a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha);
        let a0 = (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_omega);
        let a2 = (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    #[inline]
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response at `freq` (linear)
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        let omega = 2.0 * PI * freq / sample_rate;
        let (c1, s1) = (omega.cos(), omega.sin());
        let (c2, s2) = ((2.0 * omega).cos(), (2.0 * omega).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

/// Transposed Direct Form II biquad
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl BiquadTDF2 {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let c = &self.coeffs;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }
}

/// Run one filter over every channel of `buffer` (fresh state per channel)
pub fn apply_filter(buffer: &PcmBuffer, spec: &FilterSpec) -> DspResult<PcmBuffer> {
    let coeffs = spec.coeffs(buffer.sample_rate())?;
    Ok(buffer.map_channels(|_, samples| BiquadTDF2::new(coeffs).process_block(samples)))
}

/// Run several filters in series over every channel
pub fn apply_filters(buffer: &PcmBuffer, specs: &[FilterSpec]) -> DspResult<PcmBuffer> {
    let coeffs = specs
        .iter()
        .map(|spec| spec.coeffs(buffer.sample_rate()))
        .collect::<DspResult<Vec<_>>>()?;

    Ok(buffer.map_channels(|_, samples| {
        coeffs.iter().fold(samples.to_vec(), |signal, &c| {
            BiquadTDF2::new(c).process_block(&signal)
        })
    }))
}
