//! Waveshaping saturation
//!
//! A transfer function is tabulated once over input `[-1, 1]` and applied by
//! linear interpolation. Tube and fuzz are blended with the dry input by
//! amount; tape folds amount into its drive `k`. Flavors:
//! - Tape: `tanh(k·x) / tanh(k)`, symmetric soft saturation
//! - Tube: `x - x³/3` polynomial soft clip
//! - Fuzz: `sign(x)` hard clip
//!
//! Anti-aliasing:
//! - Optional 4x oversampled application via [`Oversampler`]

use mf_core::{PcmBuffer, Sample};
use serde::{Deserialize, Serialize};

use crate::oversampling::Oversampler;
use crate::{DspError, DspResult};

/// Default curve resolution
pub const DEFAULT_CURVE_SIZE: usize = 8192;
/// Smallest accepted curve resolution
pub const MIN_CURVE_SIZE: usize = 4096;
/// Largest accepted curve resolution
pub const MAX_CURVE_SIZE: usize = 44100;

/// Saturation flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaturationFlavor {
    /// Tape: smooth symmetric compression of peaks
    #[default]
    Tape,
    /// Tube: gentle polynomial rounding
    Tube,
    /// Fuzz: square-wave hard clip
    Fuzz,
}

impl SaturationFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tape => "tape",
            Self::Tube => "tube",
            Self::Fuzz => "fuzz",
        }
    }

    /// Transfer function. Only tape depends on `amount` (through `k`).
    fn transfer(self, x: f64, amount: f64) -> f64 {
        match self {
            Self::Tape => {
                let k = 1.0 + amount / 100.0 * 9.0;
                (k * x).tanh() / k.tanh()
            }
            Self::Tube => {
                let x = x.clamp(-1.0, 1.0);
                x - x * x * x / 3.0
            }
            Self::Fuzz => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Wet share of the shaped signal for `amount` in `0..=100`
    fn wet(self, amount: f64) -> f64 {
        match self {
            Self::Tape => 1.0,
            Self::Tube | Self::Fuzz => amount / 100.0,
        }
    }
}

impl std::fmt::Display for SaturationFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tabulated transfer curve over `[-1, 1]`
#[derive(Debug, Clone)]
pub struct WaveshaperCurve {
    flavor: SaturationFlavor,
    table: Vec<f64>,
    wet: f64,
}

impl WaveshaperCurve {
    /// Build a curve for `flavor` at `amount` (0..=100) with `size` points
    pub fn new(flavor: SaturationFlavor, amount: f64, size: usize) -> DspResult<Self> {
        if !amount.is_finite() || !(0.0..=100.0).contains(&amount) {
            return Err(DspError::InvalidParameter(format!(
                "saturation amount must be in 0..=100, got {amount}"
            )));
        }
        if !(MIN_CURVE_SIZE..=MAX_CURVE_SIZE).contains(&size) {
            return Err(DspError::InvalidParameter(format!(
                "curve size must be in {MIN_CURVE_SIZE}..={MAX_CURVE_SIZE}, got {size}"
            )));
        }

        let last = (size - 1) as f64;
        let table = (0..size)
            .map(|i| {
                let x = 2.0 * i as f64 / last - 1.0;
                flavor.transfer(x, amount)
            })
            .collect();

        Ok(Self {
            flavor,
            table,
            wet: flavor.wet(amount),
        })
    }

    /// Curve at the default resolution
    pub fn with_default_size(flavor: SaturationFlavor, amount: f64) -> DspResult<Self> {
        Self::new(flavor, amount, DEFAULT_CURVE_SIZE)
    }

    #[inline]
    pub fn flavor(&self) -> SaturationFlavor {
        self.flavor
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Linear-interpolated lookup. Input outside `[-1, 1]` is clamped.
    #[inline]
    pub fn lookup(&self, x: Sample) -> Sample {
        let last = self.table.len() - 1;
        let pos = (x.clamp(-1.0, 1.0) + 1.0) * 0.5 * last as f64;
        let idx = (pos as usize).min(last - 1);
        let frac = pos - idx as f64;
        self.table[idx] + frac * (self.table[idx + 1] - self.table[idx])
    }

    /// Dry/wet mix of the input and its looked-up value
    #[inline]
    pub fn shape(&self, x: Sample) -> Sample {
        let shaped = self.lookup(x);
        if self.wet >= 1.0 {
            shaped
        } else {
            x + self.wet * (shaped - x)
        }
    }

    /// Wet share applied by [`WaveshaperCurve::shape`]
    #[inline]
    pub fn wet(&self) -> f64 {
        self.wet
    }
}

/// Apply `curve` to every channel, optionally at 4x the sample rate
pub fn waveshape(buffer: &PcmBuffer, curve: &WaveshaperCurve, oversample: bool) -> PcmBuffer {
    if oversample {
        let os = Oversampler::default();
        buffer.map_channels(|_, samples| os.process(samples, |x| curve.shape(x)))
    } else {
        buffer.map_channels(|_, samples| samples.iter().map(|&x| curve.shape(x)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_curve_endpoints() {
        for (flavor, edge) in [
            (SaturationFlavor::Tape, 1.0),
            (SaturationFlavor::Tube, 2.0 / 3.0),
            (SaturationFlavor::Fuzz, 1.0),
        ] {
            let curve = WaveshaperCurve::with_default_size(flavor, 50.0).unwrap();
            assert_relative_eq!(curve.lookup(1.0), edge, epsilon = 1e-9);
            assert_relative_eq!(curve.lookup(-1.0), -edge, epsilon = 1e-9);
            // Out of range input is clamped
            assert_relative_eq!(curve.lookup(3.0), edge, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_tube_table_is_cubic_soft_clip() {
        for amount in [0.0, 50.0, 100.0] {
            let curve = WaveshaperCurve::new(SaturationFlavor::Tube, amount, 4097).unwrap();
            // 4097 points put x = -1 + i/2048 exactly on the grid
            for &x in &[-1.0, -0.5, -0.25, 0.0, 0.25, 0.5, 0.75, 1.0] {
                assert_relative_eq!(curve.lookup(x), x - x * x * x / 3.0, epsilon = 1e-12);
            }
            assert_relative_eq!(curve.lookup(0.5), 0.458_333_333_333, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_fuzz_table_is_sign() {
        let curve = WaveshaperCurve::new(SaturationFlavor::Fuzz, 50.0, 4097).unwrap();
        for &x in &[0.25, 0.4, 0.75, 1.0] {
            assert_relative_eq!(curve.lookup(x), 1.0, epsilon = 1e-9);
            assert_relative_eq!(curve.lookup(-x), -1.0, epsilon = 1e-9);
        }
        assert_eq!(curve.lookup(0.0), 0.0);
    }

    #[test]
    fn test_amount_blends_tube_and_fuzz_only() {
        let tube = WaveshaperCurve::new(SaturationFlavor::Tube, 50.0, 4097).unwrap();
        assert_relative_eq!(tube.wet(), 0.5);
        assert_relative_eq!(tube.shape(0.5), 0.5 + 0.5 * (0.458_333_333_333 - 0.5), epsilon = 1e-9);

        let fuzz = WaveshaperCurve::new(SaturationFlavor::Fuzz, 25.0, 4097).unwrap();
        assert_relative_eq!(fuzz.shape(0.4), 0.4 + 0.25 * 0.6, epsilon = 1e-9);

        let dry = WaveshaperCurve::new(SaturationFlavor::Fuzz, 0.0, 4097).unwrap();
        assert_eq!(dry.shape(0.4), 0.4);

        let tape = WaveshaperCurve::with_default_size(SaturationFlavor::Tape, 30.0).unwrap();
        assert_eq!(tape.shape(0.3), tape.lookup(0.3));
    }

    #[test]
    fn test_tape_is_odd_symmetric() {
        let curve = WaveshaperCurve::with_default_size(SaturationFlavor::Tape, 70.0).unwrap();
        for &x in &[0.1, 0.33, 0.5, 0.9] {
            assert_relative_eq!(curve.lookup(x), -curve.lookup(-x), epsilon = 1e-6);
            assert!(curve.lookup(x) > x, "tape should lift {x}");
        }
    }

    #[test]
    fn test_fuzz_full_amount_is_hard_clip() {
        let curve = WaveshaperCurve::with_default_size(SaturationFlavor::Fuzz, 100.0).unwrap();
        assert_relative_eq!(curve.shape(0.4), 1.0, epsilon = 1e-9);
        assert_relative_eq!(curve.shape(-0.4), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(WaveshaperCurve::new(SaturationFlavor::Tape, 150.0, 8192).is_err());
        assert!(WaveshaperCurve::new(SaturationFlavor::Tape, 50.0, 100).is_err());
        assert!(WaveshaperCurve::new(SaturationFlavor::Tape, 50.0, 50000).is_err());
        assert!(WaveshaperCurve::new(SaturationFlavor::Tube, 50.0, MIN_CURVE_SIZE).is_ok());
    }

    #[test]
    fn test_waveshape_keeps_shape_and_is_deterministic() {
        let samples: Vec<f64> = (0..512).map(|i| (i as f64 * 0.05).sin() * 0.8).collect();
        let buffer = PcmBuffer::new(44100, vec![samples.clone(), samples]).unwrap();
        let curve = WaveshaperCurve::with_default_size(SaturationFlavor::Tube, 40.0).unwrap();

        let a = waveshape(&buffer, &curve, true);
        let b = waveshape(&buffer, &curve, true);
        assert_eq!(a, b);
        assert_eq!(a.frames(), buffer.frames());
        assert_eq!(a.channel_count(), 2);
    }

    #[test]
    fn test_flavor_serde_names() {
        let json = serde_json::to_string(&SaturationFlavor::Tube).unwrap();
        assert_eq!(json, "\"tube\"");
    }
}
