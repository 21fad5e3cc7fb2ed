//! Chain specification: the fully resolved render configuration
//!
//! A [`ChainSpec`] carries every number the signal chain needs. It is built
//! fresh per request, read (never written) by the engine, and blended
//! field-by-field with an external candidate through [`Blend`].

use mf_dsp::DspError;
use mf_dsp::DspResult;
use mf_dsp::saturation::SaturationFlavor;
use serde::{Deserialize, Serialize};

/// Impulse response name meaning "no reverb"
pub const NO_REVERB: &str = "none";

/// Crossover cutoffs (Hz)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crossover {
    /// Low/mid split
    pub low_pass: f64,
    /// Mid/high split
    pub high_pass: f64,
}

/// One shelving filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelfSpec {
    /// Corner frequency (Hz)
    pub freq: f64,
    /// Shelf gain (dB)
    pub gain_db: f64,
}

/// Pre-split shelving EQ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqSpec {
    /// Bass shelf
    pub low_shelf: ShelfSpec,
    /// Treble shelf
    pub high_shelf: ShelfSpec,
}

/// Compressor settings of one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandSpec {
    /// Threshold (dB)
    pub threshold_db: f64,
    /// Knee width (dB)
    pub knee_db: f64,
    /// Ratio (>= 1)
    pub ratio: f64,
    /// Attack (s)
    pub attack: f64,
    /// Release (s)
    pub release: f64,
    /// Post-compression gain (linear)
    pub makeup_gain: f64,
}

/// The three band compressors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandSet {
    /// Below the low crossover
    pub low: BandSpec,
    /// Between the crossovers
    pub mid: BandSpec,
    /// Above the high crossover
    pub high: BandSpec,
}

impl BandSet {
    /// Bands in render order
    pub fn iter(&self) -> impl Iterator<Item = &BandSpec> {
        [&self.low, &self.mid, &self.high].into_iter()
    }

    /// Mutable bands in render order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BandSpec> {
        [&mut self.low, &mut self.mid, &mut self.high].into_iter()
    }
}

/// Waveshaper stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaturationSpec {
    /// Amount (0-100), 0 bypasses the stage
    pub amount: f64,
    /// Transfer curve
    pub flavor: SaturationFlavor,
}

/// Output limiter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimiterSpec {
    /// Threshold (dB)
    pub threshold_db: f64,
    /// Attack (s)
    pub attack: f64,
    /// Release (s)
    pub release: f64,
}

/// Optional convolution reverb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverbSpec {
    /// Registered impulse response name, or `"none"`
    pub impulse_response: String,
    /// Wet/dry mix (0-1)
    pub mix: f64,
}

impl ReverbSpec {
    /// Reverb switched off
    pub fn none() -> Self {
        Self {
            impulse_response: NO_REVERB.to_string(),
            mix: 0.0,
        }
    }

    /// Whether the stage should run at all
    pub fn is_enabled(&self) -> bool {
        self.impulse_response != NO_REVERB && self.mix > 0.0
    }
}

/// Fully resolved chain configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSpec {
    /// Crossover cutoffs
    pub crossover: Crossover,
    /// Shelving EQ
    pub eq: EqSpec,
    /// Band compressors
    pub bands: BandSet,
    /// Saturation
    pub saturation: SaturationSpec,
    /// Limiter
    pub limiter: LimiterSpec,
    /// Reverb
    pub reverb: ReverbSpec,
    /// Linear gain before the pre-EQ
    pub pre_gain: f64,
    /// Linear gain before the limiter
    pub final_gain: f64,
}

impl ChainSpec {
    /// The fixed default every generation starts from
    pub fn baseline() -> Self {
        Self {
            crossover: Crossover {
                low_pass: 250.0,
                high_pass: 4000.0,
            },
            eq: EqSpec {
                low_shelf: ShelfSpec {
                    freq: 120.0,
                    gain_db: 0.0,
                },
                high_shelf: ShelfSpec {
                    freq: 8000.0,
                    gain_db: 0.0,
                },
            },
            bands: BandSet {
                low: BandSpec {
                    threshold_db: -35.0,
                    knee_db: 15.0,
                    ratio: 4.0,
                    attack: 0.05,
                    release: 0.30,
                    makeup_gain: 2.0,
                },
                mid: BandSpec {
                    threshold_db: -30.0,
                    knee_db: 10.0,
                    ratio: 3.0,
                    attack: 0.01,
                    release: 0.25,
                    makeup_gain: 2.0,
                },
                high: BandSpec {
                    threshold_db: -25.0,
                    knee_db: 5.0,
                    ratio: 3.0,
                    attack: 0.005,
                    release: 0.15,
                    makeup_gain: 1.5,
                },
            },
            saturation: SaturationSpec {
                amount: 0.0,
                flavor: SaturationFlavor::Tape,
            },
            limiter: LimiterSpec {
                threshold_db: -1.5,
                attack: 0.001,
                release: 0.1,
            },
            reverb: ReverbSpec::none(),
            pre_gain: 1.0,
            final_gain: 1.0,
        }
    }

    /// Check the specification invariants that do not depend on a sample
    /// rate: ratio >= 1, times > 0, thresholds <= 0 dB, ordered crossovers,
    /// amounts and mixes in range, finite gains.
    pub fn validate(&self) -> DspResult<()> {
        let c = &self.crossover;
        finite("crossover.lowPass", c.low_pass)?;
        finite("crossover.highPass", c.high_pass)?;
        if c.low_pass <= 0.0 || c.low_pass >= c.high_pass {
            return Err(invalid(format!(
                "crossover must satisfy 0 < lowPass < highPass, got {} / {}",
                c.low_pass, c.high_pass
            )));
        }

        let shelves = [
            ("eq.lowShelf", &self.eq.low_shelf),
            ("eq.highShelf", &self.eq.high_shelf),
        ];
        for (name, shelf) in shelves {
            finite(name, shelf.gain_db)?;
            positive(name, shelf.freq)?;
        }

        let band_names = ["bands.low", "bands.mid", "bands.high"];
        for (name, band) in band_names.into_iter().zip(self.bands.iter()) {
            band.validate(name)?;
        }

        finite("saturation.amount", self.saturation.amount)?;
        if !(0.0..=100.0).contains(&self.saturation.amount) {
            return Err(invalid(format!(
                "saturation.amount must be in 0..=100, got {}",
                self.saturation.amount
            )));
        }

        let l = &self.limiter;
        non_positive("limiter.thresholdDb", l.threshold_db)?;
        positive("limiter.attack", l.attack)?;
        positive("limiter.release", l.release)?;

        finite("reverb.mix", self.reverb.mix)?;
        if !(0.0..=1.0).contains(&self.reverb.mix) {
            return Err(invalid(format!("reverb.mix must be in 0..=1, got {}", self.reverb.mix)));
        }

        non_negative("preGain", self.pre_gain)?;
        non_negative("finalGain", self.final_gain)
    }

    /// Linear blend toward `ai` at `strength` percent (clamped to 0..=100).
    ///
    /// Numeric fields follow [`Blend`]; the saturation flavor and impulse
    /// response name switch to the candidate's at 50% and above.
    pub fn blend(&self, ai: &ChainSpec, strength: f64) -> ChainSpec {
        let t = if strength.is_finite() {
            strength.clamp(0.0, 100.0) / 100.0
        } else {
            0.0
        };
        self.lerp(ai, t)
    }

    /// Shift the band thresholds by per-band amounts (dB)
    pub(crate) fn shift_thresholds(&mut self, low: f64, mid: f64, high: f64) {
        self.bands.low.threshold_db += low;
        self.bands.mid.threshold_db += mid;
        self.bands.high.threshold_db += high;
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::baseline()
    }
}

impl BandSpec {
    fn validate(&self, name: &str) -> DspResult<()> {
        non_positive(&format!("{name}.thresholdDb"), self.threshold_db)?;
        non_negative(&format!("{name}.kneeDb"), self.knee_db)?;
        finite(&format!("{name}.ratio"), self.ratio)?;
        if self.ratio < 1.0 {
            return Err(invalid(format!("{name}.ratio must be >= 1, got {}", self.ratio)));
        }
        positive(&format!("{name}.attack"), self.attack)?;
        positive(&format!("{name}.release"), self.release)?;
        non_negative(&format!("{name}.makeupGain"), self.makeup_gain)
    }
}

fn invalid(message: String) -> DspError {
    DspError::InvalidParameter(message)
}

fn finite(name: &str, value: f64) -> DspResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be finite, got {value}")))
    }
}

fn positive(name: &str, value: f64) -> DspResult<()> {
    finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be > 0, got {value}")))
    }
}

fn non_negative(name: &str, value: f64) -> DspResult<()> {
    finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be >= 0, got {value}")))
    }
}

fn non_positive(name: &str, value: f64) -> DspResult<()> {
    finite(name, value)?;
    if value <= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be <= 0 dB, got {value}")))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLENDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Field-wise interpolation between a base value and a candidate.
///
/// `t` is in `0..=1`. Implementations return `self` exactly at `t == 0` and
/// `other` exactly at `t == 1`.
pub trait Blend {
    /// Interpolate toward `other`
    fn lerp(&self, other: &Self, t: f64) -> Self;
}

impl Blend for f64 {
    #[inline]
    fn lerp(&self, other: &Self, t: f64) -> Self {
        // base·(1-t) + ai·t is exact at both ends and equals (base+ai)/2 at 0.5
        self * (1.0 - t) + other * t
    }
}

impl Blend for SaturationFlavor {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        if t >= 0.5 { *other } else { *self }
    }
}

impl Blend for String {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        if t >= 0.5 { other.clone() } else { self.clone() }
    }
}

impl Blend for Crossover {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            low_pass: self.low_pass.lerp(&other.low_pass, t),
            high_pass: self.high_pass.lerp(&other.high_pass, t),
        }
    }
}

impl Blend for ShelfSpec {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            freq: self.freq.lerp(&other.freq, t),
            gain_db: self.gain_db.lerp(&other.gain_db, t),
        }
    }
}

impl Blend for EqSpec {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            low_shelf: self.low_shelf.lerp(&other.low_shelf, t),
            high_shelf: self.high_shelf.lerp(&other.high_shelf, t),
        }
    }
}

impl Blend for BandSpec {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            threshold_db: self.threshold_db.lerp(&other.threshold_db, t),
            knee_db: self.knee_db.lerp(&other.knee_db, t),
            ratio: self.ratio.lerp(&other.ratio, t),
            attack: self.attack.lerp(&other.attack, t),
            release: self.release.lerp(&other.release, t),
            makeup_gain: self.makeup_gain.lerp(&other.makeup_gain, t),
        }
    }
}

impl Blend for BandSet {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            low: self.low.lerp(&other.low, t),
            mid: self.mid.lerp(&other.mid, t),
            high: self.high.lerp(&other.high, t),
        }
    }
}

impl Blend for SaturationSpec {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            amount: self.amount.lerp(&other.amount, t),
            flavor: self.flavor.lerp(&other.flavor, t),
        }
    }
}

impl Blend for LimiterSpec {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            threshold_db: self.threshold_db.lerp(&other.threshold_db, t),
            attack: self.attack.lerp(&other.attack, t),
            release: self.release.lerp(&other.release, t),
        }
    }
}

impl Blend for ReverbSpec {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            impulse_response: self.impulse_response.lerp(&other.impulse_response, t),
            mix: self.mix.lerp(&other.mix, t),
        }
    }
}

impl Blend for ChainSpec {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            crossover: self.crossover.lerp(&other.crossover, t),
            eq: self.eq.lerp(&other.eq, t),
            bands: self.bands.lerp(&other.bands, t),
            saturation: self.saturation.lerp(&other.saturation, t),
            limiter: self.limiter.lerp(&other.limiter, t),
            reverb: self.reverb.lerp(&other.reverb, t),
            pre_gain: self.pre_gain.lerp(&other.pre_gain, t),
            final_gain: self.final_gain.lerp(&other.final_gain, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> ChainSpec {
        let mut ai = ChainSpec::baseline();
        ai.crossover.low_pass = 180.0;
        ai.bands.mid.threshold_db = -22.0;
        ai.bands.high.ratio = 5.5;
        ai.eq.high_shelf.gain_db = 2.3;
        ai.saturation = SaturationSpec {
            amount: 40.0,
            flavor: SaturationFlavor::Fuzz,
        };
        ai.final_gain = 1.1;
        ai
    }

    #[test]
    fn test_baseline_is_valid() {
        assert!(ChainSpec::baseline().validate().is_ok());
    }

    #[test]
    fn test_blend_endpoints_are_exact() {
        let base = ChainSpec::baseline();
        let ai = candidate();
        assert_eq!(base.blend(&ai, 0.0), base);
        assert_eq!(base.blend(&ai, 100.0), ai);
    }

    #[test]
    fn test_blend_midpoint() {
        let base = ChainSpec::baseline();
        let ai = candidate();
        let mid = base.blend(&ai, 50.0);
        assert_eq!(mid.crossover.low_pass, (250.0 + 180.0) / 2.0);
        assert_eq!(mid.bands.mid.threshold_db, (-30.0 + -22.0) / 2.0);
        assert_eq!(mid.bands.high.ratio, (3.0 + 5.5) / 2.0);
        assert_eq!(mid.final_gain, (1.0 + 1.1) / 2.0);
        assert_eq!(mid.saturation.flavor, SaturationFlavor::Fuzz);
    }

    #[test]
    fn test_blend_clamps_strength() {
        let base = ChainSpec::baseline();
        let ai = candidate();
        assert_eq!(base.blend(&ai, 250.0), ai);
        assert_eq!(base.blend(&ai, -3.0), base);
        assert_eq!(base.blend(&ai, f64::NAN), base);
    }

    #[test]
    fn test_validate_rejects_invariant_violations() {
        let mut spec = ChainSpec::baseline();
        spec.bands.low.ratio = 0.9;
        assert!(spec.validate().is_err());

        let mut spec = ChainSpec::baseline();
        spec.bands.high.attack = 0.0;
        assert!(spec.validate().is_err());

        let mut spec = ChainSpec::baseline();
        spec.bands.mid.threshold_db = 1.0;
        assert!(spec.validate().is_err());

        let mut spec = ChainSpec::baseline();
        spec.crossover.low_pass = 5000.0;
        assert!(spec.validate().is_err());

        let mut spec = ChainSpec::baseline();
        spec.final_gain = f64::INFINITY;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(ChainSpec::baseline()).unwrap();
        assert_eq!(json["crossover"]["lowPass"], 250.0);
        assert_eq!(json["bands"]["mid"]["makeupGain"], 2.0);
        assert_eq!(json["reverb"]["impulseResponse"], "none");
        assert_eq!(json["saturation"]["flavor"], "tape");
    }
}
