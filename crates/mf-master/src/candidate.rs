//! Externally suggested chain specification
//!
//! The suggestion provider returns loosely structured JSON. Every numeric
//! field is optional at parse time; [`ChainSpecCandidate::validate`] turns a
//! candidate into a [`ChainSpec`] only when every numeric field is present,
//! finite, and the result satisfies the chain invariants.

use mf_dsp::saturation::SaturationFlavor;
use serde::{Deserialize, Serialize};

use crate::error::AiCandidateError;
use crate::spec::{
    BandSet, BandSpec, ChainSpec, Crossover, EqSpec, LimiterSpec, ReverbSpec, SaturationSpec,
    ShelfSpec,
};

/// Crossover section of a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateCrossover {
    /// Low/mid split (Hz)
    pub low_pass: Option<f64>,
    /// Mid/high split (Hz)
    pub high_pass: Option<f64>,
}

/// Shelf section of a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateShelf {
    /// Corner frequency (Hz)
    pub freq: Option<f64>,
    /// Gain (dB)
    pub gain_db: Option<f64>,
}

/// EQ section of a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateEq {
    /// Bass shelf
    pub low_shelf: CandidateShelf,
    /// Treble shelf
    pub high_shelf: CandidateShelf,
}

/// One band of a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateBand {
    /// Threshold (dB)
    pub threshold_db: Option<f64>,
    /// Knee (dB)
    pub knee_db: Option<f64>,
    /// Ratio
    pub ratio: Option<f64>,
    /// Attack (s)
    pub attack: Option<f64>,
    /// Release (s)
    pub release: Option<f64>,
    /// Makeup gain (linear)
    pub makeup_gain: Option<f64>,
}

/// Band section of a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateBands {
    /// Low band
    pub low: CandidateBand,
    /// Mid band
    pub mid: CandidateBand,
    /// High band
    pub high: CandidateBand,
}

/// Saturation section of a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateSaturation {
    /// Amount (0-100)
    pub amount: Option<f64>,
    /// Flavor; inherits the base flavor when absent
    pub flavor: Option<SaturationFlavor>,
}

/// Limiter section of a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateLimiter {
    /// Threshold (dB)
    pub threshold_db: Option<f64>,
    /// Attack (s)
    pub attack: Option<f64>,
    /// Release (s)
    pub release: Option<f64>,
}

/// Reverb section of a candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateReverb {
    /// Impulse response name; inherits the base name when absent
    pub impulse_response: Option<String>,
    /// Wet/dry mix (0-1)
    pub mix: Option<f64>,
}

/// Unvalidated chain specification from an external suggestion provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChainSpecCandidate {
    /// Crossover
    pub crossover: CandidateCrossover,
    /// EQ
    pub eq: CandidateEq,
    /// Bands
    pub bands: CandidateBands,
    /// Saturation
    pub saturation: CandidateSaturation,
    /// Limiter
    pub limiter: CandidateLimiter,
    /// Reverb; optional as a whole, absent means "inherit the base reverb"
    pub reverb: Option<CandidateReverb>,
    /// Pre-EQ gain (linear)
    pub pre_gain: Option<f64>,
    /// Pre-limiter gain (linear)
    pub final_gain: Option<f64>,
}

fn require(field: &'static str, value: Option<f64>) -> Result<f64, AiCandidateError> {
    match value {
        None => Err(AiCandidateError::Missing(field)),
        Some(v) if !v.is_finite() => Err(AiCandidateError::NonFinite { field, value: v }),
        Some(v) => Ok(v),
    }
}

macro_rules! band {
    ($band:expr, $prefix:literal) => {
        BandSpec {
            threshold_db: require(concat!($prefix, ".thresholdDb"), $band.threshold_db)?,
            knee_db: require(concat!($prefix, ".kneeDb"), $band.knee_db)?,
            ratio: require(concat!($prefix, ".ratio"), $band.ratio)?,
            attack: require(concat!($prefix, ".attack"), $band.attack)?,
            release: require(concat!($prefix, ".release"), $band.release)?,
            makeup_gain: require(concat!($prefix, ".makeupGain"), $band.makeup_gain)?,
        }
    };
}

impl ChainSpecCandidate {
    /// Parse provider JSON
    pub fn from_json(json: &str) -> Result<Self, AiCandidateError> {
        serde_json::from_str(json).map_err(|e| AiCandidateError::Parse(e.to_string()))
    }

    /// Resolve into a full specification.
    ///
    /// Non-numeric fields the candidate leaves out (saturation flavor,
    /// reverb impulse response) are taken from `base`.
    pub fn validate(&self, base: &ChainSpec) -> Result<ChainSpec, AiCandidateError> {
        let reverb = match &self.reverb {
            Some(r) => ReverbSpec {
                impulse_response: r
                    .impulse_response
                    .clone()
                    .unwrap_or_else(|| base.reverb.impulse_response.clone()),
                mix: require("reverb.mix", r.mix)?,
            },
            None => base.reverb.clone(),
        };

        let spec = ChainSpec {
            crossover: Crossover {
                low_pass: require("crossover.lowPass", self.crossover.low_pass)?,
                high_pass: require("crossover.highPass", self.crossover.high_pass)?,
            },
            eq: EqSpec {
                low_shelf: ShelfSpec {
                    freq: require("eq.lowShelf.freq", self.eq.low_shelf.freq)?,
                    gain_db: require("eq.lowShelf.gainDb", self.eq.low_shelf.gain_db)?,
                },
                high_shelf: ShelfSpec {
                    freq: require("eq.highShelf.freq", self.eq.high_shelf.freq)?,
                    gain_db: require("eq.highShelf.gainDb", self.eq.high_shelf.gain_db)?,
                },
            },
            bands: BandSet {
                low: band!(self.bands.low, "bands.low"),
                mid: band!(self.bands.mid, "bands.mid"),
                high: band!(self.bands.high, "bands.high"),
            },
            saturation: SaturationSpec {
                amount: require("saturation.amount", self.saturation.amount)?,
                flavor: self.saturation.flavor.unwrap_or(base.saturation.flavor),
            },
            limiter: LimiterSpec {
                threshold_db: require("limiter.thresholdDb", self.limiter.threshold_db)?,
                attack: require("limiter.attack", self.limiter.attack)?,
                release: require("limiter.release", self.limiter.release)?,
            },
            reverb,
            pre_gain: require("preGain", self.pre_gain)?,
            final_gain: require("finalGain", self.final_gain)?,
        };

        spec.validate().map_err(AiCandidateError::Invalid)?;
        Ok(spec)
    }
}

impl From<&ChainSpec> for ChainSpecCandidate {
    fn from(spec: &ChainSpec) -> Self {
        let band = |b: &BandSpec| CandidateBand {
            threshold_db: Some(b.threshold_db),
            knee_db: Some(b.knee_db),
            ratio: Some(b.ratio),
            attack: Some(b.attack),
            release: Some(b.release),
            makeup_gain: Some(b.makeup_gain),
        };
        let shelf = |s: &ShelfSpec| CandidateShelf {
            freq: Some(s.freq),
            gain_db: Some(s.gain_db),
        };

        Self {
            crossover: CandidateCrossover {
                low_pass: Some(spec.crossover.low_pass),
                high_pass: Some(spec.crossover.high_pass),
            },
            eq: CandidateEq {
                low_shelf: shelf(&spec.eq.low_shelf),
                high_shelf: shelf(&spec.eq.high_shelf),
            },
            bands: CandidateBands {
                low: band(&spec.bands.low),
                mid: band(&spec.bands.mid),
                high: band(&spec.bands.high),
            },
            saturation: CandidateSaturation {
                amount: Some(spec.saturation.amount),
                flavor: Some(spec.saturation.flavor),
            },
            limiter: CandidateLimiter {
                threshold_db: Some(spec.limiter.threshold_db),
                attack: Some(spec.limiter.attack),
                release: Some(spec.limiter.release),
            },
            reverb: Some(CandidateReverb {
                impulse_response: Some(spec.reverb.impulse_response.clone()),
                mix: Some(spec.reverb.mix),
            }),
            pre_gain: Some(spec.pre_gain),
            final_gain: Some(spec.final_gain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_candidate_round_trips() {
        let base = ChainSpec::baseline();
        let candidate = ChainSpecCandidate::from(&base);
        assert_eq!(candidate.validate(&base).unwrap(), base);
    }

    #[test]
    fn test_missing_field_is_named() {
        let base = ChainSpec::baseline();
        let mut candidate = ChainSpecCandidate::from(&base);
        candidate.bands.mid.ratio = None;
        assert_eq!(
            candidate.validate(&base),
            Err(AiCandidateError::Missing("bands.mid.ratio"))
        );
    }

    #[test]
    fn test_non_finite_field_rejected() {
        let base = ChainSpec::baseline();
        let mut candidate = ChainSpecCandidate::from(&base);
        candidate.final_gain = Some(f64::NAN);
        assert!(matches!(
            candidate.validate(&base),
            Err(AiCandidateError::NonFinite { field: "finalGain", .. })
        ));
    }

    #[test]
    fn test_invariant_violation_rejected() {
        let base = ChainSpec::baseline();
        let mut candidate = ChainSpecCandidate::from(&base);
        candidate.bands.low.ratio = Some(0.5);
        assert!(matches!(candidate.validate(&base), Err(AiCandidateError::Invalid(_))));
    }

    #[test]
    fn test_partial_json_fails_validation() {
        let base = ChainSpec::baseline();
        let candidate =
            ChainSpecCandidate::from_json(r#"{"crossover":{"lowPass":200,"highPass":3500}}"#)
                .unwrap();
        assert_eq!(
            candidate.validate(&base),
            Err(AiCandidateError::Missing("eq.lowShelf.freq"))
        );
    }

    #[test]
    fn test_garbage_json_is_parse_error() {
        assert!(matches!(
            ChainSpecCandidate::from_json("the model said hello"),
            Err(AiCandidateError::Parse(_))
        ));
    }

    #[test]
    fn test_absent_flavor_and_reverb_inherit_base() {
        let mut base = ChainSpec::baseline();
        base.saturation.flavor = SaturationFlavor::Tube;
        let mut candidate = ChainSpecCandidate::from(&ChainSpec::baseline());
        candidate.saturation.flavor = None;
        candidate.reverb = None;

        let spec = candidate.validate(&base).unwrap();
        assert_eq!(spec.saturation.flavor, SaturationFlavor::Tube);
        assert_eq!(spec.reverb, base.reverb);
    }
}
