//! Feed-forward compressor stage
//!
//! Static curve: below threshold the signal passes untouched; above it the
//! gain reduction is `(level - threshold) * (1 - 1/ratio)`, blended in over a
//! quadratic soft knee of `knee_db` centered on the threshold. The gain
//! reduction is smoothed with one-pole attack/release envelopes whose
//! coefficients are `exp(-1 / (sample_rate * time))`.

use mf_core::{PcmBuffer, Sample};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ensure_positive};
use crate::{DspError, DspResult, MonoProcessor, Processor};

/// Detector floor for silent input (dB)
const DETECTOR_FLOOR_DB: f64 = -100.0;

/// How the level detector sees a multichannel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectionMode {
    /// Each channel has its own detector and envelope
    #[default]
    PerChannel,
    /// One detector fed with the mean absolute level of all channels;
    /// the same gain is applied to every channel
    Summed,
}

/// Compressor settings. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressorSettings {
    pub threshold_db: f64,
    pub knee_db: f64,
    pub ratio: f64,
    pub attack: f64,
    pub release: f64,
}

impl CompressorSettings {
    /// Validate ranges. Ratio below 1 would expand, non-positive times have
    /// no envelope.
    pub fn validate(&self) -> DspResult<()> {
        ensure_finite("compressor threshold", self.threshold_db)?;
        ensure_finite("compressor knee", self.knee_db)?;
        if self.knee_db < 0.0 {
            return Err(DspError::InvalidParameter(format!(
                "compressor knee must be >= 0 dB, got {}",
                self.knee_db
            )));
        }
        ensure_finite("compressor ratio", self.ratio)?;
        if self.ratio < 1.0 {
            return Err(DspError::InvalidParameter(format!(
                "compressor ratio must be >= 1, got {}",
                self.ratio
            )));
        }
        ensure_positive("compressor attack", self.attack)?;
        ensure_positive("compressor release", self.release)
    }

    /// Static gain reduction (positive dB) for a detector level
    pub fn gain_reduction_db(&self, level_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        let over = level_db - self.threshold_db;
        let knee_half = self.knee_db / 2.0;

        if self.knee_db > 0.0 && over.abs() < knee_half {
            let x = over + knee_half;
            slope * x * x / (2.0 * self.knee_db)
        } else if over > 0.0 {
            slope * over
        } else {
            0.0
        }
    }
}

/// One-pole smoothing coefficient for a time constant in seconds
#[inline]
pub fn time_coeff(time: f64, sample_rate: u32) -> f64 {
    (-1.0 / (sample_rate as f64 * time)).exp()
}

#[inline]
fn level_db(level: f64) -> f64 {
    if level > 1e-10 {
        20.0 * level.log10()
    } else {
        DETECTOR_FLOOR_DB
    }
}

/// Stateful compressor (one detector envelope)
#[derive(Debug, Clone)]
pub struct Compressor {
    settings: CompressorSettings,
    attack_coeff: f64,
    release_coeff: f64,
    /// Smoothed gain reduction (dB, >= 0)
    envelope_db: f64,
}

impl Compressor {
    pub fn new(settings: CompressorSettings, sample_rate: u32) -> DspResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            attack_coeff: time_coeff(settings.attack, sample_rate),
            release_coeff: time_coeff(settings.release, sample_rate),
            envelope_db: 0.0,
        })
    }

    /// Advance the envelope with a detector level and return the linear gain
    #[inline]
    pub fn next_gain(&mut self, detector_level: f64) -> f64 {
        let target = self.settings.gain_reduction_db(level_db(detector_level));
        let coeff = if target > self.envelope_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * target;

        if self.envelope_db > 0.0 {
            10.0_f64.powf(-self.envelope_db / 20.0)
        } else {
            1.0
        }
    }

    /// Current smoothed gain reduction in dB
    pub fn gain_reduction(&self) -> f64 {
        self.envelope_db
    }
}

impl Processor for Compressor {
    fn reset(&mut self) {
        self.envelope_db = 0.0;
    }
}

impl MonoProcessor for Compressor {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        input * self.next_gain(input.abs())
    }
}

/// Compress every channel of `buffer`
pub fn compress(
    buffer: &PcmBuffer,
    settings: &CompressorSettings,
    detection: DetectionMode,
) -> DspResult<PcmBuffer> {
    let sample_rate = buffer.sample_rate();
    let template = Compressor::new(*settings, sample_rate)?;

    match detection {
        DetectionMode::PerChannel => {
            Ok(buffer.map_channels(|_, samples| template.clone().process_block(samples)))
        }
        DetectionMode::Summed => {
            let mut comp = template;
            let channels: Vec<&[Sample]> = buffer.channels().collect();
            let count = channels.len() as f64;
            let gains: Vec<f64> = (0..buffer.frames())
                .map(|i| {
                    let level = channels.iter().map(|ch| ch[i].abs()).sum::<f64>() / count;
                    comp.next_gain(level)
                })
                .collect();

            Ok(buffer.map_channels(|_, samples| {
                samples.iter().zip(&gains).map(|(s, g)| s * g).collect()
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn settings() -> CompressorSettings {
        CompressorSettings {
            threshold_db: -20.0,
            knee_db: 0.0,
            ratio: 4.0,
            attack: 0.001,
            release: 0.1,
        }
    }

    #[test]
    fn test_static_curve_hard_knee() {
        let s = settings();
        assert_eq!(s.gain_reduction_db(-30.0), 0.0);
        assert_eq!(s.gain_reduction_db(-20.0), 0.0);
        // 8 dB over at 4:1 -> 6 dB reduction
        assert_relative_eq!(s.gain_reduction_db(-12.0), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_static_curve_soft_knee_is_continuous() {
        let s = CompressorSettings {
            knee_db: 10.0,
            ..settings()
        };
        assert_eq!(s.gain_reduction_db(-25.0), 0.0);
        assert_relative_eq!(s.gain_reduction_db(-15.0), 0.75 * 5.0, epsilon = 1e-12);
        // Inside the knee, reduction is positive but below the hard-knee value
        let at_threshold = s.gain_reduction_db(-20.0);
        assert!(at_threshold > 0.0 && at_threshold < 0.75 * 5.0);
    }

    #[test]
    fn test_below_threshold_is_bit_exact() {
        let buffer = PcmBuffer::mono(48000, vec![0.01, -0.02, 0.015, 0.0]).unwrap();
        let out = compress(&buffer, &settings(), DetectionMode::PerChannel).unwrap();
        assert_eq!(out, buffer);
    }

    #[test]
    fn test_loud_signal_settles_to_static_curve() {
        let buffer = PcmBuffer::mono(48000, vec![0.5; 48000]).unwrap();
        let out = compress(&buffer, &settings(), DetectionMode::PerChannel).unwrap();
        let last = *out.channel(0).unwrap().last().unwrap();

        let over = 20.0 * 0.5_f64.log10() + 20.0;
        let expected = 0.5 * 10.0_f64.powf(-(0.75 * over) / 20.0);
        assert_relative_eq!(last, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_summed_detection_applies_same_gain() {
        let buffer = PcmBuffer::new(48000, vec![vec![0.8; 4800], vec![0.0; 4800]]).unwrap();
        let out = compress(&buffer, &settings(), DetectionMode::Summed).unwrap();
        let left = out.channel(0).unwrap();
        // Mean level is 0.4, reduced but less than a per-channel detector would
        let per_channel = compress(&buffer, &settings(), DetectionMode::PerChannel).unwrap();
        assert!(left[4799] < 0.8);
        assert!(left[4799] > per_channel.channel(0).unwrap()[4799]);
        assert!(out.channel(1).unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_invalid_settings() {
        let bad_ratio = CompressorSettings {
            ratio: 0.5,
            ..settings()
        };
        assert!(matches!(bad_ratio.validate(), Err(DspError::InvalidParameter(_))));

        let bad_attack = CompressorSettings {
            attack: 0.0,
            ..settings()
        };
        assert!(matches!(bad_attack.validate(), Err(DspError::InvalidParameter(_))));

        let nan_threshold = CompressorSettings {
            threshold_db: f64::NAN,
            ..settings()
        };
        assert!(nan_threshold.validate().is_err());
    }

    #[test]
    fn test_coefficient_formula() {
        assert_relative_eq!(time_coeff(0.01, 44100), (-1.0 / 441.0_f64).exp());
    }
}
