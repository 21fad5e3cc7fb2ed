//! Reference track matching
//!
//! Nudges a chain specification toward the tonal balance, loudness and
//! density of a reference track, using the analysis of both tracks.

use mf_core::db_to_linear;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisReport;
use crate::spec::ChainSpec;

/// Limits on how far matching may move a specification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSettings {
    /// Largest shelf gain change (dB)
    pub max_shelf_adjust_db: f64,
    /// Smallest final gain multiplier
    pub min_gain_factor: f64,
    /// Largest final gain multiplier
    pub max_gain_factor: f64,
    /// Crest difference (dB) above which compression tightens
    pub density_tolerance_db: f64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            max_shelf_adjust_db: 3.0,
            min_gain_factor: 0.5,
            max_gain_factor: 2.0,
            density_tolerance_db: 1.0,
        }
    }
}

/// What matching changed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Bass shelf change (dB)
    pub low_shelf_adjust_db: f64,
    /// Treble shelf change (dB)
    pub high_shelf_adjust_db: f64,
    /// Final gain multiplier
    pub gain_factor: f64,
    /// Threshold change applied to every band (dB)
    pub threshold_adjust_db: f64,
    /// Ratio change applied to every band
    pub ratio_adjust: f64,
}

/// Reference matcher
#[derive(Debug, Clone, Default)]
pub struct ReferenceMatcher {
    settings: MatchSettings,
}

impl ReferenceMatcher {
    /// Matcher with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Matcher with explicit limits
    pub fn with_settings(settings: MatchSettings) -> Self {
        Self { settings }
    }

    /// Compare `source` to `reference` and work out the adjustments
    pub fn compare(&self, source: &AnalysisReport, reference: &AnalysisReport) -> MatchResult {
        let s = &self.settings;
        let shelf = |src: f64, reference: f64| -> f64 {
            let ratio = reference.max(1e-6) / src.max(1e-6);
            (10.0 * ratio.log10()).clamp(-s.max_shelf_adjust_db, s.max_shelf_adjust_db)
        };

        let loudness_diff = reference.loudness.integrated - source.loudness.integrated;
        let gain_factor = db_to_linear(loudness_diff).clamp(s.min_gain_factor, s.max_gain_factor);

        // Lower crest in the reference means a denser master
        let density_diff = crest_db(source) - crest_db(reference);
        let (threshold_adjust_db, ratio_adjust) = if density_diff > s.density_tolerance_db {
            (-density_diff.min(6.0), (density_diff / 6.0).min(1.0))
        } else {
            (0.0, 0.0)
        };

        MatchResult {
            low_shelf_adjust_db: shelf(source.spectral_balance.low, reference.spectral_balance.low),
            high_shelf_adjust_db: shelf(
                source.spectral_balance.high,
                reference.spectral_balance.high,
            ),
            gain_factor,
            threshold_adjust_db,
            ratio_adjust,
        }
    }

    /// Apply a comparison to `spec`
    pub fn apply(&self, spec: &mut ChainSpec, result: &MatchResult) {
        spec.eq.low_shelf.gain_db += result.low_shelf_adjust_db;
        spec.eq.high_shelf.gain_db += result.high_shelf_adjust_db;
        spec.final_gain *= result.gain_factor;
        for band in spec.bands.iter_mut() {
            band.threshold_db = (band.threshold_db + result.threshold_adjust_db).min(0.0);
            band.ratio += result.ratio_adjust;
        }
    }
}

fn crest_db(report: &AnalysisReport) -> f64 {
    if report.dynamics.crest > 0.0 {
        20.0 * report.dynamics.crest.log10()
    } else {
        0.0
    }
}
