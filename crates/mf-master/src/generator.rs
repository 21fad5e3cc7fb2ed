//! Parameter generation
//!
//! Turns [`MasteringPreferences`] (plus optional analysis of the source and
//! an optional external candidate) into a [`ChainSpec`]:
//!
//! 1. Genre-voiced baseline
//! 2. Compression amount
//! 3. Tone preference
//! 4. Loudness target
//! 5. Stereo width
//! 6. EQ and saturation pass-through
//! 7. Analysis-driven corrections, then reference matching
//! 8. AI blend
//!
//! Every step is a total function on a plain struct, so the result is fully
//! determined by the inputs.

use log::{debug, warn};
use mf_core::linear_to_db;
use serde::Serialize;

use crate::analysis::AnalysisReport;
use crate::candidate::ChainSpecCandidate;
use crate::reference::ReferenceMatcher;
use crate::spec::ChainSpec;
use crate::{Genre, LoudnessTarget, MasteringPreferences, StereoWidth, TonePreference};

/// Strength used when a candidate arrives without one
pub const DEFAULT_AI_STRENGTH: f64 = 50.0;

/// Per-band threshold travel at full compression amount (dB)
const THRESHOLD_TRAVEL: [f64; 3] = [8.0, 6.0, 5.0];
/// Per-band ratio travel at full compression amount
const RATIO_TRAVEL: [f64; 3] = [3.0, 2.0, 2.0];

/// Loudness above which the chain is pushed harder (LUFS)
const LOUD_TARGET_LUFS: f64 = -12.0;
/// Loudness at or below which the chain is relaxed (LUFS)
const QUIET_TARGET_LUFS: f64 = -16.0;

/// Vintage tone saturation floor
const VINTAGE_SATURATION_FLOOR: f64 = 30.0;
/// Vintage tone release stretch
const VINTAGE_RELEASE_FACTOR: f64 = 1.5;

/// Pre-gain for a wide stereo image
const WIDE_PRE_GAIN: f64 = 1.05;

/// Shelf gain limit (dB)
const MAX_SHELF_DB: f64 = 6.0;

/// Generation result.
///
/// Keeps the rule-based specification and the accepted candidate so a new
/// AI strength can be applied without rerunning the rules.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSpec {
    /// Final specification to render
    pub spec: ChainSpec,
    /// Rule-based specification (steps 1-7)
    pub base: ChainSpec,
    /// Validated external candidate, if one was accepted
    pub candidate: Option<ChainSpec>,
    /// Blend strength (0-100) applied to `candidate`
    pub ai_strength: f64,
    /// What the rules did
    pub notes: Vec<String>,
    /// Inputs that were ignored or corrected
    pub warnings: Vec<String>,
}

impl GeneratedSpec {
    /// Re-derive `spec` for a new AI strength
    pub fn set_ai_strength(&mut self, strength: f64) {
        self.ai_strength = clamp_strength(strength);
        self.spec = match &self.candidate {
            Some(candidate) => self.base.blend(candidate, self.ai_strength),
            None => self.base.clone(),
        };
    }

    /// Copy with a new AI strength
    pub fn with_ai_strength(&self, strength: f64) -> Self {
        let mut out = self.clone();
        out.set_ai_strength(strength);
        out
    }
}

fn clamp_strength(strength: f64) -> f64 {
    if strength.is_finite() {
        strength.clamp(0.0, 100.0)
    } else {
        DEFAULT_AI_STRENGTH
    }
}

/// Rule-based parameter generator
#[derive(Debug, Clone, Default)]
pub struct ParameterGenerator {
    matcher: ReferenceMatcher,
}

impl ParameterGenerator {
    /// Generator with default reference matching limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator with a configured reference matcher
    pub fn with_matcher(matcher: ReferenceMatcher) -> Self {
        Self { matcher }
    }

    /// Run all steps
    pub fn generate(
        &self,
        preferences: &MasteringPreferences,
        analysis: Option<&AnalysisReport>,
        candidate: Option<&ChainSpecCandidate>,
        ai_strength: Option<f64>,
    ) -> GeneratedSpec {
        let mut notes = Vec::new();
        let mut warnings = Vec::new();

        let base = self.rule_based(preferences, analysis, &mut notes, &mut warnings);

        let accepted = candidate.and_then(|c| match c.validate(&base) {
            Ok(spec) => Some(spec),
            Err(e) => {
                warn!("AI candidate rejected: {e}");
                warnings.push(format!("AI settings ignored: {e}"));
                None
            }
        });

        let mut generated = GeneratedSpec {
            spec: base.clone(),
            base,
            candidate: accepted,
            ai_strength: 0.0,
            notes,
            warnings,
        };
        generated.set_ai_strength(ai_strength.unwrap_or(DEFAULT_AI_STRENGTH));
        if generated.candidate.is_some() {
            generated
                .notes
                .push(format!("AI settings blended at {:.0}%", generated.ai_strength));
        }
        generated
    }

    /// Steps 1-7
    pub fn rule_based(
        &self,
        preferences: &MasteringPreferences,
        analysis: Option<&AnalysisReport>,
        notes: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> ChainSpec {
        let compression = slider(
            "compressionAmount",
            preferences.compression_amount,
            (0.0, 100.0, 50.0),
            warnings,
        );
        let saturation = slider(
            "saturationAmount",
            preferences.saturation_amount,
            (0.0, 100.0, 0.0),
            warnings,
        );
        let bass = slider("bassBoost", preferences.bass_boost, (-MAX_SHELF_DB, MAX_SHELF_DB, 0.0), warnings);
        let treble = slider(
            "trebleBoost",
            preferences.treble_boost,
            (-MAX_SHELF_DB, MAX_SHELF_DB, 0.0),
            warnings,
        );

        let mut spec = genre_baseline(preferences.genre);
        apply_compression_amount(&mut spec, compression);
        apply_tone(&mut spec, preferences.tone);
        apply_loudness(&mut spec, preferences.loudness, warnings);
        apply_stereo_width(&mut spec, preferences.stereo_width);

        spec.eq.low_shelf.gain_db = bass;
        spec.eq.high_shelf.gain_db = treble;
        spec.saturation.amount = match preferences.tone {
            TonePreference::Vintage => saturation.max(VINTAGE_SATURATION_FLOOR),
            _ => saturation,
        };

        let profile = preferences.genre.profile();
        let target = preferences.loudness.lufs();
        if target.is_finite() && (target - profile.reference_lufs).abs() > 3.0 {
            notes.push(format!(
                "Target {target:.1} LUFS is far from typical {:?} material ({:.1} LUFS)",
                preferences.genre, profile.reference_lufs
            ));
        }

        if let Some(report) = analysis {
            apply_adaptive(&mut spec, report, notes);
        }

        match (&preferences.reference, analysis) {
            (Some(reference), Some(source)) => {
                let result = self.matcher.compare(source, reference);
                self.matcher.apply(&mut spec, &result);
                notes.push(format!(
                    "Matched reference: shelves {:+.1}/{:+.1} dB, gain x{:.2}",
                    result.low_shelf_adjust_db, result.high_shelf_adjust_db, result.gain_factor
                ));
            }
            (Some(_), None) => {
                warnings.push("Reference track ignored: source was not analyzed".to_string());
            }
            _ => {}
        }

        debug!("rule-based spec: {spec:?}");
        spec
    }
}

/// Run the full generation with a default generator
pub fn generate_chain_spec(
    preferences: &MasteringPreferences,
    analysis: Option<&AnalysisReport>,
    candidate: Option<&ChainSpecCandidate>,
    ai_strength: Option<f64>,
) -> GeneratedSpec {
    ParameterGenerator::new().generate(preferences, analysis, candidate, ai_strength)
}

/// Clamp a slider to `(min, max)`; non-finite input falls back to `default`
fn slider(
    name: &str,
    value: f64,
    (min, max, default): (f64, f64, f64),
    warnings: &mut Vec<String>,
) -> f64 {
    if !value.is_finite() {
        warnings.push(format!("{name} is not a number, using {default}"));
        return default;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        warnings.push(format!("{name} {value} clamped to {clamped}"));
    }
    clamped
}

/// Step 1: baseline with the genre's shelf corners and saturation flavor
pub fn genre_baseline(genre: Genre) -> ChainSpec {
    let profile = genre.profile();
    let mut spec = ChainSpec::baseline();
    spec.eq.low_shelf.freq = profile.low_shelf_freq;
    spec.eq.high_shelf.freq = profile.high_shelf_freq;
    spec.saturation.flavor = profile.saturation_flavor;
    spec
}

/// Step 2: amount 50 is the fixed point; 0 and 100 move thresholds and
/// ratios by the full travel in opposite directions
pub fn apply_compression_amount(spec: &mut ChainSpec, amount: f64) {
    let factor = (amount / 100.0 - 0.5) * 2.0;
    for ((band, threshold), ratio) in spec
        .bands
        .iter_mut()
        .zip(THRESHOLD_TRAVEL)
        .zip(RATIO_TRAVEL)
    {
        band.threshold_db -= factor * threshold;
        band.ratio += factor * ratio;
    }
}

/// Step 3
pub fn apply_tone(spec: &mut ChainSpec, tone: TonePreference) {
    let bands = &mut spec.bands;
    match tone {
        TonePreference::Balanced => {}
        TonePreference::Warm => {
            bands.low.makeup_gain += 1.0;
            bands.high.makeup_gain -= 0.5;
            bands.low.release = 0.4;
        }
        TonePreference::Bright => {
            bands.high.makeup_gain += 1.0;
            bands.mid.makeup_gain += 0.5;
            bands.low.makeup_gain -= 0.5;
            bands.high.attack = 0.003;
        }
        TonePreference::Punchy => {
            bands.mid.threshold_db -= 2.0;
            bands.mid.ratio += 1.0;
            bands.mid.attack = 0.008;
            bands.mid.makeup_gain += 1.0;
            bands.low.ratio += 1.0;
        }
        TonePreference::Vintage => {
            bands.high.makeup_gain -= 1.0;
            bands.low.ratio += 2.0;
            bands.low.release *= VINTAGE_RELEASE_FACTOR;
            bands.mid.release *= VINTAGE_RELEASE_FACTOR;
        }
    }
}

/// Step 4
pub fn apply_loudness(spec: &mut ChainSpec, target: LoudnessTarget, warnings: &mut Vec<String>) {
    let lufs = target.lufs();
    if !lufs.is_finite() {
        warnings.push("Custom loudness target is not a number, left unchanged".to_string());
        return;
    }

    if lufs > LOUD_TARGET_LUFS {
        spec.final_gain = 1.25;
        spec.limiter.threshold_db = -2.5;
    } else if lufs <= QUIET_TARGET_LUFS {
        spec.final_gain = 0.8;
        spec.limiter.threshold_db = -0.5;
    }
}

/// Step 5
pub fn apply_stereo_width(spec: &mut ChainSpec, width: StereoWidth) {
    if width == StereoWidth::Wide {
        spec.pre_gain = WIDE_PRE_GAIN;
    }
}

/// Step 7: corrections driven by the source analysis
pub fn apply_adaptive(spec: &mut ChainSpec, report: &AnalysisReport, notes: &mut Vec<String>) {
    if report.dynamic_range > 15.0 {
        spec.shift_thresholds(-5.0, -5.0, -5.0);
        notes.push(format!(
            "Wide dynamic range ({:.1} dB): compression increased",
            report.dynamic_range
        ));
    } else if report.dynamic_range < 8.0 {
        spec.shift_thresholds(3.0, 3.0, 3.0);
        for band in spec.bands.iter_mut() {
            band.threshold_db = band.threshold_db.min(0.0);
        }
        notes.push(format!(
            "Already dense ({:.1} dB dynamic range): compression eased",
            report.dynamic_range
        ));
    }

    let balance = report.spectral_balance;
    if balance.low > 0.5 {
        spec.eq.low_shelf.gain_db = (spec.eq.low_shelf.gain_db - 2.0).max(-MAX_SHELF_DB);
        notes.push("Bass-heavy source: bass shelf reduced".to_string());
    }
    if balance.high > 0.3 {
        spec.eq.high_shelf.gain_db = (spec.eq.high_shelf.gain_db - 2.0).max(-MAX_SHELF_DB);
        notes.push("Bright source: treble shelf reduced".to_string());
    }

    if linear_to_db(report.peak) > -3.0 {
        spec.limiter.threshold_db -= 1.0;
        notes.push("Hot peaks: limiter threshold lowered".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DynamicsReport, LoudnessReport, SpectralBalance};

    fn report(dynamic_range: f64, balance: SpectralBalance, peak: f64) -> AnalysisReport {
        AnalysisReport {
            rms: 0.1,
            peak,
            dynamic_range,
            spectral_balance: balance,
            loudness: LoudnessReport {
                momentary: -12.0,
                short_term: -13.0,
                integrated: -14.0,
            },
            dynamics: DynamicsReport {
                crest: 4.0,
                flatness: 0.4,
                kurtosis: 1.0,
            },
        }
    }

    #[test]
    fn test_fixed_point_at_defaults() {
        let generated = generate_chain_spec(&MasteringPreferences::default(), None, None, None);
        assert_eq!(generated.spec, ChainSpec::baseline());
        assert!(generated.warnings.is_empty());
    }

    #[test]
    fn test_compression_extremes() {
        let mut full = ChainSpec::baseline();
        apply_compression_amount(&mut full, 100.0);
        assert_eq!(full.bands.mid.threshold_db, -36.0);
        assert_eq!(full.bands.low.ratio, 7.0);

        let mut none = ChainSpec::baseline();
        apply_compression_amount(&mut none, 0.0);
        assert_eq!(none.bands.mid.threshold_db, -24.0);
        assert_eq!(none.bands.high.ratio, 1.0);
    }

    #[test]
    fn test_tones() {
        let mut warm = ChainSpec::baseline();
        apply_tone(&mut warm, TonePreference::Warm);
        assert_eq!(warm.bands.low.makeup_gain, 3.0);
        assert_eq!(warm.bands.high.makeup_gain, 1.0);
        assert_eq!(warm.bands.low.release, 0.4);

        let mut punchy = ChainSpec::baseline();
        apply_tone(&mut punchy, TonePreference::Punchy);
        assert_eq!(punchy.bands.mid.threshold_db, -32.0);
        assert_eq!(punchy.bands.mid.ratio, 4.0);
        assert_eq!(punchy.bands.low.ratio, 5.0);

        let mut vintage = ChainSpec::baseline();
        apply_tone(&mut vintage, TonePreference::Vintage);
        assert_eq!(vintage.bands.low.ratio, 6.0);
        assert!(vintage.bands.low.release > 0.30);
    }

    #[test]
    fn test_vintage_raises_saturation_floor() {
        let prefs = MasteringPreferences {
            tone: TonePreference::Vintage,
            saturation_amount: 10.0,
            ..Default::default()
        };
        let generated = generate_chain_spec(&prefs, None, None, None);
        assert_eq!(generated.spec.saturation.amount, 30.0);
    }

    #[test]
    fn test_loudness_targets() {
        let mut warnings = Vec::new();
        let mut loud = ChainSpec::baseline();
        apply_loudness(&mut loud, LoudnessTarget::Loud, &mut warnings);
        assert_eq!(loud.final_gain, 1.25);
        assert_eq!(loud.limiter.threshold_db, -2.5);

        let mut quiet = ChainSpec::baseline();
        apply_loudness(&mut quiet, LoudnessTarget::Custom(-16.0), &mut warnings);
        assert_eq!(quiet.final_gain, 0.8);
        assert_eq!(quiet.limiter.threshold_db, -0.5);

        let mut streaming = ChainSpec::baseline();
        apply_loudness(&mut streaming, LoudnessTarget::Streaming, &mut warnings);
        assert_eq!(streaming, ChainSpec::baseline());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_wide_stereo_pre_gain() {
        let mut spec = ChainSpec::baseline();
        apply_stereo_width(&mut spec, StereoWidth::Wide);
        assert_eq!(spec.pre_gain, 1.05);
    }

    #[test]
    fn test_sliders_clamped_with_warning() {
        let prefs = MasteringPreferences {
            bass_boost: 12.0,
            compression_amount: f64::NAN,
            ..Default::default()
        };
        let generated = generate_chain_spec(&prefs, None, None, None);
        assert_eq!(generated.spec.eq.low_shelf.gain_db, 6.0);
        assert_eq!(generated.spec.bands, ChainSpec::baseline().bands);
        assert_eq!(generated.warnings.len(), 2);
    }

    #[test]
    fn test_adaptive_wide_dynamics_and_bass_heavy() {
        let mut spec = ChainSpec::baseline();
        let mut notes = Vec::new();
        let balance = SpectralBalance {
            low: 0.6,
            mid: 0.3,
            high: 0.1,
        };
        apply_adaptive(&mut spec, &report(18.0, balance, 0.5), &mut notes);
        assert_eq!(spec.bands.low.threshold_db, -40.0);
        assert_eq!(spec.eq.low_shelf.gain_db, -2.0);
        assert_eq!(spec.eq.high_shelf.gain_db, 0.0);
        assert_eq!(spec.limiter.threshold_db, -1.5);
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn test_adaptive_dense_and_hot() {
        let mut spec = ChainSpec::baseline();
        let mut notes = Vec::new();
        apply_adaptive(&mut spec, &report(6.0, SpectralBalance::NEUTRAL, 0.95), &mut notes);
        assert_eq!(spec.bands.high.threshold_db, -22.0);
        assert_eq!(spec.eq.high_shelf.gain_db, -2.0);
        assert_eq!(spec.limiter.threshold_db, -2.5);
    }

    #[test]
    fn test_genre_moves_shelf_corners_only() {
        let prefs = MasteringPreferences {
            genre: Genre::HipHop,
            ..Default::default()
        };
        let generated = generate_chain_spec(&prefs, None, None, None);
        let baseline = ChainSpec::baseline();
        assert_eq!(generated.spec.bands, baseline.bands);
        assert_eq!(generated.spec.final_gain, baseline.final_gain);
        assert_eq!(generated.spec.eq.low_shelf.freq, Genre::HipHop.profile().low_shelf_freq);
    }

    #[test]
    fn test_reference_without_analysis_warns() {
        let prefs = MasteringPreferences {
            reference: Some(report(10.0, SpectralBalance::NEUTRAL, 0.5)),
            ..Default::default()
        };
        let generated = generate_chain_spec(&prefs, None, None, None);
        assert_eq!(generated.spec, ChainSpec::baseline());
        assert_eq!(generated.warnings.len(), 1);
    }

    #[test]
    fn test_rejected_candidate_falls_back() {
        let mut candidate = ChainSpecCandidate::from(&ChainSpec::baseline());
        candidate.limiter.attack = None;
        let generated = generate_chain_spec(
            &MasteringPreferences::default(),
            None,
            Some(&candidate),
            Some(100.0),
        );
        assert_eq!(generated.spec, ChainSpec::baseline());
        assert!(generated.candidate.is_none());
        assert_eq!(generated.warnings.len(), 1);
    }

    #[test]
    fn test_strength_rederives_without_rules() {
        let mut ai = ChainSpec::baseline();
        ai.bands.low.threshold_db = -20.0;
        let candidate = ChainSpecCandidate::from(&ai);
        let mut generated = generate_chain_spec(
            &MasteringPreferences::default(),
            None,
            Some(&candidate),
            Some(0.0),
        );
        assert_eq!(generated.spec, generated.base);

        generated.set_ai_strength(100.0);
        assert_eq!(generated.spec, ai);

        let half = generated.with_ai_strength(50.0);
        assert_eq!(half.spec.bands.low.threshold_db, -27.5);
    }
}
