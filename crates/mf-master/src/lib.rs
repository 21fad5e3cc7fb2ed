//! MasterForge mastering core
//!
//! Preference-driven multiband mastering of complete, decoded buffers:
//!
//! ## Features
//! - **Analysis**: RMS/peak, spectral balance, K-weighted loudness, dynamics
//! - **Parameter Generation**: rule-based, genre-aware chain specifications
//!   with analysis-driven corrections and reference matching
//! - **AI Blend**: validated external candidates blended by a strength slider
//! - **Rendering**: one deterministic multiband graph per request
//! - **Normalization**: hard peak ceiling at -0.1 dBFS
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mf_master::{MasteringPreferences, TonePreference, generate_chain_spec, render};
//!
//! let prefs = MasteringPreferences {
//!     tone: TonePreference::Warm,
//!     ..Default::default()
//! };
//! let generated = generate_chain_spec(&prefs, None, None, None);
//! let mastered = render(&input, &generated.spec)?;
//! ```

#![warn(missing_docs)]

pub mod analysis;
pub mod candidate;
pub mod chain;
pub mod generator;
pub mod genre;
pub mod normalize;
pub mod reference;
pub mod spec;

mod error;

pub use analysis::{AnalysisReport, Analyzer, PhaseProgress};
pub use candidate::ChainSpecCandidate;
pub use chain::{
    CancelToken, ImpulseResponseProvider, MasteredBuffer, RenderReport, RenderState,
    SignalChainEngine, StateObserver,
};
pub use error::{AiCandidateError, ChainError, ChainResult, ReverbUnavailable};
pub use generator::{GeneratedSpec, ParameterGenerator, generate_chain_spec};
pub use normalize::{Normalized, normalize};
pub use spec::ChainSpec;

use mf_core::PcmBuffer;
use mf_dsp::DspResult;
use serde::{Deserialize, Serialize};

/// Musical genre selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Genre {
    /// Electronic/EDM
    Electronic,
    /// Hip-hop/Rap
    HipHop,
    /// Rock/Metal
    Rock,
    /// Pop
    Pop,
    /// Classical/Orchestral
    Classical,
    /// Jazz
    Jazz,
    /// Acoustic/Folk
    Acoustic,
    /// R&B/Soul
    RnB,
    /// Podcast/Speech
    Speech,
    /// Unknown/Mixed
    #[default]
    Unknown,
}

impl Genre {
    /// Every genre, in display order
    pub const ALL: [Genre; 10] = [
        Genre::Electronic,
        Genre::HipHop,
        Genre::Rock,
        Genre::Pop,
        Genre::Classical,
        Genre::Jazz,
        Genre::Acoustic,
        Genre::RnB,
        Genre::Speech,
        Genre::Unknown,
    ];
}

/// Loudness target preset or custom integrated LUFS
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoudnessTarget {
    /// Dynamic, -18 LUFS
    Quiet,
    /// Streaming platforms, -14 LUFS
    #[default]
    Streaming,
    /// Club/loud masters, -9 LUFS
    Loud,
    /// Explicit integrated LUFS
    Custom(f64),
}

impl LoudnessTarget {
    /// Integrated LUFS this target resolves to
    pub fn lufs(&self) -> f64 {
        match self {
            LoudnessTarget::Quiet => -18.0,
            LoudnessTarget::Streaming => -14.0,
            LoudnessTarget::Loud => -9.0,
            LoudnessTarget::Custom(lufs) => *lufs,
        }
    }
}

/// Tonal character layered on top of the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TonePreference {
    /// No change
    #[default]
    Balanced,
    /// Fuller lows, softer highs
    Warm,
    /// Lifted highs and presence
    Bright,
    /// Tighter, harder-hitting mids
    Punchy,
    /// Rounded highs, heavier lows, forced saturation
    Vintage,
}

/// Stereo image preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StereoWidth {
    /// Narrower image
    Narrow,
    /// Leave the image alone
    #[default]
    Normal,
    /// Wider image
    Wide,
}

/// User-chosen mastering preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MasteringPreferences {
    /// Genre
    pub genre: Genre,
    /// Loudness target
    pub loudness: LoudnessTarget,
    /// Tone preference
    pub tone: TonePreference,
    /// Stereo width
    pub stereo_width: StereoWidth,
    /// Compression amount (0-100)
    pub compression_amount: f64,
    /// Saturation amount (0-100)
    pub saturation_amount: f64,
    /// Bass shelf gain (-6..+6 dB)
    pub bass_boost: f64,
    /// Treble shelf gain (-6..+6 dB)
    pub treble_boost: f64,
    /// Analysis of a reference track to match
    pub reference: Option<AnalysisReport>,
}

impl Default for MasteringPreferences {
    fn default() -> Self {
        Self {
            genre: Genre::Unknown,
            loudness: LoudnessTarget::Streaming,
            tone: TonePreference::Balanced,
            stereo_width: StereoWidth::Normal,
            compression_amount: 50.0,
            saturation_amount: 0.0,
            bass_boost: 0.0,
            treble_boost: 0.0,
            reference: None,
        }
    }
}

/// Analyze a buffer with a fresh [`Analyzer`]
pub fn analyze(buffer: &PcmBuffer) -> DspResult<AnalysisReport> {
    Analyzer::new()?.analyze(buffer)
}

/// Render `spec` over `buffer` with default engine settings (no reverb
/// impulse responses, no cancellation)
pub fn render(buffer: &PcmBuffer, spec: &ChainSpec) -> ChainResult<MasteredBuffer> {
    SignalChainEngine::new().render(buffer, spec)
}
