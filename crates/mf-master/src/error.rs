//! Error types for the mastering core

use mf_dsp::DspError;
use thiserror::Error;

/// Render failure. A failed render never yields a partial buffer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    /// Chain specification rejected while building the processing graph
    #[error("Invalid chain specification: {0}")]
    InvalidSpec(#[from] DspError),

    /// Render abandoned through its cancel token
    #[error("Render cancelled")]
    Cancelled,
}

/// Result type for rendering
pub type ChainResult<T> = Result<T, ChainError>;

/// Externally supplied candidate specification that cannot be used.
///
/// Non-fatal: generation falls back to the rule-based specification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AiCandidateError {
    /// Candidate text is not valid JSON for the candidate schema
    #[error("Candidate is not valid JSON: {0}")]
    Parse(String),

    /// Required numeric field absent
    #[error("Candidate is missing required field `{0}`")]
    Missing(&'static str),

    /// Required numeric field is NaN or infinite
    #[error("Candidate field `{field}` is not finite ({value})")]
    NonFinite {
        /// Dotted field path
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// All fields present but the assembled specification breaks an invariant
    #[error("Candidate violates chain invariants: {0}")]
    Invalid(#[source] DspError),
}

/// Reverb stage could not run. Non-fatal: the render continues dry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReverbUnavailable {
    /// No impulse response registered or found under this name
    #[error("Impulse response `{0}` not found")]
    NotFound(String),

    /// Impulse response exists but could not be read
    #[error("Impulse response `{name}` failed to load: {reason}")]
    LoadFailed {
        /// Impulse response name
        name: String,
        /// Loader message
        reason: String,
    },

    /// Impulse response sample rate differs from the program material
    #[error("Impulse response `{name}` is {ir_rate} Hz, program is {program_rate} Hz")]
    SampleRateMismatch {
        /// Impulse response name
        name: String,
        /// Impulse response sample rate
        ir_rate: u32,
        /// Program sample rate
        program_rate: u32,
    },
}
