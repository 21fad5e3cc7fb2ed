//! Error types for offline processing

use mf_core::CoreError;
use mf_dsp::DspError;
use mf_master::ChainError;
use thiserror::Error;

/// WAV input errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Failed to read WAV data: {0}")]
    Read(String),

    #[error("Unsupported sample format: {bits}-bit {format}")]
    UnsupportedFormat { format: &'static str, bits: u16 },

    #[error("Malformed WAV header: {0}")]
    Header(String),

    #[error("Invalid buffer: {0}")]
    Buffer(#[from] CoreError),
}

impl From<hound::Error> for DecodeError {
    fn from(e: hound::Error) -> Self {
        Self::Read(e.to_string())
    }
}

/// Offline processing errors
#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] DspError),

    #[error("Render failed: {0}")]
    Render(ChainError),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Worker pool error: {0}")]
    Pool(String),
}

impl From<ChainError> for OfflineError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Cancelled => Self::Cancelled,
            other => Self::Render(other),
        }
    }
}

/// Result type for offline operations
pub type OfflineResult<T> = Result<T, OfflineError>;
