//! Error types for DSP primitives

use mf_core::CoreError;
use thiserror::Error;

/// DSP primitive error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    /// Malformed filter/compressor/waveshaper settings
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// FFT engine rejected its buffers
    #[error("FFT failed: {0}")]
    Fft(String),

    #[error(transparent)]
    Buffer(#[from] CoreError),
}

/// Result type alias
pub type DspResult<T> = Result<T, DspError>;

/// Reject non-finite values
pub(crate) fn ensure_finite(name: &str, value: f64) -> DspResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DspError::InvalidParameter(format!("{name} must be finite, got {value}")))
    }
}

/// Reject values that are not strictly positive
pub(crate) fn ensure_positive(name: &str, value: f64) -> DspResult<()> {
    ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(DspError::InvalidParameter(format!("{name} must be > 0, got {value}")))
    }
}

/// Frequencies must lie strictly between 0 Hz and Nyquist
pub(crate) fn ensure_below_nyquist(name: &str, freq: f64, sample_rate: u32) -> DspResult<()> {
    ensure_positive(name, freq)?;
    let nyquist = sample_rate as f64 / 2.0;
    if freq < nyquist {
        Ok(())
    } else {
        Err(DspError::InvalidParameter(format!(
            "{name} {freq} Hz is at or above Nyquist ({nyquist} Hz)"
        )))
    }
}
