//! Error types for MasterForge core types

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Buffer has no channels")]
    NoChannels,

    #[error("Channel length mismatch: channel 0 has {expected} frames, channel {channel} has {got}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        got: usize,
    },

    #[error("Interleaved length {len} is not a multiple of {channels} channels")]
    InterleaveMismatch { len: usize, channels: usize },
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
