//! Post-render peak normalization
//!
//! Guarantees `max(|sample|) <= 10^(-0.1/20)` across all channels with one
//! uniform gain. Buffers already under the ceiling pass through untouched,
//! which makes the operation idempotent.

use log::debug;
use mf_core::{PcmBuffer, db_to_linear};

/// Peak ceiling (dBFS)
pub const CEILING_DB: f64 = -0.1;

/// Peak ceiling as a linear value (about 0.98855)
#[inline]
pub fn target_ceiling() -> f64 {
    db_to_linear(CEILING_DB)
}

/// Normalized buffer and the gain that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Output buffer
    pub buffer: PcmBuffer,
    /// Uniform linear gain applied (1.0 when untouched)
    pub gain: f64,
}

/// Scale `buffer` down so its peak sits at the ceiling, if it is above it
pub fn normalize(buffer: &PcmBuffer) -> Normalized {
    let target = target_ceiling();
    let peak = buffer.peak();

    if peak <= target {
        return Normalized {
            buffer: buffer.clone(),
            gain: 1.0,
        };
    }

    // Every |s·gain| rounds to at most peak·gain, so bounding that one
    // product bounds the whole buffer
    let mut gain = target / peak;
    while peak * gain > target {
        gain = next_below(gain);
    }

    debug!("normalize: peak {peak:.6} -> gain {gain:.6}");
    Normalized {
        buffer: buffer.scaled(gain),
        gain,
    }
}

/// Largest f64 below a positive, finite `x`
#[inline]
fn next_below(x: f64) -> f64 {
    f64::from_bits(x.to_bits() - 1)
}
