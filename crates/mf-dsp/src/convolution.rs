//! Direct-sum convolution
//!
//! `y[n] = Σ x[k]·h[n-k]`, output length `len(x) + len(h) - 1`. Used for the
//! optional reverb send; impulse responses are short enough that the direct
//! form is fine offline.

use mf_core::{PcmBuffer, Sample};

use crate::error::ensure_finite;
use crate::{DspError, DspResult};

/// Full linear convolution. Either input empty gives an empty output.
pub fn convolve(signal: &[Sample], ir: &[Sample]) -> Vec<Sample> {
    if signal.is_empty() || ir.is_empty() {
        return Vec::new();
    }

    let mut out = vec![0.0; signal.len() + ir.len() - 1];
    for (i, &x) in signal.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (acc, &h) in out[i..i + ir.len()].iter_mut().zip(ir) {
            *acc += x * h;
        }
    }
    out
}

/// Wet/dry convolution of every channel of `buffer` with `ir`.
///
/// Output is `(1 - mix)·dry + mix·wet`, with the dry signal zero-padded to
/// the wet length so the reverb tail is kept. Channel `i` uses IR channel
/// `i` when the channel counts match, otherwise IR channel 0.
pub fn convolve_mix(buffer: &PcmBuffer, ir: &PcmBuffer, mix: f64) -> DspResult<PcmBuffer> {
    ensure_finite("reverb mix", mix)?;
    if !(0.0..=1.0).contains(&mix) {
        return Err(DspError::InvalidParameter(format!(
            "reverb mix must be in 0..=1, got {mix}"
        )));
    }
    if ir.is_empty() {
        return Err(DspError::InvalidParameter("impulse response is empty".into()));
    }

    let matched = ir.channel_count() == buffer.channel_count();
    if !matched {
        log::debug!(
            "impulse response has {} channels, program has {}; using IR channel 0",
            ir.channel_count(),
            buffer.channel_count()
        );
    }
    buffer.try_map_channels(|index, dry| {
        let ir_channel = if matched { index } else { 0 };
        let response = ir.channel(ir_channel).unwrap_or_default();
        let mut wet = convolve(dry, response);
        if wet.is_empty() {
            return Ok(wet);
        }

        for (i, w) in wet.iter_mut().enumerate() {
            let d = dry.get(i).copied().unwrap_or(0.0);
            *w = (1.0 - mix) * d + mix * *w;
        }
        Ok::<_, DspError>(wet)
    })
}
