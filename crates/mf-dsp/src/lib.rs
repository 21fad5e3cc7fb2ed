//! mf-dsp: DSP primitives for MasterForge
//!
//! Offline, deterministic building blocks. Nothing in here knows about
//! mastering; every operation is a pure function of (buffer, settings) that
//! returns a new buffer or fails with [`DspError::InvalidParameter`].
//!
//! ## Modules
//! - `biquad` - TDF-II biquad filters (lowpass, highpass, low/high shelf)
//! - `dynamics` - Soft-knee compressor with one-pole attack/release smoothing
//! - `saturation` - Tape, tube and fuzz waveshaping curves
//! - `oversampling` - 4x windowed-sinc up/down sampling for the waveshaper
//! - `analysis` - Forward FFT magnitude spectrum
//! - `convolution` - Direct-sum convolution with wet/dry mix

pub mod analysis;
pub mod biquad;
pub mod convolution;
pub mod dynamics;
pub mod oversampling;
pub mod saturation;

mod error;

pub use error::{DspError, DspResult};

use mf_core::Sample;

/// Trait for all stateful DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples into a new vector
    fn process_block(&mut self, input: &[Sample]) -> Vec<Sample> {
        input.iter().map(|&s| self.process_sample(s)).collect()
    }
}
