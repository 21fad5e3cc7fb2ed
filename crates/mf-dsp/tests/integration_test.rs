//! DSP Integration Tests
//!
//! Runs buffers through chains of primitives the way the mastering engine
//! does. Verifies:
//! - Crossover split and recombination
//! - Signal path integrity (no NaN/Inf)
//! - Determinism of repeated runs

use std::f64::consts::PI;

use mf_core::PcmBuffer;
use mf_dsp::analysis::{SpectrumAnalyzer, bin_frequency};
use mf_dsp::biquad::{FilterSpec, apply_filter, apply_filters};
use mf_dsp::convolution::convolve_mix;
use mf_dsp::dynamics::{CompressorSettings, DetectionMode, compress};
use mf_dsp::saturation::{SaturationFlavor, WaveshaperCurve, waveshape};

const SAMPLE_RATE: u32 = 44100;

fn generate_sine(samples: usize, freq: f64, amplitude: f64) -> Vec<f64> {
    (0..samples)
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / SAMPLE_RATE as f64).sin())
        .collect()
}

/// Deterministic pseudo-noise (LCG)
fn generate_noise(samples: usize) -> Vec<f64> {
    let mut state: u32 = 0x1234_5678;
    (0..samples)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state as f64 / u32::MAX as f64) * 2.0 - 1.0
        })
        .collect()
}

fn is_valid_signal(signal: &[f64]) -> bool {
    signal.iter().all(|x| x.is_finite())
}

fn rms(signal: &[f64]) -> f64 {
    (signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64).sqrt()
}

fn stereo(samples: Vec<f64>) -> PcmBuffer {
    PcmBuffer::new(SAMPLE_RATE, vec![samples.clone(), samples]).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════════
// CROSSOVER
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_three_band_split_separates_tones() {
    let low_tone = generate_sine(44100, 60.0, 0.5);
    let high_tone = generate_sine(44100, 8000.0, 0.5);

    let high_only = PcmBuffer::mono(SAMPLE_RATE, high_tone).unwrap();
    let low_only = PcmBuffer::mono(SAMPLE_RATE, low_tone).unwrap();
    let low = apply_filter(&high_only, &FilterSpec::lowpass(200.0)).unwrap();
    let high = apply_filter(&low_only, &FilterSpec::highpass(2000.0)).unwrap();

    // Each band rejects the other band's tone
    assert!(rms(&low.channel(0).unwrap()[4410..]) < 0.01);
    assert!(rms(&high.channel(0).unwrap()[4410..]) < 0.01);
}

#[test]
fn test_mid_band_passes_mid_tone() {
    let buffer = PcmBuffer::mono(SAMPLE_RATE, generate_sine(44100, 1000.0, 0.5)).unwrap();
    let mid = apply_filters(
        &buffer,
        &[FilterSpec::highpass(200.0), FilterSpec::lowpass(2000.0)],
    )
    .unwrap();
    let level = rms(&mid.channel(0).unwrap()[4410..]);
    assert!(level > 0.3 && level < 0.4, "mid band rms {level}");
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNAL INTEGRITY
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_full_chain_signal_integrity() {
    let input = stereo(generate_noise(22050));
    let filtered = apply_filters(
        &input,
        &[FilterSpec::low_shelf(120.0, 2.0), FilterSpec::high_shelf(8000.0, -1.5)],
    )
    .unwrap();

    let settings = CompressorSettings {
        threshold_db: -18.0,
        knee_db: 6.0,
        ratio: 3.0,
        attack: 0.01,
        release: 0.2,
    };
    let compressed = compress(&filtered, &settings, DetectionMode::PerChannel).unwrap();

    let curve = WaveshaperCurve::with_default_size(SaturationFlavor::Tape, 35.0).unwrap();
    let saturated = waveshape(&compressed, &curve, true);

    let ir = PcmBuffer::mono(SAMPLE_RATE, vec![1.0, 0.0, 0.3, 0.0, 0.1]).unwrap();
    let output = convolve_mix(&saturated, &ir, 0.2).unwrap();

    assert_eq!(output.frames(), input.frames() + 4);
    for channel in output.channels() {
        assert!(is_valid_signal(channel));
    }
}

#[test]
fn test_chain_is_deterministic() {
    let input = stereo(generate_noise(8192));
    let run = || {
        let eq = apply_filter(&input, &FilterSpec::high_shelf(6000.0, 3.0)).unwrap();
        let curve = WaveshaperCurve::with_default_size(SaturationFlavor::Fuzz, 20.0).unwrap();
        waveshape(&eq, &curve, false)
    };
    assert_eq!(run(), run());
}

#[test]
fn test_limiter_style_compression_holds_ceiling() {
    let input = PcmBuffer::mono(SAMPLE_RATE, generate_sine(44100, 440.0, 1.0)).unwrap();
    let limiter = CompressorSettings {
        threshold_db: -6.0,
        knee_db: 0.0,
        ratio: 20.0,
        attack: 0.001,
        release: 0.1,
    };
    let out = compress(&input, &limiter, DetectionMode::Summed).unwrap();
    let tail_peak = out.channel(0).unwrap()[22050..]
        .iter()
        .fold(0.0_f64, |p, s| p.max(s.abs()));
    // Settled output is pulled well below full scale
    assert!(tail_peak < 0.75 && tail_peak > 0.4, "tail peak {tail_peak}");
}

#[test]
fn test_spectrum_of_shelved_noise_tilts() {
    let input = PcmBuffer::mono(SAMPLE_RATE, generate_noise(SAMPLE_RATE as usize)).unwrap();
    let tilted = apply_filter(&input, &FilterSpec::high_shelf(4000.0, -12.0)).unwrap();

    let analyzer = SpectrumAnalyzer::new(4096).unwrap();
    let before = analyzer.average_spectrum(input.channel(0).unwrap()).unwrap();
    let after = analyzer.average_spectrum(tilted.channel(0).unwrap()).unwrap();

    let band_energy = |spectrum: &[f64], lo: f64, hi: f64| -> f64 {
        spectrum
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                let f = bin_frequency(*i, 4096, SAMPLE_RATE);
                f >= lo && f < hi
            })
            .map(|(_, m)| m * m)
            .sum()
    };

    let high_ratio =
        band_energy(&after, 12000.0, 20000.0) / band_energy(&before, 12000.0, 20000.0);
    let low_ratio = band_energy(&after, 100.0, 1000.0) / band_energy(&before, 100.0, 1000.0);
    assert!(high_ratio < 0.12, "high band ratio {high_ratio}");
    assert!(low_ratio > 0.8);
}
