//! Audio analysis for mastering decisions
//!
//! Features:
//! - Level analysis (RMS, peak, peak-to-RMS dynamic range)
//! - Spectral balance over low / mid / high bands
//! - K-weighted loudness (momentary, short-term, integrated)
//! - Distribution statistics (crest, spectral flatness, excess kurtosis)
//!
//! Mono-equivalent metrics use the first channel. Work is split into phases
//! that [`Analyzer::session`] exposes as a lazy progress sequence; the report
//! does not depend on how the sequence is stepped.

use log::debug;
use mf_core::{PcmBuffer, SILENCE_DB, Sample};
use mf_dsp::DspResult;
use mf_dsp::analysis::{DEFAULT_FFT_SIZE, SpectrumAnalyzer, bin_frequency};
use mf_dsp::biquad::{FilterSpec, apply_filters};
use serde::{Deserialize, Serialize};

/// Guard added to the RMS in the dynamic range ratio
const RMS_EPSILON: f64 = 1e-10;

/// Spectral band edges (Hz)
const LOW_BAND: (f64, f64) = (20.0, 200.0);
const MID_BAND: (f64, f64) = (200.0, 2000.0);
const HIGH_BAND: (f64, f64) = (2000.0, 20000.0);

/// Momentary loudness window (s)
const MOMENTARY_WINDOW: f64 = 0.4;
/// Short-term loudness window (s)
const SHORT_TERM_WINDOW: f64 = 3.0;
/// Hop between loudness windows (s)
const LOUDNESS_HOP: f64 = 0.1;

/// Frames consumed per spectrum progress step
const FRAMES_PER_STEP: usize = 16;

/// Low/mid/high energy fractions, summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralBalance {
    /// 20-200 Hz
    pub low: f64,
    /// 200 Hz - 2 kHz
    pub mid: f64,
    /// 2-20 kHz
    pub high: f64,
}

impl SpectralBalance {
    /// Equal thirds, reported for buffers without energy
    pub const NEUTRAL: SpectralBalance = SpectralBalance {
        low: 1.0 / 3.0,
        mid: 1.0 / 3.0,
        high: 1.0 / 3.0,
    };
}

/// Loudness estimates (LUFS-like)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoudnessReport {
    /// Loudest 400 ms window
    pub momentary: f64,
    /// Loudest 3 s window
    pub short_term: f64,
    /// Whole buffer
    pub integrated: f64,
}

/// Amplitude distribution statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicsReport {
    /// Peak / RMS (linear)
    pub crest: f64,
    /// Spectral flatness (0 = tonal, 1 = noise-like)
    pub flatness: f64,
    /// Excess kurtosis of the sample distribution
    pub kurtosis: f64,
}

/// Analysis of one buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// RMS (linear)
    pub rms: f64,
    /// Absolute peak (linear)
    pub peak: f64,
    /// `20·log10(peak / rms)` (dB)
    pub dynamic_range: f64,
    /// Spectral balance
    pub spectral_balance: SpectralBalance,
    /// Loudness
    pub loudness: LoudnessReport,
    /// Dynamics
    pub dynamics: DynamicsReport,
}

/// Analysis phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisPhase {
    /// RMS / peak / dynamic range
    Levels,
    /// Averaged FFT, balance and flatness
    Spectrum,
    /// K-weighted loudness windows
    Loudness,
    /// Distribution statistics
    Dynamics,
}

/// One step of an analysis session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseProgress {
    /// Phase that just advanced
    pub phase: AnalysisPhase,
    /// Overall completion (0-1)
    pub fraction_complete: f64,
}

/// Stateless analyzer; reusable across buffers and threads
#[derive(Debug)]
pub struct Analyzer {
    spectrum: SpectrumAnalyzer,
}

impl Analyzer {
    /// Analyzer with the default frame length
    pub fn new() -> DspResult<Self> {
        Self::with_fft_size(DEFAULT_FFT_SIZE)
    }

    /// Analyzer with an explicit power-of-two frame length
    pub fn with_fft_size(fft_size: usize) -> DspResult<Self> {
        Ok(Self {
            spectrum: SpectrumAnalyzer::new(fft_size)?,
        })
    }

    /// Analyze `buffer` in one go
    pub fn analyze(&self, buffer: &PcmBuffer) -> DspResult<AnalysisReport> {
        self.session(buffer).finish()
    }

    /// Start a phase-by-phase analysis of `buffer`
    pub fn session<'a>(&'a self, buffer: &'a PcmBuffer) -> AnalysisSession<'a> {
        AnalysisSession::new(self, buffer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Levels,
    Spectrum { next_frame: usize },
    Loudness,
    Dynamics,
    Finished,
}

/// Lazy, phase-reporting analysis of one buffer.
///
/// Iterate to advance; call [`AnalysisSession::finish`] to run any remaining
/// phases and take the report.
#[derive(Debug)]
pub struct AnalysisSession<'a> {
    analyzer: &'a Analyzer,
    buffer: &'a PcmBuffer,
    step: Step,
    steps_done: usize,
    total_steps: usize,
    total_frames: usize,

    rms: f64,
    peak: f64,
    spectrum_sum: Vec<f64>,
    spectrum: Vec<f64>,
    loudness: Option<LoudnessReport>,
    report: Option<AnalysisReport>,
    error: Option<mf_dsp::DspError>,
}

impl<'a> AnalysisSession<'a> {
    fn new(analyzer: &'a Analyzer, buffer: &'a PcmBuffer) -> Self {
        let total_frames = analyzer.spectrum.frame_count(buffer.frames());
        let spectrum_steps = total_frames.div_ceil(FRAMES_PER_STEP);

        Self {
            analyzer,
            buffer,
            step: Step::Levels,
            steps_done: 0,
            total_steps: spectrum_steps + 3,
            total_frames,
            rms: 0.0,
            peak: 0.0,
            spectrum_sum: vec![0.0; analyzer.spectrum.bin_count()],
            spectrum: Vec::new(),
            loudness: None,
            report: None,
            error: None,
        }
    }

    fn mono(&self) -> &'a [Sample] {
        self.buffer.channel(0).unwrap_or_default()
    }

    /// Run all remaining phases and return the report
    pub fn finish(mut self) -> DspResult<AnalysisReport> {
        while self.next().is_some() {}

        if let Some(err) = self.error.take() {
            return Err(err);
        }
        match self.report.take() {
            Some(report) => Ok(report),
            // Unreachable: the iterator only stops after the report or an error
            None => Err(mf_dsp::DspError::InvalidParameter(
                "analysis ended without a report".into(),
            )),
        }
    }

    fn progress(&mut self, phase: AnalysisPhase) -> PhaseProgress {
        self.steps_done += 1;
        PhaseProgress {
            phase,
            fraction_complete: self.steps_done as f64 / self.total_steps as f64,
        }
    }

    fn run_levels(&mut self) {
        let mono = self.mono();
        self.rms = rms(mono);
        self.peak = mono.iter().fold(0.0, |p: f64, s| p.max(s.abs()));
    }

    /// Accumulate up to `FRAMES_PER_STEP` frames; returns the next frame index
    fn run_spectrum(&mut self, first: usize) -> DspResult<usize> {
        let mono = self.mono();
        let hop = self.analyzer.spectrum.hop_size();
        let last = (first + FRAMES_PER_STEP).min(self.total_frames);

        for frame in first..last {
            let magnitudes = self.analyzer.spectrum.frame_spectrum(mono, frame * hop)?;
            for (acc, m) in self.spectrum_sum.iter_mut().zip(&magnitudes) {
                *acc += m;
            }
        }

        if last == self.total_frames {
            let scale = 1.0 / self.total_frames as f64;
            self.spectrum = self.spectrum_sum.iter().map(|s| s * scale).collect();
        }
        Ok(last)
    }

    fn run_loudness(&mut self) -> DspResult<()> {
        self.loudness = Some(measure_loudness(self.buffer)?);
        Ok(())
    }

    fn run_dynamics(&mut self) {
        let mono = self.mono();
        let sample_rate = self.buffer.sample_rate();
        let fft_size = self.analyzer.spectrum.fft_size();

        let crest = if self.rms > 0.0 { self.peak / self.rms } else { 0.0 };
        let dynamic_range = if self.peak > 0.0 {
            20.0 * (self.peak / (self.rms + RMS_EPSILON)).log10()
        } else {
            0.0
        };

        let report = AnalysisReport {
            rms: self.rms,
            peak: self.peak,
            dynamic_range,
            spectral_balance: spectral_balance(&self.spectrum, fft_size, sample_rate),
            loudness: self.loudness.unwrap_or(LoudnessReport {
                momentary: SILENCE_DB,
                short_term: SILENCE_DB,
                integrated: SILENCE_DB,
            }),
            dynamics: DynamicsReport {
                crest,
                flatness: spectral_flatness(&self.spectrum),
                kurtosis: excess_kurtosis(mono),
            },
        };

        debug!(
            "analysis: rms={:.4} peak={:.4} dr={:.2} dB integrated={:.2} LUFS",
            report.rms, report.peak, report.dynamic_range, report.loudness.integrated
        );
        self.report = Some(report);
    }
}

impl Iterator for AnalysisSession<'_> {
    type Item = PhaseProgress;

    fn next(&mut self) -> Option<PhaseProgress> {
        if self.error.is_some() {
            return None;
        }

        match self.step {
            Step::Levels => {
                self.run_levels();
                self.step = Step::Spectrum { next_frame: 0 };
                Some(self.progress(AnalysisPhase::Levels))
            }
            Step::Spectrum { next_frame } => match self.run_spectrum(next_frame) {
                Ok(next) => {
                    self.step = if next >= self.total_frames {
                        Step::Loudness
                    } else {
                        Step::Spectrum { next_frame: next }
                    };
                    Some(self.progress(AnalysisPhase::Spectrum))
                }
                Err(e) => {
                    self.error = Some(e);
                    None
                }
            },
            Step::Loudness => match self.run_loudness() {
                Ok(()) => {
                    self.step = Step::Dynamics;
                    Some(self.progress(AnalysisPhase::Loudness))
                }
                Err(e) => {
                    self.error = Some(e);
                    None
                }
            },
            Step::Dynamics => {
                self.run_dynamics();
                self.step = Step::Finished;
                Some(self.progress(AnalysisPhase::Dynamics))
            }
            Step::Finished => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METRICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Root mean square; 0 for empty input
pub fn rms(samples: &[Sample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Energy fractions of the three bands of an averaged magnitude spectrum
pub fn spectral_balance(spectrum: &[f64], fft_size: usize, sample_rate: u32) -> SpectralBalance {
    let band_energy = |(lo, hi): (f64, f64)| -> f64 {
        spectrum
            .iter()
            .enumerate()
            .filter(|(bin, _)| {
                let freq = bin_frequency(*bin, fft_size, sample_rate);
                freq >= lo && freq < hi
            })
            .map(|(_, m)| m * m)
            .sum()
    };

    let low = band_energy(LOW_BAND);
    let mid = band_energy(MID_BAND);
    let high = band_energy(HIGH_BAND);
    let total = low + mid + high;

    if total > 1e-20 {
        SpectralBalance {
            low: low / total,
            mid: mid / total,
            high: high / total,
        }
    } else {
        SpectralBalance::NEUTRAL
    }
}

/// Geometric over arithmetic mean of the magnitudes (Wiener entropy)
pub fn spectral_flatness(spectrum: &[f64]) -> f64 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let n = spectrum.len() as f64;
    let mut log_sum = 0.0;
    let mut sum = 0.0;
    for &mag in spectrum {
        let val = mag.max(1e-10);
        log_sum += val.ln();
        sum += val;
    }

    let arithmetic_mean = sum / n;
    if arithmetic_mean > 1e-10 {
        ((log_sum / n).exp() / arithmetic_mean).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Fourth standardized moment minus 3; 0 for constant input
pub fn excess_kurtosis(samples: &[Sample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let (m2, m4) = samples.iter().fold((0.0, 0.0), |(m2, m4), s| {
        let d = s - mean;
        let d2 = d * d;
        (m2 + d2, m4 + d2 * d2)
    });
    let m2 = m2 / n;
    let m4 = m4 / n;

    if m2 > 1e-20 { m4 / (m2 * m2) - 3.0 } else { 0.0 }
}

/// `-0.691 + 10·log10(mean square)`, floored at the silence level
fn lufs(mean_square: f64) -> f64 {
    if mean_square > 1e-20 {
        (-0.691 + 10.0 * mean_square.log10()).max(SILENCE_DB)
    } else {
        SILENCE_DB
    }
}

/// Simplified K-weighting: +4 dB shelf above 1.5 kHz, highpass at 38 Hz.
/// Every channel is weighted on its own. Rates too low for the shelf are
/// measured unweighted.
fn k_weighted(buffer: &PcmBuffer) -> DspResult<PcmBuffer> {
    let filters = [
        FilterSpec::high_shelf(1500.0, 4.0),
        FilterSpec::highpass(38.0).with_q(0.5),
    ];
    if filters.iter().any(|f| f.validate(buffer.sample_rate()).is_err()) {
        debug!("K-weighting skipped at {} Hz", buffer.sample_rate());
        return Ok(buffer.clone());
    }
    apply_filters(buffer, &filters)
}

/// Per-sample energy summed over channels
fn channel_energy(weighted: &PcmBuffer) -> Vec<f64> {
    let mut energy = vec![0.0; weighted.frames()];
    for channel in weighted.channels() {
        for (e, s) in energy.iter_mut().zip(channel) {
            *e += s * s;
        }
    }
    energy
}

/// Loudest mean square over windows of `window` samples, `hop` apart.
/// A buffer shorter than the window is measured whole.
fn max_window_mean_square(prefix: &[f64], window: usize, hop: usize) -> f64 {
    let len = prefix.len() - 1;
    if len == 0 {
        return 0.0;
    }
    if window >= len {
        return prefix[len] / len as f64;
    }

    (0..=len - window)
        .step_by(hop.max(1))
        .map(|start| (prefix[start + window] - prefix[start]) / window as f64)
        .fold(0.0, f64::max)
}

fn measure_loudness(buffer: &PcmBuffer) -> DspResult<LoudnessReport> {
    let energy = channel_energy(&k_weighted(buffer)?);
    let sr = buffer.sample_rate() as f64;

    let mut prefix = Vec::with_capacity(energy.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for e in &energy {
        acc += e;
        prefix.push(acc);
    }

    let hop = (LOUDNESS_HOP * sr) as usize;
    let momentary = max_window_mean_square(&prefix, (MOMENTARY_WINDOW * sr) as usize, hop);
    let short_term = max_window_mean_square(&prefix, (SHORT_TERM_WINDOW * sr) as usize, hop);
    let integrated = if energy.is_empty() {
        0.0
    } else {
        acc / energy.len() as f64
    };

    Ok(LoudnessReport {
        momentary: lufs(momentary),
        short_term: lufs(short_term),
        integrated: lufs(integrated),
    })
}
