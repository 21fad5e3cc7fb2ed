//! Signal chain engine
//!
//! Renders a [`ChainSpec`] over a complete buffer:
//!
//! ```text
//! preGain -> low shelf -> high shelf -+-> LP ------> comp -> makeup -+
//!                                     +-> HP -> LP -> comp -> makeup -+-> sum
//!                                     +-> HP ------> comp -> makeup -+
//!
//! sum -> [saturation 4x] -> finalGain -> limiter -> [reverb] -> normalize
//! ```
//!
//! Each request builds its own graph and owns every intermediate buffer, so
//! concurrent renders share nothing and a cancelled render leaves no trace.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use mf_core::{PcmBuffer, Sample};
use mf_dsp::DspResult;
use mf_dsp::biquad::{FilterSpec, apply_filters};
use mf_dsp::convolution::convolve_mix;
use mf_dsp::dynamics::{CompressorSettings, DetectionMode, compress};
use mf_dsp::saturation::{WaveshaperCurve, waveshape};
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult, ReverbUnavailable};
use crate::normalize::normalize;
use crate::spec::{BandSpec, ChainSpec};

/// Limiter ratio
const LIMITER_RATIO: f64 = 20.0;
/// Limiter knee (dB)
const LIMITER_KNEE_DB: f64 = 0.0;

/// Render request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderState {
    /// Not started
    #[default]
    Idle,
    /// Validating the specification and building the graph
    Building,
    /// Running the graph
    Rendering,
    /// Applying the peak ceiling
    Normalizing,
    /// Finished with a buffer
    Done,
    /// Finished without a buffer
    Failed,
}

impl RenderState {
    /// `Done` or `Failed`
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. The engine checks it between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn check(&self) -> ChainResult<()> {
        if self.is_cancelled() {
            Err(ChainError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Source of impulse responses for the reverb stage
pub trait ImpulseResponseProvider: Send + Sync {
    /// Load the impulse response registered under `name`
    fn impulse_response(&self, name: &str) -> Result<PcmBuffer, ReverbUnavailable>;
}

/// Callback receiving every state transition
pub type StateObserver = Arc<dyn Fn(RenderState) + Send + Sync>;

/// Render summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    /// Input peak (dBFS)
    pub input_peak_db: f64,
    /// Peak before normalization (dBFS)
    pub rendered_peak_db: f64,
    /// Output peak (dBFS)
    pub output_peak_db: f64,
    /// Gain applied by the normalizer
    pub normalizer_gain: f64,
    /// Whether the reverb stage ran
    pub reverb_applied: bool,
    /// Non-fatal degradations
    pub warnings: Vec<String>,
}

/// Rendered, normalized buffer with its report
#[derive(Debug, Clone, PartialEq)]
pub struct MasteredBuffer {
    /// Output buffer
    pub buffer: PcmBuffer,
    /// Render summary
    pub report: RenderReport,
}

/// One band path
#[derive(Debug, Clone)]
struct BandGraph {
    filters: Vec<FilterSpec>,
    compressor: CompressorSettings,
    makeup_gain: f64,
}

impl BandGraph {
    fn new(filters: Vec<FilterSpec>, band: &BandSpec) -> Self {
        Self {
            filters,
            compressor: CompressorSettings {
                threshold_db: band.threshold_db,
                knee_db: band.knee_db,
                ratio: band.ratio,
                attack: band.attack,
                release: band.release,
            },
            makeup_gain: band.makeup_gain,
        }
    }

    fn validate(&self, sample_rate: u32) -> DspResult<()> {
        for filter in &self.filters {
            filter.validate(sample_rate)?;
        }
        self.compressor.validate()
    }

    fn process(&self, input: &PcmBuffer) -> DspResult<PcmBuffer> {
        let filtered = apply_filters(input, &self.filters)?;
        let compressed = compress(&filtered, &self.compressor, DetectionMode::PerChannel)?;
        Ok(compressed.scaled(self.makeup_gain))
    }
}

/// Validated processing graph for one sample rate
#[derive(Debug, Clone)]
struct ChainGraph {
    pre_gain: f64,
    pre_eq: [FilterSpec; 2],
    bands: [BandGraph; 3],
    saturation: Option<WaveshaperCurve>,
    final_gain: f64,
    limiter: CompressorSettings,
    reverb: Option<(String, f64)>,
}

impl ChainGraph {
    fn build(spec: &ChainSpec, sample_rate: u32) -> DspResult<Self> {
        spec.validate()?;

        let c = &spec.crossover;
        let eq = &spec.eq;
        let pre_eq = [
            FilterSpec::low_shelf(eq.low_shelf.freq, eq.low_shelf.gain_db),
            FilterSpec::high_shelf(eq.high_shelf.freq, eq.high_shelf.gain_db),
        ];
        for filter in &pre_eq {
            filter.validate(sample_rate)?;
        }

        let bands = [
            BandGraph::new(vec![FilterSpec::lowpass(c.low_pass)], &spec.bands.low),
            BandGraph::new(
                vec![FilterSpec::highpass(c.low_pass), FilterSpec::lowpass(c.high_pass)],
                &spec.bands.mid,
            ),
            BandGraph::new(vec![FilterSpec::highpass(c.high_pass)], &spec.bands.high),
        ];
        for band in &bands {
            band.validate(sample_rate)?;
        }

        let saturation = if spec.saturation.amount > 0.0 {
            Some(WaveshaperCurve::with_default_size(
                spec.saturation.flavor,
                spec.saturation.amount,
            )?)
        } else {
            None
        };

        let limiter = CompressorSettings {
            threshold_db: spec.limiter.threshold_db,
            knee_db: LIMITER_KNEE_DB,
            ratio: LIMITER_RATIO,
            attack: spec.limiter.attack,
            release: spec.limiter.release,
        };
        limiter.validate()?;

        let reverb = spec
            .reverb
            .is_enabled()
            .then(|| (spec.reverb.impulse_response.clone(), spec.reverb.mix));

        Ok(Self {
            pre_gain: spec.pre_gain,
            pre_eq,
            bands,
            saturation,
            final_gain: spec.final_gain,
            limiter,
            reverb,
        })
    }
}

/// Offline mastering renderer.
///
/// Cheap to clone; holds configuration only.
#[derive(Clone, Default)]
pub struct SignalChainEngine {
    impulse_responses: Option<Arc<dyn ImpulseResponseProvider>>,
    cancel: CancelToken,
    observer: Option<StateObserver>,
}

impl SignalChainEngine {
    /// Engine without reverb sources, observer or cancellation
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve reverb impulse responses through `provider`
    pub fn with_impulse_responses(mut self, provider: Arc<dyn ImpulseResponseProvider>) -> Self {
        self.impulse_responses = Some(provider);
        self
    }

    /// Abandon renders when `token` is cancelled
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report state transitions to `observer`
    pub fn with_state_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The engine's cancel token
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Render `input` through `spec`.
    ///
    /// Identical input and specification always give bit-identical output.
    pub fn render(&self, input: &PcmBuffer, spec: &ChainSpec) -> ChainResult<MasteredBuffer> {
        let result = self.run(input, spec);
        match &result {
            Ok(_) => self.notify(RenderState::Done),
            Err(ChainError::Cancelled) => {
                warn!("render cancelled");
                self.notify(RenderState::Failed);
            }
            Err(e) => {
                warn!("render failed: {e}");
                self.notify(RenderState::Failed);
            }
        }
        result
    }

    fn run(&self, input: &PcmBuffer, spec: &ChainSpec) -> ChainResult<MasteredBuffer> {
        let sample_rate = input.sample_rate();
        let mut warnings = Vec::new();

        self.notify(RenderState::Building);
        self.cancel.check()?;
        let graph = ChainGraph::build(spec, sample_rate)?;
        debug!(
            "built chain: {} ch, {} frames @ {sample_rate} Hz",
            input.channel_count(),
            input.frames()
        );

        self.notify(RenderState::Rendering);
        self.cancel.check()?;
        let pre = apply_filters(&input.scaled(graph.pre_gain), &graph.pre_eq)?;

        let [low, mid, high] = &graph.bands;
        let (low, (mid, high)) = rayon::join(
            || self.process_band(low, &pre),
            || {
                rayon::join(
                    || self.process_band(mid, &pre),
                    || self.process_band(high, &pre),
                )
            },
        );
        let mut signal = sum_bands(&low?, &[mid?, high?]);

        if let Some(curve) = &graph.saturation {
            self.cancel.check()?;
            signal = waveshape(&signal, curve, true);
        }

        self.cancel.check()?;
        signal = compress(
            &signal.scaled(graph.final_gain),
            &graph.limiter,
            DetectionMode::Summed,
        )?;

        let mut reverb_applied = false;
        if let Some((name, mix)) = &graph.reverb {
            self.cancel.check()?;
            match self.apply_reverb(&signal, name, *mix) {
                Ok(wet) => {
                    signal = wet;
                    reverb_applied = true;
                }
                Err(e) => {
                    warn!("reverb skipped: {e}");
                    warnings.push(format!("Reverb skipped: {e}"));
                }
            }
        }

        self.notify(RenderState::Normalizing);
        self.cancel.check()?;
        let rendered_peak_db = signal.peak_db();
        let normalized = normalize(&signal);

        let report = RenderReport {
            input_peak_db: input.peak_db(),
            rendered_peak_db,
            output_peak_db: normalized.buffer.peak_db(),
            normalizer_gain: normalized.gain,
            reverb_applied,
            warnings,
        };
        debug!(
            "rendered: peak {:.2} dB -> {:.2} dB (gain {:.4})",
            report.rendered_peak_db, report.output_peak_db, report.normalizer_gain
        );

        Ok(MasteredBuffer {
            buffer: normalized.buffer,
            report,
        })
    }

    fn process_band(&self, band: &BandGraph, input: &PcmBuffer) -> ChainResult<PcmBuffer> {
        self.cancel.check()?;
        Ok(band.process(input)?)
    }

    fn apply_reverb(
        &self,
        signal: &PcmBuffer,
        name: &str,
        mix: f64,
    ) -> Result<PcmBuffer, ReverbUnavailable> {
        let provider = self
            .impulse_responses
            .as_ref()
            .ok_or_else(|| ReverbUnavailable::NotFound(name.to_string()))?;
        let ir = provider.impulse_response(name)?;

        if ir.sample_rate() != signal.sample_rate() {
            return Err(ReverbUnavailable::SampleRateMismatch {
                name: name.to_string(),
                ir_rate: ir.sample_rate(),
                program_rate: signal.sample_rate(),
            });
        }

        convolve_mix(signal, &ir, mix).map_err(|e| ReverbUnavailable::LoadFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn notify(&self, state: RenderState) {
        debug!("render state: {state:?}");
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }
}

impl fmt::Debug for SignalChainEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalChainEngine")
            .field("impulse_responses", &self.impulse_responses.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Sample-wise `low + mid + high`, always added in that order
fn sum_bands(low: &PcmBuffer, rest: &[PcmBuffer]) -> PcmBuffer {
    low.map_channels(|ch, data| {
        let mut sum: Vec<Sample> = data.to_vec();
        for band in rest {
            if let Some(other) = band.channel(ch) {
                for (acc, &s) in sum.iter_mut().zip(other) {
                    *acc += s;
                }
            }
        }
        sum
    })
}
