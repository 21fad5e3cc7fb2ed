//! Render worker pool
//!
//! Jobs run on a dedicated rayon pool, off the caller's thread. Each job
//! streams [`JobEvent`]s on its own channel and delivers one result.
//! `submit_superseding` keeps a single "current" slot: submitting a new job
//! through it cancels the previous one.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use log::{debug, info, warn};
use mf_master::{
    Analyzer, CancelToken, ImpulseResponseProvider, SignalChainEngine, generate_chain_spec,
};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::config::OfflineConfig;
use crate::error::{OfflineError, OfflineResult};
use crate::impulse::ImpulseResponseRegistry;
use crate::job::{JobEvent, JobId, JobOutput, JobRequest, JobStatus, RenderJob};

/// Handle to a submitted job
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    cancel: CancelToken,
    events: Receiver<JobEvent>,
    result: Receiver<OfflineResult<JobOutput>>,
}

impl JobHandle {
    /// Job ID
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Request cancellation; the job ends with [`OfflineError::Cancelled`]
    /// at its next stage boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Progress events, ending with [`JobEvent::Finished`]
    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    /// Result if the job has finished
    pub fn try_result(&self) -> Option<OfflineResult<JobOutput>> {
        match self.result.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_lost())),
        }
    }

    /// Block until the job finishes
    pub fn wait(self) -> OfflineResult<JobOutput> {
        self.result.recv().map_err(|_| worker_lost())?
    }
}

fn worker_lost() -> OfflineError {
    OfflineError::Pool("worker exited without a result".to_string())
}

/// Shared per-job context
struct JobContext {
    impulse_responses: Arc<ImpulseResponseRegistry>,
    default_ai_strength: f64,
    cancel: CancelToken,
    events: Option<Sender<JobEvent>>,
}

impl JobContext {
    fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.events {
            // Receiver may be gone; the job still completes
            let _ = tx.send(event);
        }
    }

    fn check(&self) -> OfflineResult<()> {
        if self.cancel.is_cancelled() {
            Err(OfflineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Offline render worker pool
pub struct RenderPool {
    pool: rayon::ThreadPool,
    config: OfflineConfig,
    impulse_responses: Arc<ImpulseResponseRegistry>,
    current: Mutex<Option<(JobId, CancelToken)>>,
}

impl RenderPool {
    /// Create a pool from configuration
    pub fn new(config: OfflineConfig) -> OfflineResult<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.thread_count)
            .thread_name(|i| format!("mf-render-{i}"))
            .build()
            .map_err(|e| OfflineError::Pool(e.to_string()))?;

        let impulse_responses = Arc::new(match &config.impulse_response_dir {
            Some(dir) => ImpulseResponseRegistry::with_dir(dir),
            None => ImpulseResponseRegistry::new(),
        });

        info!("render pool started with {} threads", pool.current_num_threads());
        Ok(Self {
            pool,
            config,
            impulse_responses,
            current: Mutex::new(None),
        })
    }

    /// Pool configuration
    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// Impulse responses available to every job
    pub fn impulse_responses(&self) -> &Arc<ImpulseResponseRegistry> {
        &self.impulse_responses
    }

    /// Queue a job
    pub fn submit(&self, job: RenderJob) -> JobHandle {
        self.spawn(job, CancelToken::new())
    }

    /// Queue a job, cancelling the previous job submitted this way
    pub fn submit_superseding(&self, job: RenderJob) -> JobHandle {
        let token = CancelToken::new();
        let previous = self.current.lock().replace((job.id, token.clone()));
        if let Some((previous_id, previous)) = previous {
            if !previous.is_cancelled() {
                info!("job {previous_id} superseded by job {}", job.id);
                previous.cancel();
            }
        }
        self.spawn(job, token)
    }

    /// Run one job on the pool and wait for it
    pub fn run(&self, job: &RenderJob) -> OfflineResult<JobOutput> {
        let ctx = self.context(CancelToken::new(), None);
        self.pool.install(|| execute(job, &ctx))
    }

    /// Run jobs in parallel; results are in job order
    pub fn process_all(&self, jobs: &[RenderJob]) -> Vec<OfflineResult<JobOutput>> {
        self.pool.install(|| {
            jobs.par_iter()
                .map(|job| execute(job, &self.context(CancelToken::new(), None)))
                .collect()
        })
    }

    fn context(&self, cancel: CancelToken, events: Option<Sender<JobEvent>>) -> JobContext {
        JobContext {
            impulse_responses: Arc::clone(&self.impulse_responses),
            default_ai_strength: self.config.ai_strength,
            cancel,
            events,
        }
    }

    fn spawn(&self, job: RenderJob, cancel: CancelToken) -> JobHandle {
        let (event_tx, event_rx) = unbounded();
        let (result_tx, result_rx) = bounded(1);
        let id = job.id;
        let ctx = self.context(cancel.clone(), Some(event_tx));

        debug!("queued job {id} ({})", job.name);
        self.pool.spawn(move || {
            let result = execute(&job, &ctx);
            let status = match &result {
                Ok(_) => JobStatus::Completed,
                Err(OfflineError::Cancelled) => JobStatus::Cancelled,
                Err(_) => JobStatus::Failed,
            };
            ctx.emit(JobEvent::Finished { job_id: id, status });
            let _ = result_tx.send(result);
        });

        JobHandle {
            id,
            cancel,
            events: event_rx,
            result: result_rx,
        }
    }
}

impl std::fmt::Debug for RenderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPool")
            .field("threads", &self.pool.current_num_threads())
            .field("config", &self.config)
            .finish()
    }
}

fn execute(job: &RenderJob, ctx: &JobContext) -> OfflineResult<JobOutput> {
    let start = Instant::now();
    let job_id = job.id;
    ctx.emit(JobEvent::Started { job_id });
    ctx.check()?;

    let (analysis, generated, spec) = match &job.request {
        JobRequest::Spec(spec) => (None, None, spec.clone()),
        JobRequest::Preferences {
            preferences,
            candidate,
            ai_strength,
        } => {
            let analyzer = Analyzer::new()?;
            let mut session = analyzer.session(&job.input);
            for progress in session.by_ref() {
                ctx.emit(JobEvent::Analysis { job_id, progress });
                ctx.check()?;
            }
            let report = session.finish()?;

            let generated = generate_chain_spec(
                preferences,
                Some(&report),
                candidate.as_ref(),
                Some(ai_strength.unwrap_or(ctx.default_ai_strength)),
            );
            for w in &generated.warnings {
                warn!("job {job_id}: {w}");
            }
            ctx.emit(JobEvent::Generated {
                job_id,
                notes: generated.notes.clone(),
                warnings: generated.warnings.clone(),
            });
            let spec = generated.spec.clone();
            (Some(report), Some(generated), spec)
        }
    };
    ctx.check()?;

    let provider: Arc<dyn ImpulseResponseProvider> = ctx.impulse_responses.clone();
    let mut engine = SignalChainEngine::new()
        .with_impulse_responses(provider)
        .with_cancel_token(ctx.cancel.clone());
    if let Some(tx) = ctx.events.clone() {
        engine = engine.with_state_observer(Arc::new(move |state| {
            let _ = tx.send(JobEvent::Render { job_id, state });
        }));
    }

    let mastered = engine.render(&job.input, &spec)?;
    let duration = start.elapsed();
    info!(
        "job {job_id} ({}) rendered in {:.2}s, peak {:.2} dBFS",
        job.name,
        duration.as_secs_f64(),
        mastered.report.output_peak_db
    );

    Ok(JobOutput {
        job_id,
        analysis,
        generated,
        spec,
        mastered,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::PcmBuffer;
    use mf_master::normalize::target_ceiling;
    use mf_master::{ChainSpec, MasteringPreferences, RenderState};

    fn tone(secs: f64) -> PcmBuffer {
        let n = (44100.0 * secs) as usize;
        let samples: Vec<f64> = (0..n)
            .map(|i| 0.9 * (i as f64 * 2.0 * std::f64::consts::PI * 220.0 / 44100.0).sin())
            .collect();
        PcmBuffer::new(44100, vec![samples.clone(), samples]).unwrap()
    }

    fn pool() -> RenderPool {
        RenderPool::new(OfflineConfig::default().with_threads(2)).unwrap()
    }

    #[test]
    fn test_spec_job_completes_with_events() {
        let pool = pool();
        let handle = pool.submit(RenderJob::with_spec(tone(0.2), ChainSpec::baseline()));
        let id = handle.id();
        let events: Vec<JobEvent> = handle.events().clone().into_iter().collect::<Vec<_>>();
        let output = handle.wait().unwrap();

        assert_eq!(output.job_id, id);
        assert!(output.analysis.is_none());
        assert!(output.mastered.buffer.peak() <= target_ceiling());

        assert_eq!(events.first(), Some(&JobEvent::Started { job_id: id }));
        assert!(events.contains(&JobEvent::Render {
            job_id: id,
            state: RenderState::Done
        }));
        assert_eq!(
            events.last(),
            Some(&JobEvent::Finished {
                job_id: id,
                status: JobStatus::Completed
            })
        );
    }

    #[test]
    fn test_preference_job_analyzes_and_generates() {
        let pool = pool();
        let handle = pool.submit(RenderJob::with_preferences(
            tone(0.5),
            MasteringPreferences::default(),
        ));
        let events: Vec<JobEvent> = handle.events().clone().into_iter().collect();
        let output = handle.wait().unwrap();

        assert!(output.analysis.is_some());
        assert_eq!(output.generated.as_ref().map(|g| &g.spec), Some(&output.spec));
        assert!(events.iter().any(|e| matches!(e, JobEvent::Analysis { .. })));
        assert!(events.iter().any(|e| matches!(e, JobEvent::Generated { .. })));
    }

    #[test]
    fn test_invalid_spec_fails() {
        let mut spec = ChainSpec::baseline();
        spec.limiter.attack = 0.0;
        let output = pool().run(&RenderJob::with_spec(tone(0.1), spec));
        assert!(matches!(output, Err(OfflineError::Render(_))));
    }

    #[test]
    fn test_superseded_job_is_cancelled() {
        let pool = RenderPool::new(OfflineConfig::default().with_threads(1)).unwrap();
        let first = pool.submit_superseding(RenderJob::with_preferences(
            tone(20.0),
            MasteringPreferences::default(),
        ));
        let second = pool.submit_superseding(RenderJob::with_spec(tone(0.1), ChainSpec::baseline()));

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(matches!(first.wait(), Err(OfflineError::Cancelled)));
        assert!(second.wait().is_ok());
    }

    #[test]
    fn test_process_all_keeps_order() {
        let jobs: Vec<RenderJob> = [0.05, 0.1, 0.15]
            .into_iter()
            .map(|secs| RenderJob::with_spec(tone(secs), ChainSpec::baseline()))
            .collect();
        let results = pool().process_all(&jobs);
        for (job, result) in jobs.iter().zip(results) {
            let output = result.unwrap();
            assert_eq!(output.job_id, job.id);
            assert_eq!(output.mastered.buffer.frames(), job.input.frames());
        }
    }

    #[test]
    fn test_registered_reverb_is_used() {
        let pool = pool();
        pool.impulse_responses()
            .register("plate", PcmBuffer::mono(44100, vec![1.0, 0.0, 0.3]).unwrap());

        let mut spec = ChainSpec::baseline();
        spec.reverb.impulse_response = "plate".to_string();
        spec.reverb.mix = 0.25;
        let output = pool.run(&RenderJob::with_spec(tone(0.1), spec)).unwrap();
        assert!(output.mastered.report.reverb_applied);
    }
}
