//! Offline render job definitions

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mf_core::PcmBuffer;
use mf_master::analysis::PhaseProgress;
use mf_master::{
    AnalysisReport, ChainSpec, ChainSpecCandidate, GeneratedSpec, MasteredBuffer,
    MasteringPreferences, RenderState,
};
use serde::{Deserialize, Serialize};

/// Unique job identifier
pub type JobId = u64;

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Where a job's chain specification comes from
#[derive(Debug, Clone)]
pub enum JobRequest {
    /// Render this specification as given
    Spec(ChainSpec),
    /// Analyze the input, generate a specification, then render
    Preferences {
        /// Mastering preferences
        preferences: MasteringPreferences,
        /// External candidate to blend in
        candidate: Option<ChainSpecCandidate>,
        /// Blend strength (pool default when `None`)
        ai_strength: Option<f64>,
    },
}

/// One render request
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Unique job ID
    pub id: JobId,
    /// Display name
    pub name: String,
    /// Input audio, shared read-only
    pub input: Arc<PcmBuffer>,
    /// Specification source
    pub request: JobRequest,
}

impl RenderJob {
    fn new(input: impl Into<Arc<PcmBuffer>>, request: JobRequest) -> Self {
        let id = JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            name: format!("Job {id}"),
            input: input.into(),
            request,
        }
    }

    /// Render `spec` over `input`
    pub fn with_spec(input: impl Into<Arc<PcmBuffer>>, spec: ChainSpec) -> Self {
        Self::new(input, JobRequest::Spec(spec))
    }

    /// Analyze, generate from `preferences` and render
    pub fn with_preferences(
        input: impl Into<Arc<PcmBuffer>>,
        preferences: MasteringPreferences,
    ) -> Self {
        Self::new(
            input,
            JobRequest::Preferences {
                preferences,
                candidate: None,
                ai_strength: None,
            },
        )
    }

    /// Attach an AI candidate (only meaningful for preference jobs)
    pub fn candidate(mut self, candidate: ChainSpecCandidate, strength: Option<f64>) -> Self {
        if let JobRequest::Preferences {
            candidate: slot,
            ai_strength,
            ..
        } = &mut self.request
        {
            *slot = Some(candidate);
            *ai_strength = strength;
        }
        self
    }

    /// Set display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    /// Waiting in queue
    Pending,
    /// Currently processing
    Running,
    /// Completed successfully
    Completed,
    /// Failed with error
    Failed,
    /// Cancelled or superseded
    Cancelled,
}

/// Progress stream item
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Picked up by a worker
    Started { job_id: JobId },
    /// Analysis advanced
    Analysis {
        job_id: JobId,
        progress: PhaseProgress,
    },
    /// Specification generated
    Generated {
        job_id: JobId,
        notes: Vec<String>,
        warnings: Vec<String>,
    },
    /// Render state changed
    Render { job_id: JobId, state: RenderState },
    /// Terminal status
    Finished { job_id: JobId, status: JobStatus },
}

impl JobEvent {
    /// Job this event belongs to
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Started { job_id }
            | Self::Analysis { job_id, .. }
            | Self::Generated { job_id, .. }
            | Self::Render { job_id, .. }
            | Self::Finished { job_id, .. } => *job_id,
        }
    }
}

/// Successful job result
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// Job ID
    pub job_id: JobId,
    /// Source analysis (preference jobs only)
    pub analysis: Option<AnalysisReport>,
    /// Generation result (preference jobs only)
    pub generated: Option<GeneratedSpec>,
    /// Specification that was rendered
    pub spec: ChainSpec,
    /// Rendered audio and render report
    pub mastered: MasteredBuffer,
    /// Processing duration
    pub duration: Duration,
}
