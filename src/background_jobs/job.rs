use super::context::JobContext;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a successful job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOutcome {
    /// Number of entities the run mutated.
    pub affected: usize,
}

impl JobOutcome {
    pub fn affected(affected: usize) -> Self {
        Self { affected }
    }
}

/// Errors in the job lifecycle.
///
/// Execution has no fatal class: anything that goes wrong inside a run is
/// `Retryable` and the scheduler re-invokes on its backoff, or `Cancelled`
/// because the process is shutting down. `NotFound` and `AlreadyRunning`
/// only arise from handle-level operations (manual triggering).
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found")]
    NotFound,
    #[error("Job is already running")]
    AlreadyRunning,
    #[error("Retryable failure: {0}")]
    Retryable(String),
    #[error("Job was cancelled")]
    Cancelled,
}

/// How to resolve registering a job name that is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Keep the existing registration and its persisted schedule; the new
    /// registration is discarded. Makes registration idempotent across
    /// launches.
    #[default]
    Keep,
    /// Replace the job object and restart its schedule from now.
    Replace,
}

/// Which branch a registration took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    AlreadyExists,
}

/// A unit of periodic background work.
///
/// Jobs are executed synchronously on the blocking pool. A run must be
/// bounded and idempotent: re-running over already-processed entities has to
/// be a no-op, since the scheduler only promises approximate periodicity.
pub trait BackgroundJob: Send + Sync {
    /// Unique, stable name; also the scheduling key.
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// What this job does.
    fn description(&self) -> &'static str;

    /// Target interval between scheduled runs.
    fn interval(&self) -> Duration;

    /// Execute one run.
    ///
    /// Implementations should check `ctx.is_cancelled()` between units of
    /// work and return `JobError::Cancelled` when shutdown is in progress.
    fn execute(&self, ctx: &JobContext) -> Result<JobOutcome, JobError>;
}
