use super::context::JobContext;
use super::handle::{SchedulerCommand, SchedulerHandle, SharedJobState};
use super::job::{BackgroundJob, ConflictPolicy, JobError, Registration};
use super::retry::RetryPolicy;
use crate::scheduler_store::{JobRunStatus, JobScheduleState, SchedulerStore};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on how long the loop sleeps between schedule evaluations.
const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for in-flight jobs after cancelling them.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs registered jobs approximately once per their interval.
///
/// The schedule position of every job is persisted, so a restart resumes
/// where the previous process left off instead of restarting the cycle.
/// Execution is serialized per job name: a tick never overlaps a
/// still-running instance of the same job.
pub struct JobScheduler {
    /// Shared state accessible through SchedulerHandle.
    shared_state: Arc<RwLock<SharedJobState>>,

    /// In-flight job tasks; each resolves to its job id.
    running_set: JoinSet<String>,

    /// Cancellation tokens for in-flight jobs.
    job_cancel_tokens: HashMap<String, CancellationToken>,

    /// Consecutive failed attempts per job, reset on success.
    retry_counts: HashMap<String, u32>,

    scheduler_store: Arc<dyn SchedulerStore>,
    command_receiver: mpsc::Receiver<SchedulerCommand>,
    shutdown_token: CancellationToken,
    job_context: JobContext,
    retry_policy: RetryPolicy,
}

impl JobScheduler {
    pub fn new(
        scheduler_store: Arc<dyn SchedulerStore>,
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        job_context: JobContext,
        retry_policy: RetryPolicy,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            shared_state,
            running_set: JoinSet::new(),
            job_cancel_tokens: HashMap::new(),
            retry_counts: HashMap::new(),
            scheduler_store,
            command_receiver,
            shutdown_token,
            job_context,
            retry_policy,
        }
    }

    /// Register a job under its id.
    ///
    /// With `ConflictPolicy::Keep`, a job id that is already registered (or
    /// whose schedule survives from a previous process) is left exactly as
    /// it was and `Registration::AlreadyExists` is returned; repeated
    /// registration is a no-op. `ConflictPolicy::Replace` swaps the job
    /// object in and restarts its schedule cycle from now.
    pub async fn register_job(
        &mut self,
        job: Arc<dyn BackgroundJob>,
        policy: ConflictPolicy,
    ) -> Result<Registration> {
        let job_id = job.id().to_string();
        let interval = job.interval();

        {
            let mut state = self.shared_state.write().await;
            if state.jobs.contains_key(&job_id) && policy == ConflictPolicy::Keep {
                debug!("Job {} already registered, keeping existing", job_id);
                return Ok(Registration::AlreadyExists);
            }
            state.jobs.insert(job_id.clone(), job);
        }

        let now = self.job_context.clock.now();
        match policy {
            ConflictPolicy::Keep => match self.scheduler_store.get_schedule_state(&job_id)? {
                Some(existing) => {
                    info!(
                        "Registered job {} with surviving schedule, next run at {}",
                        job_id,
                        existing.next_run_at.to_rfc3339()
                    );
                }
                None => {
                    // First installation of this schedule: due immediately.
                    self.scheduler_store.update_schedule_state(&JobScheduleState {
                        job_id: job_id.clone(),
                        next_run_at: now,
                        last_run_at: None,
                    })?;
                    info!("Registered job {}, first run due now", job_id);
                }
            },
            ConflictPolicy::Replace => {
                self.scheduler_store.update_schedule_state(&JobScheduleState {
                    job_id: job_id.clone(),
                    next_run_at: now + chrono::Duration::from_std(interval).unwrap_or_default(),
                    last_run_at: None,
                })?;
                info!("Registered job {}, schedule restarted", job_id);
            }
        }

        Ok(Registration::Registered)
    }

    pub async fn job_count(&self) -> usize {
        self.shared_state.read().await.jobs.len()
    }

    /// Main scheduler loop. Runs until the shutdown token fires.
    pub async fn run(&mut self) {
        let job_count = self.job_count().await;
        info!("Starting job scheduler with {} registered jobs", job_count);

        // Runs left in `running` by a crashed process can never finish.
        match self
            .scheduler_store
            .mark_stale_runs_failed(self.job_context.clock.now())
        {
            Ok(count) if count > 0 => {
                info!("Marked {} stale runs as failed from previous process", count);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Failed to mark stale runs: {}", e);
            }
        }

        loop {
            let sleep_duration = self.time_until_next_due_job().await;
            debug!("Scheduler sleeping up to {:?}", sleep_duration);

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs().await;
                }
                Some(finished) = self.running_set.join_next(), if !self.running_set.is_empty() => {
                    match finished {
                        Ok(job_id) => {
                            self.job_cancel_tokens.remove(&job_id);
                            self.update_schedule_after_run(&job_id).await;
                        }
                        Err(e) => {
                            error!("Job task failed to join: {}", e);
                        }
                    }
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::TriggerJob { job_id, response } => {
                let result = self.trigger_job(&job_id).await;
                let _ = response.send(result);
            }
        }
    }

    async fn trigger_job(&mut self, job_id: &str) -> Result<(), JobError> {
        {
            let state = self.shared_state.read().await;
            if !state.jobs.contains_key(job_id) {
                return Err(JobError::NotFound);
            }
            if state.running_jobs.contains(job_id) {
                return Err(JobError::AlreadyRunning);
            }
        }

        self.spawn_job(job_id, "manual").await;
        Ok(())
    }

    /// Time until the earliest `next_run_at`, capped at the check interval.
    async fn time_until_next_due_job(&self) -> Duration {
        let mut min_duration = CHECK_INTERVAL;
        let now = self.job_context.clock.now();

        let state = self.shared_state.read().await;
        for job_id in state.jobs.keys() {
            if state.running_jobs.contains(job_id) {
                continue;
            }

            match self.scheduler_store.get_schedule_state(job_id) {
                Ok(Some(schedule)) if schedule.next_run_at > now => {
                    let until = (schedule.next_run_at - now)
                        .to_std()
                        .unwrap_or(Duration::from_secs(1));
                    if until < min_duration {
                        min_duration = until;
                    }
                }
                // Due now, or never scheduled before.
                Ok(_) => return Duration::from_secs(0),
                Err(e) => {
                    warn!("Failed to read schedule state for {}: {}", job_id, e);
                }
            }
        }

        min_duration
    }

    async fn run_due_jobs(&mut self) {
        let now = self.job_context.clock.now();
        let mut due = Vec::new();

        {
            let state = self.shared_state.read().await;
            for job_id in state.jobs.keys() {
                if state.running_jobs.contains(job_id) {
                    continue;
                }
                let is_due = match self.scheduler_store.get_schedule_state(job_id) {
                    Ok(Some(schedule)) => schedule.next_run_at <= now,
                    Ok(None) => true,
                    Err(e) => {
                        warn!("Failed to read schedule state for {}: {}", job_id, e);
                        false
                    }
                };
                if is_due {
                    due.push(job_id.clone());
                }
            }
        }

        for job_id in due {
            let trigger = if self.retry_counts.get(&job_id).copied().unwrap_or(0) > 0 {
                "retry"
            } else {
                "schedule"
            };
            self.spawn_job(&job_id, trigger).await;
        }
    }

    async fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let job = {
            let state = self.shared_state.read().await;
            match state.jobs.get(job_id) {
                Some(job) => Arc::clone(job),
                None => {
                    error!("Attempted to spawn unknown job: {}", job_id);
                    return;
                }
            }
        };

        let now = self.job_context.clock.now();
        let run_id = match self.scheduler_store.record_job_start(job_id, triggered_by, now) {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to record job start for {}: {}", job_id, e);
                return;
            }
        };

        info!(
            "Starting job {} (run_id: {}, triggered_by: {})",
            job_id, run_id, triggered_by
        );

        {
            let mut state = self.shared_state.write().await;
            state.running_jobs.insert(job_id.to_string());
        }

        // Push next_run_at past the interval up front so the loop cannot
        // re-trigger the job while this run is still in flight.
        let next_run = now + chrono::Duration::from_std(job.interval()).unwrap_or_default();
        if let Err(e) = self.scheduler_store.update_schedule_state(&JobScheduleState {
            job_id: job_id.to_string(),
            next_run_at: next_run,
            last_run_at: None,
        }) {
            warn!("Failed to advance schedule state for {}: {}", job_id, e);
        }

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());

        let ctx = JobContext::new(
            cancel_token,
            Arc::clone(&self.job_context.order_store),
            Arc::clone(&self.job_context.clock),
        );

        let scheduler_store = Arc::clone(&self.scheduler_store);
        let clock = Arc::clone(&self.job_context.clock);
        let shared_state = Arc::clone(&self.shared_state);
        let job_id_owned = job_id.to_string();

        self.running_set.spawn(async move {
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            let (status, affected, error_msg) = match result {
                Ok(Ok(outcome)) => {
                    info!(
                        "Job {} completed in {:?}, {} affected",
                        job_id_owned, elapsed, outcome.affected
                    );
                    (JobRunStatus::Completed, Some(outcome.affected), None)
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    (JobRunStatus::Failed, None, Some("Cancelled".to_string()))
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, None, Some(e.to_string()))
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    (JobRunStatus::Failed, None, Some(format!("Task panic: {}", e)))
                }
            };

            if let Err(e) =
                scheduler_store.record_job_finish(run_id, status, affected, error_msg, clock.now())
            {
                error!("Failed to record job finish for {}: {}", job_id_owned, e);
            }

            {
                let mut state = shared_state.write().await;
                state.running_jobs.remove(&job_id_owned);
            }

            job_id_owned
        });
    }

    /// Decide when a job runs next based on how its last run went: a
    /// completed run resumes the regular interval, a failed run schedules a
    /// backoff-spaced retry until the budget runs out.
    async fn update_schedule_after_run(&mut self, job_id: &str) {
        let interval = {
            let state = self.shared_state.read().await;
            match state.jobs.get(job_id) {
                Some(job) => job.interval(),
                None => return,
            }
        };

        let last_run = match self.scheduler_store.get_last_run(job_id) {
            Ok(Some(run)) => run,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to read last run for {}: {}", job_id, e);
                return;
            }
        };

        let now = self.job_context.clock.now();
        let next_run_at = match last_run.status {
            JobRunStatus::Completed => {
                if self.retry_counts.remove(job_id).is_some() {
                    info!("Job {} recovered, back on its regular interval", job_id);
                }
                now + chrono::Duration::from_std(interval).unwrap_or_default()
            }
            JobRunStatus::Failed => {
                let attempts = self.retry_counts.get(job_id).copied().unwrap_or(0);
                if self.retry_policy.should_retry(attempts) {
                    let backoff = self.retry_policy.backoff(attempts);
                    self.retry_counts.insert(job_id.to_string(), attempts + 1);
                    warn!(
                        "Job {} failed, retrying in {:?} (attempt {} of {})",
                        job_id,
                        backoff,
                        attempts + 1,
                        self.retry_policy.max_retries
                    );
                    now + chrono::Duration::from_std(backoff).unwrap_or_default()
                } else {
                    warn!(
                        "Job {} exhausted its retry budget, falling back to regular interval",
                        job_id
                    );
                    self.retry_counts.remove(job_id);
                    now + chrono::Duration::from_std(interval).unwrap_or_default()
                }
            }
            JobRunStatus::Running => return,
        };

        let state = JobScheduleState {
            job_id: job_id.to_string(),
            next_run_at,
            last_run_at: Some(last_run.started_at),
        };
        if let Err(e) = self.scheduler_store.update_schedule_state(&state) {
            error!("Failed to update schedule state for {}: {}", job_id, e);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            debug!("Cancelling job: {}", job_id);
            token.cancel();
        }

        let drain = async {
            while self.running_set.join_next().await.is_some() {}
        };
        if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, drain).await.is_err() {
            warn!("Some jobs did not finish within the shutdown timeout");
            self.running_set.abort_all();
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}

/// Create a scheduler and the handle for interacting with it.
pub fn create_scheduler(
    scheduler_store: Arc<dyn SchedulerStore>,
    shutdown_token: CancellationToken,
    job_context: JobContext,
    retry_policy: RetryPolicy,
) -> (JobScheduler, SchedulerHandle) {
    let (command_tx, command_rx) = mpsc::channel(16);
    let shared_state = Arc::new(RwLock::new(SharedJobState {
        jobs: HashMap::new(),
        running_jobs: HashSet::new(),
    }));

    let scheduler = JobScheduler::new(
        Arc::clone(&scheduler_store),
        command_rx,
        shutdown_token,
        job_context,
        retry_policy,
        Arc::clone(&shared_state),
    );

    let handle = SchedulerHandle::new(command_tx, shared_state, scheduler_store);

    (scheduler, handle)
}
