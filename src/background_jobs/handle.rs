use super::job::{BackgroundJob, JobError};
use crate::scheduler_store::{JobRun, SchedulerStore};
use anyhow::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Information about a registered job.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub interval_secs: u64,
    pub is_running: bool,
    pub last_run: Option<JobRunInfo>,
    pub next_run_at: Option<String>,
}

/// Serializable job run information.
#[derive(Debug, Clone, Serialize)]
pub struct JobRunInfo {
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub affected: Option<usize>,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

impl From<JobRun> for JobRunInfo {
    fn from(run: JobRun) -> Self {
        JobRunInfo {
            started_at: run.started_at.to_rfc3339(),
            finished_at: run.finished_at.map(|dt| dt.to_rfc3339()),
            status: run.status.as_str().to_string(),
            affected: run.affected,
            error_message: run.error_message,
            triggered_by: run.triggered_by,
        }
    }
}

/// Command sent to the scheduler loop.
pub enum SchedulerCommand {
    TriggerJob {
        job_id: String,
        response: oneshot::Sender<Result<(), JobError>>,
    },
}

/// State shared between the scheduler loop and its handle.
pub struct SharedJobState {
    /// Registered jobs by id.
    pub jobs: HashMap<String, Arc<dyn BackgroundJob>>,
    /// Ids of jobs currently in flight.
    pub running_jobs: HashSet<String>,
}

/// Handle for interacting with the scheduler from outside its loop.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    shared_state: Arc<RwLock<SharedJobState>>,
    scheduler_store: Arc<dyn SchedulerStore>,
}

impl SchedulerHandle {
    pub fn new(
        command_tx: mpsc::Sender<SchedulerCommand>,
        shared_state: Arc<RwLock<SharedJobState>>,
        scheduler_store: Arc<dyn SchedulerStore>,
    ) -> Self {
        Self {
            command_tx,
            shared_state,
            scheduler_store,
        }
    }

    /// Information about all registered jobs, sorted by id.
    pub async fn list_jobs(&self) -> Result<Vec<JobInfo>> {
        let state = self.shared_state.read().await;
        let mut jobs = Vec::new();

        for (job_id, job) in &state.jobs {
            jobs.push(self.job_info(job_id, job, &state)?);
        }

        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    /// Information about a specific job.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobInfo>> {
        let state = self.shared_state.read().await;
        match state.jobs.get(job_id) {
            Some(job) => Ok(Some(self.job_info(job_id, job, &state)?)),
            None => Ok(None),
        }
    }

    fn job_info(
        &self,
        job_id: &str,
        job: &Arc<dyn BackgroundJob>,
        state: &SharedJobState,
    ) -> Result<JobInfo> {
        let last_run = self
            .scheduler_store
            .get_last_run(job_id)?
            .map(JobRunInfo::from);
        let next_run_at = self
            .scheduler_store
            .get_schedule_state(job_id)?
            .map(|s| s.next_run_at.to_rfc3339());

        Ok(JobInfo {
            id: job_id.to_string(),
            name: job.name().to_string(),
            description: job.description().to_string(),
            interval_secs: job.interval().as_secs(),
            is_running: state.running_jobs.contains(job_id),
            last_run,
            next_run_at,
        })
    }

    /// Trigger a job outside its schedule.
    pub async fn trigger_job(&self, job_id: &str) -> Result<(), JobError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::TriggerJob {
                job_id: job_id.to_string(),
                response: response_tx,
            })
            .await
            .map_err(|_| JobError::Retryable("Scheduler not available".to_string()))?;

        response_rx
            .await
            .map_err(|_| JobError::Retryable("Scheduler did not respond".to_string()))?
    }

    /// Most recent runs of a job, newest first.
    pub fn get_job_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRunInfo>> {
        let history = self.scheduler_store.get_job_history(job_id, limit)?;
        Ok(history.into_iter().map(JobRunInfo::from).collect())
    }

    pub async fn is_job_running(&self, job_id: &str) -> bool {
        let state = self.shared_state.read().await;
        state.running_jobs.contains(job_id)
    }

    pub async fn job_exists(&self, job_id: &str) -> bool {
        let state = self.shared_state.read().await;
        state.jobs.contains_key(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler_store::JobRunStatus;
    use chrono::Utc;

    #[test]
    fn test_job_run_info_from_completed_run() {
        let now = Utc::now();
        let run = JobRun {
            id: 1,
            job_id: "auto_cancel_orders".to_string(),
            started_at: now,
            finished_at: Some(now + chrono::Duration::seconds(3)),
            status: JobRunStatus::Completed,
            affected: Some(2),
            error_message: None,
            triggered_by: "schedule".to_string(),
        };

        let info: JobRunInfo = run.into();

        assert_eq!(info.status, "completed");
        assert_eq!(info.affected, Some(2));
        assert!(info.error_message.is_none());
        assert_eq!(info.triggered_by, "schedule");
        assert!(info.finished_at.is_some());
        // RFC3339
        assert!(info.started_at.contains('T'));
    }

    #[test]
    fn test_job_run_info_from_failed_run() {
        let now = Utc::now();
        let run = JobRun {
            id: 2,
            job_id: "auto_cancel_orders".to_string(),
            started_at: now,
            finished_at: Some(now),
            status: JobRunStatus::Failed,
            affected: None,
            error_message: Some("database locked".to_string()),
            triggered_by: "retry".to_string(),
        };

        let info: JobRunInfo = run.into();

        assert_eq!(info.status, "failed");
        assert!(info.affected.is_none());
        assert_eq!(info.error_message, Some("database locked".to_string()));
        assert_eq!(info.triggered_by, "retry");
    }

    #[test]
    fn test_job_run_info_from_running_run() {
        let run = JobRun {
            id: 3,
            job_id: "auto_cancel_orders".to_string(),
            started_at: Utc::now(),
            finished_at: None,
            status: JobRunStatus::Running,
            affected: None,
            error_message: None,
            triggered_by: "manual".to_string(),
        };

        let info: JobRunInfo = run.into();

        assert_eq!(info.status, "running");
        assert!(info.finished_at.is_none());
    }
}
