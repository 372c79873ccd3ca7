mod models;
mod schema;
mod sqlite_scheduler_store;

pub use models::{JobRun, JobRunStatus, JobScheduleState};
pub use schema::SCHEDULER_VERSIONED_SCHEMAS;
pub use sqlite_scheduler_store::SqliteSchedulerStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Persistence boundary for the job scheduler: run history and the schedule
/// state that makes registration restart-safe.
pub trait SchedulerStore: Send + Sync {
    fn record_job_start(
        &self,
        job_id: &str,
        triggered_by: &str,
        now: DateTime<Utc>,
    ) -> Result<i64>;

    fn record_job_finish(
        &self,
        run_id: i64,
        status: JobRunStatus,
        affected: Option<usize>,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Most recent runs of a job, newest first.
    fn get_job_history(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>>;

    fn get_last_run(&self, job_id: &str) -> Result<Option<JobRun>>;

    /// Mark runs left in `running` by a crashed process as failed.
    /// Returns the number of runs marked.
    fn mark_stale_runs_failed(&self, now: DateTime<Utc>) -> Result<usize>;

    fn get_schedule_state(&self, job_id: &str) -> Result<Option<JobScheduleState>>;

    fn update_schedule_state(&self, state: &JobScheduleState) -> Result<()>;
}
