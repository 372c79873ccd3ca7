//! SQLite schema for the scheduler database: job run history and persisted
//! schedule state.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const JOB_RUNS_TABLE_V1: Table = Table {
    name: "job_runs",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("job_id", SqlType::Text, non_null = true),
        sqlite_column!("started_at", SqlType::Text, non_null = true),
        sqlite_column!("finished_at", SqlType::Text),
        sqlite_column!("status", SqlType::Text, non_null = true),
        sqlite_column!("affected", SqlType::Integer),
        sqlite_column!("error_message", SqlType::Text),
        sqlite_column!("triggered_by", SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_job_runs_job_id_started", "job_id, started_at DESC"),
        ("idx_job_runs_status", "status"),
    ],
};

const JOB_SCHEDULES_TABLE_V1: Table = Table {
    name: "job_schedules",
    columns: &[
        sqlite_column!("job_id", SqlType::Text, is_primary_key = true),
        sqlite_column!("next_run_at", SqlType::Text, non_null = true),
        sqlite_column!("last_run_at", SqlType::Text),
    ],
    indices: &[],
};

pub const SCHEDULER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[JOB_RUNS_TABLE_V1, JOB_SCHEDULES_TABLE_V1],
    migration: None,
}];
