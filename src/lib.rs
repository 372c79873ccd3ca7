//! Tiffin Order Server Library
//!
//! Core engine of the Tiffin consumer ordering app: the time-driven order
//! lifecycle (periodic auto-cancellation of stale pending orders), the
//! session-validity monitor, and the read-only region table. The
//! presentation layer and the hosted document store live elsewhere and
//! consume this crate through its store traits and the session boundary.

pub mod background_jobs;
pub mod clock;
pub mod config;
pub mod regions;
pub mod scheduler_store;
pub mod session;
pub mod sqlite_persistence;
pub mod store;

// Re-export commonly used types for convenience
pub use background_jobs::{
    create_scheduler, BackgroundJob, ConflictPolicy, JobContext, JobError, JobOutcome,
    Registration, RetryPolicy, SchedulerHandle,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use regions::RegionTable;
pub use scheduler_store::{SchedulerStore, SqliteSchedulerStore};
pub use session::{SessionCheck, SessionMonitor, SessionUser, UserRole};
pub use store::{MemoryOrderStore, Order, OrderStatus, OrderStore, SqliteOrderStore};
