//! Auto-cancellation of stale pending orders.
//!
//! Orders that sit in `Pending` for longer than the configured TTL are
//! transitioned to `AutoCancelled`. Runs hourly.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobOutcome},
};
use crate::clock::age_exceeds;
use crate::store::OrderStatus;
use std::time::Duration;
use tracing::{debug, info};

pub struct AutoCancelOrdersJob {
    /// How long an order may stay pending before it is auto-cancelled.
    pending_ttl: chrono::Duration,
    interval: Duration,
}

impl AutoCancelOrdersJob {
    pub fn new(pending_ttl: chrono::Duration, interval: Duration) -> Self {
        Self {
            pending_ttl,
            interval,
        }
    }
}

impl BackgroundJob for AutoCancelOrdersJob {
    fn id(&self) -> &'static str {
        "auto_cancel_orders"
    }

    fn name(&self) -> &'static str {
        "Auto-Cancel Orders"
    }

    fn description(&self) -> &'static str {
        "Cancel orders left pending past the configured age limit"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn execute(&self, ctx: &JobContext) -> Result<JobOutcome, JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        // One cut-off for the whole batch, not re-read per order.
        let now = ctx.clock.now();

        let pending = ctx
            .order_store
            .orders_with_status(OrderStatus::Pending)
            .map_err(|e| JobError::Retryable(e.to_string()))?;

        debug!(
            "Evaluating {} pending orders against a {} TTL",
            pending.len(),
            self.pending_ttl
        );

        let mut cancelled = 0usize;
        for order in pending {
            if ctx.is_cancelled() {
                info!(
                    "Shutdown during auto-cancel run, {} orders cancelled so far",
                    cancelled
                );
                return Err(JobError::Cancelled);
            }

            if !age_exceeds(order.created_at, now, self.pending_ttl) {
                continue;
            }

            // A write failure aborts the rest of the batch; transitions
            // already written stay, which is safe because each one is
            // individually idempotent.
            let changed = ctx
                .order_store
                .update_status(&order.id, OrderStatus::AutoCancelled, now)
                .map_err(|e| JobError::Retryable(e.to_string()))?;

            if changed {
                debug!("Auto-cancelled order {} ({})", order.id, order.code);
                cancelled += 1;
            }
        }

        if cancelled > 0 {
            info!("Auto-cancelled {} stale pending orders", cancelled);
        } else {
            info!("No stale pending orders");
        }

        Ok(JobOutcome::affected(cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{MemoryOrderStore, Order, OrderStore};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn make_job() -> AutoCancelOrdersJob {
        AutoCancelOrdersJob::new(chrono::Duration::hours(1), Duration::from_secs(3600))
    }

    fn make_job_env(now: DateTime<Utc>) -> (JobContext, Arc<MemoryOrderStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryOrderStore::new());
        let clock = Arc::new(ManualClock::new(now));
        let ctx = JobContext::new(
            CancellationToken::new(),
            Arc::clone(&store) as Arc<dyn OrderStore>,
            Arc::clone(&clock) as Arc<dyn crate::clock::Clock>,
        );
        (ctx, store, clock)
    }

    fn insert_pending(store: &MemoryOrderStore, code: &str, created_at: DateTime<Utc>) -> Order {
        let order = Order::new("customer-1", "Dhaka", code, created_at);
        store.insert(&order).unwrap();
        order
    }

    #[test]
    fn test_cancels_orders_older_than_ttl() {
        let now = base();
        let (ctx, store, _clock) = make_job_env(now);

        let stale = insert_pending(&store, "DH001", now - chrono::Duration::hours(2));
        let outcome = make_job().execute(&ctx).unwrap();

        assert_eq!(outcome.affected, 1);
        assert_eq!(
            store.get(&stale.id).unwrap().unwrap().status,
            OrderStatus::AutoCancelled
        );
    }

    #[test]
    fn test_leaves_young_orders_alone() {
        let now = base();
        let (ctx, store, _clock) = make_job_env(now);

        let young = insert_pending(&store, "DH001", now - chrono::Duration::minutes(30));
        let outcome = make_job().execute(&ctx).unwrap();

        assert_eq!(outcome.affected, 0);
        assert_eq!(
            store.get(&young.id).unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_boundary_exactly_at_ttl_is_kept() {
        let now = base();
        let (ctx, store, _clock) = make_job_env(now);

        let boundary = insert_pending(&store, "DH001", now - chrono::Duration::hours(1));
        let outcome = make_job().execute(&ctx).unwrap();

        assert_eq!(outcome.affected, 0);
        assert_eq!(
            store.get(&boundary.id).unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_never_touches_non_pending_orders() {
        let now = base();
        let (ctx, store, _clock) = make_job_env(now);

        let old = now - chrono::Duration::hours(3);
        let statuses = [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::AutoCancelled,
        ];

        let mut ids = Vec::new();
        for (i, status) in statuses.iter().enumerate() {
            let mut order = Order::new("c1", "Dhaka", format!("DH{:03}", i + 1), old);
            order.status = *status;
            store.insert(&order).unwrap();
            ids.push((order.id, *status));
        }

        let outcome = make_job().execute(&ctx).unwrap();
        assert_eq!(outcome.affected, 0);

        for (id, status) in ids {
            assert_eq!(store.get(&id).unwrap().unwrap().status, status);
        }
    }

    #[test]
    fn test_running_twice_is_idempotent() {
        let now = base();
        let (ctx, store, _clock) = make_job_env(now);

        insert_pending(&store, "DH001", now - chrono::Duration::hours(2));
        insert_pending(&store, "DH002", now - chrono::Duration::minutes(10));

        let first = make_job().execute(&ctx).unwrap();
        assert_eq!(first.affected, 1);

        let second = make_job().execute(&ctx).unwrap();
        assert_eq!(second.affected, 0);

        let auto_cancelled = store
            .orders_with_status(OrderStatus::AutoCancelled)
            .unwrap();
        assert_eq!(auto_cancelled.len(), 1);
        assert_eq!(
            store.orders_with_status(OrderStatus::Pending).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_end_to_end_cutoff_scenario() {
        let now = base();
        let (ctx, store, _clock) = make_job_env(now);

        let two_hours = insert_pending(&store, "DH001", now - chrono::Duration::hours(2));
        let half_hour = insert_pending(&store, "DH002", now - chrono::Duration::minutes(30));
        let almost = insert_pending(
            &store,
            "DH003",
            now - chrono::Duration::minutes(59) - chrono::Duration::seconds(59),
        );

        let outcome = make_job().execute(&ctx).unwrap();
        assert_eq!(outcome.affected, 1);

        assert_eq!(
            store.get(&two_hours.id).unwrap().unwrap().status,
            OrderStatus::AutoCancelled
        );
        assert_eq!(
            store.get(&half_hour.id).unwrap().unwrap().status,
            OrderStatus::Pending
        );
        assert_eq!(
            store.get(&almost.id).unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_cutoff_is_captured_once_per_run() {
        let now = base();
        let (ctx, store, clock) = make_job_env(now);

        // Becomes stale only if the cut-off were re-read mid-run.
        insert_pending(&store, "DH001", now - chrono::Duration::hours(1));

        clock.set(now);
        let outcome = make_job().execute(&ctx).unwrap();
        assert_eq!(outcome.affected, 0);

        // Advance past the boundary and run again: now it qualifies.
        clock.advance(chrono::Duration::seconds(1));
        let outcome = make_job().execute(&ctx).unwrap();
        assert_eq!(outcome.affected, 1);
    }

    #[test]
    fn test_cancelled_context_short_circuits() {
        let now = base();
        let store = Arc::new(MemoryOrderStore::new());
        let clock = Arc::new(ManualClock::new(now));
        let token = CancellationToken::new();
        token.cancel();
        let ctx = JobContext::new(
            token,
            Arc::clone(&store) as Arc<dyn OrderStore>,
            clock as Arc<dyn crate::clock::Clock>,
        );

        insert_pending(&store, "DH001", now - chrono::Duration::hours(2));

        let err = make_job().execute(&ctx).unwrap_err();
        assert!(matches!(err, JobError::Cancelled));
        assert_eq!(
            store.orders_with_status(OrderStatus::Pending).unwrap().len(),
            1
        );
    }
}
