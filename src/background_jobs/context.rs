use crate::clock::Clock;
use crate::store::OrderStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context handed to jobs for the duration of one run.
///
/// Jobs are stateless workers: everything they touch comes in here, per
/// invocation, including the time source.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Access to persisted orders.
    pub order_store: Arc<dyn OrderStore>,

    /// Time source; injected so threshold decisions are testable.
    pub clock: Arc<dyn Clock>,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        order_store: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cancellation_token,
            order_store,
            clock,
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
