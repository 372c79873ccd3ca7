mod memory_order_store;
mod models;
mod schema;
mod sqlite_order_store;

pub use memory_order_store::MemoryOrderStore;
pub use models::{Order, OrderStatus};
pub use schema::ORDER_VERSIONED_SCHEMAS;
pub use sqlite_order_store::SqliteOrderStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Persistence boundary for orders.
///
/// Implementations must make `update_status` atomic per order: the write is
/// conditional on the order not already being terminal, so a concurrent
/// manual cancel and an auto-cancel cannot stack transitions.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait OrderStore: Send + Sync {
    fn insert(&self, order: &Order) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<Order>>;

    /// All orders currently in `status`, oldest first.
    fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Transition an order to `status`, stamping `updated_at = now`.
    ///
    /// Returns false without mutating anything when the order does not exist
    /// or is already in a terminal state.
    fn update_status(&self, id: &str, status: OrderStatus, now: DateTime<Utc>) -> Result<bool>;

    /// Next per-region sequence number for order code generation (1-based).
    fn next_sequence(&self, region: &str) -> Result<u32>;
}
