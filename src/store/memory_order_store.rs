//! In-memory order store.
//!
//! Backs unit tests and any wiring that has no database on disk. Same
//! conditional-transition semantics as the SQLite implementation.

use super::models::{Order, OrderStatus};
use super::OrderStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderStore for MemoryOrderStore {
    fn insert(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.lock().unwrap();
        orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Order>> {
        let orders = self.orders.lock().unwrap();
        Ok(orders.get(id).cloned())
    }

    fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let orders = self.orders.lock().unwrap();
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|o| o.created_at);
        Ok(matching)
    }

    fn update_status(&self, id: &str, status: OrderStatus, now: DateTime<Utc>) -> Result<bool> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(id) {
            Some(order) if !order.status.is_terminal() => {
                order.status = status;
                order.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn next_sequence(&self, region: &str) -> Result<u32> {
        let orders = self.orders.lock().unwrap();
        let count = orders.values().filter(|o| o.region == region).count();
        Ok(count as u32 + 1)
    }
}
