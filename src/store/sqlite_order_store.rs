use super::models::{Order, OrderStatus};
use super::schema::ORDER_VERSIONED_SCHEMAS;
use super::OrderStore;
use crate::sqlite_persistence::open_versioned;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteOrderStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOrderStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open order database")?;
        if is_new_db {
            info!("Creating new order database at {:?}", path);
        }
        open_versioned(&mut conn, ORDER_VERSIONED_SCHEMAS, is_new_db)
            .context("Order database schema check failed")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn parse_datetime(s: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    }

    fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        let status_str: String = row.get("status")?;
        let status = OrderStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("Unknown order status '{}'", status_str).into(),
            )
        })?;

        let created_at_str: String = row.get("created_at")?;
        let updated_at_str: String = row.get("updated_at")?;

        Ok(Order {
            id: row.get("id")?,
            code: row.get("code")?,
            customer_id: row.get("customer_id")?,
            region: row.get("region")?,
            status,
            created_at: Self::parse_datetime(&created_at_str)?,
            updated_at: Self::parse_datetime(&updated_at_str)?,
        })
    }
}

impl OrderStore for SqliteOrderStore {
    fn insert(&self, order: &Order) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO orders (id, code, customer_id, region, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                order.id,
                order.code,
                order.customer_id,
                order.region,
                order.status.as_str(),
                Self::format_datetime(&order.created_at),
                Self::format_datetime(&order.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Order>> {
        let conn = self.conn.lock().unwrap();
        let order = conn
            .query_row(
                "SELECT id, code, customer_id, region, status, created_at, updated_at
                 FROM orders WHERE id = ?1",
                params![id],
                Self::row_to_order,
            )
            .optional()?;
        Ok(order)
    }

    fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, code, customer_id, region, status, created_at, updated_at
             FROM orders WHERE status = ?1 ORDER BY created_at ASC",
        )?;
        let orders = stmt
            .query_map(params![status.as_str()], Self::row_to_order)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    fn update_status(&self, id: &str, status: OrderStatus, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        // Single conditional statement: a row already in a terminal state is
        // left untouched, which is what makes re-running transitions a no-op.
        let changed = conn.execute(
            "UPDATE orders SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND status NOT IN (?4, ?5, ?6)",
            params![
                status.as_str(),
                Self::format_datetime(&now),
                id,
                OrderStatus::Delivered.as_str(),
                OrderStatus::Cancelled.as_str(),
                OrderStatus::AutoCancelled.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn next_sequence(&self, region: &str) -> Result<u32> {
        let conn = self.conn.lock().unwrap();
        // Orders are never deleted, so count-based sequencing is stable.
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE region = ?1",
            params![region],
            |row| row.get(0),
        )?;
        Ok(count + 1)
    }
}
