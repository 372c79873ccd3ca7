//! SQLite schema for the order database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const ORDERS_TABLE_V1: Table = Table {
    name: "orders",
    columns: &[
        sqlite_column!("id", SqlType::Text, is_primary_key = true),
        sqlite_column!("code", SqlType::Text, non_null = true),
        sqlite_column!("customer_id", SqlType::Text, non_null = true),
        sqlite_column!("region", SqlType::Text, non_null = true),
        sqlite_column!("status", SqlType::Text, non_null = true),
        sqlite_column!("created_at", SqlType::Text, non_null = true),
        sqlite_column!("updated_at", SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_orders_status", "status"),
        ("idx_orders_region", "region"),
    ],
};

pub const ORDER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[ORDERS_TABLE_V1],
    migration: None,
}];
