use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of an order in its lifecycle.
///
/// `Delivered`, `Cancelled` and `AutoCancelled` are terminal: once an order
/// reaches one of them, no further transition is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
    AutoCancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::AutoCancelled => "auto_cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            "auto_cancelled" => Some(OrderStatus::AutoCancelled),
            _ => None,
        }
    }

    /// True for states from which no further transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::AutoCancelled
        )
    }
}

/// A customer order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Opaque stable identifier, assigned at creation.
    pub id: String,
    /// Human-readable code, e.g. "DH007" (region prefix + sequence).
    pub code: String,
    pub customer_id: String,
    /// Region (division) name the order was placed in.
    pub region: String,
    pub status: OrderStatus,
    /// Set at creation, immutable.
    pub created_at: DateTime<Utc>,
    /// Moves on every status write.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        customer_id: impl Into<String>,
        region: impl Into<String>,
        code: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.into(),
            customer_id: customer_id.into(),
            region: region.into(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::AutoCancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("refunded"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::AutoCancelled.is_terminal());

        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Confirmed.is_terminal());
        assert!(!OrderStatus::Preparing.is_terminal());
        assert!(!OrderStatus::OutForDelivery.is_terminal());
    }

    #[test]
    fn test_new_order_starts_pending() {
        let now = Utc::now();
        let order = Order::new("customer-1", "Dhaka", "DH001", now);

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.created_at, now);
        assert_eq!(order.updated_at, now);
        assert!(!order.id.is_empty());
    }

    #[test]
    fn test_order_serializes_with_snake_case_status() {
        let order = Order::new("customer-1", "Dhaka", "DH001", Utc::now());
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(json["status"], "pending");
        assert_eq!(json["code"], "DH001");

        let mut cancelled = order.clone();
        cancelled.status = OrderStatus::AutoCancelled;
        let json = serde_json::to_value(&cancelled).unwrap();
        assert_eq!(json["status"], "auto_cancelled");
    }

    #[test]
    fn test_new_orders_get_distinct_ids() {
        let now = Utc::now();
        let a = Order::new("c", "Dhaka", "DH001", now);
        let b = Order::new("c", "Dhaka", "DH002", now);
        assert_ne!(a.id, b.id);
    }
}
