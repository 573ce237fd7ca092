//! Persisted order and stock records.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::request::OrderItemRequest;
use crate::value_objects::{Money, OrderItemId, ProductId, UserId};

/// Lifecycle status of a persisted order.
///
/// The reservation core only ever writes orders as `Created`; the
/// terminal states belong to downstream fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Stable string form used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(OrderStatus::Created),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted order item with its price snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Price per unit at order time, decoupled from the live catalog.
    pub unit_price: Money,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the total price for this item.
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    /// Trace-correlation token carried over from the request, consumed by
    /// external subscribers (notifications, tracing backends).
    pub trace_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materializes an order from validated request items.
    ///
    /// Prices are snapshotted from the request, not re-read from a live
    /// catalog, so the persisted order reflects what the customer was
    /// quoted.
    pub fn create(
        id: OrderId,
        user_id: UserId,
        items: &[OrderItemRequest],
        trace_token: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let items = items
            .iter()
            .map(|req| OrderItem {
                id: req.id,
                order_id: id,
                product_id: req.product_id.clone(),
                unit_price: req.unit_price,
                quantity: req.quantity,
                created_at: now,
            })
            .collect();

        Self {
            id,
            user_id,
            status: OrderStatus::Created,
            items,
            trace_token,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the total amount of the order.
    pub fn total_amount(&self) -> Money {
        self.items
            .iter()
            .fold(Money::zero(), |acc, item| acc + item.total_price())
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Available quantity for one product in the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub product_id: ProductId,
    /// Never driven below zero by any committed transaction.
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ItemDraft, OrderRequest};

    fn sample_request() -> OrderRequest {
        let (request, _rx) = OrderRequest::new(
            UserId::new(),
            vec![
                ItemDraft::new("SKU-001", Money::from_cents(1000), 2),
                ItemDraft::new("SKU-002", Money::from_cents(500), 3),
            ],
        )
        .unwrap();
        request
    }

    #[test]
    fn test_create_snapshots_prices_and_ids() {
        let request = sample_request();
        let now = Utc::now();
        let order = Order::create(request.id, request.user_id, &request.items, None, now);

        assert_eq!(order.id, request.id);
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].id, request.items[0].id);
        assert_eq!(order.items[0].unit_price, Money::from_cents(1000));
        assert_eq!(order.created_at, now);
    }

    #[test]
    fn test_totals() {
        let request = sample_request();
        let order = Order::create(request.id, request.user_id, &request.items, None, Utc::now());

        assert_eq!(order.total_amount().cents(), 2 * 1000 + 3 * 500);
        assert_eq!(order.total_quantity(), 5);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            OrderStatus::Created,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("unknown"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Created.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_order_serialization_roundtrip() {
        let request = sample_request();
        let order = Order::create(request.id, request.user_id, &request.items, None, Utc::now());

        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
