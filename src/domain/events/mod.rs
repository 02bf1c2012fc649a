//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::{CommissionStatus, OrderStatus};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Order(OrderEvent),
    Commission(CommissionEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: i64, order_number: String, user_id: i64, total: Decimal, commissions: usize },
    StatusChanged { order_id: i64, from: OrderStatus, to: OrderStatus },
    TrackingUpdated { order_id: i64, tracking_number: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommissionEvent {
    Settled { order_id: i64, status: CommissionStatus, count: usize },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "buyv.orders.placed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "buyv.orders.status_changed",
            Self::Order(OrderEvent::TrackingUpdated { .. }) => "buyv.orders.tracking_updated",
            Self::Commission(CommissionEvent::Settled { .. }) => "buyv.commissions.settled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload() {
        let e = DomainEvent::Order(OrderEvent::StatusChanged { order_id: 3, from: OrderStatus::Pending, to: OrderStatus::OutForDelivery });
        assert_eq!(e.subject(), "buyv.orders.status_changed");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v, serde_json::json!({"type": "status_changed", "order_id": 3, "from": "pending", "to": "out_for_delivery"}));
    }
}
