//! Commission Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::aggregates::order::{CommissionTerms, Order, OrderItem, OrderStatus};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus { #[default] Pending, Paid, Canceled }

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Paid => "paid", Self::Canceled => "canceled" }
    }

    /// Status a commission is forced into when its order reaches `status`.
    pub fn for_order(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Delivered => Some(Self::Paid),
            OrderStatus::Canceled => Some(Self::Canceled),
            _ => None,
        }
    }
}

impl FromStr for CommissionStatus {
    type Err = UnknownCommissionStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(UnknownCommissionStatus(s.to_string())),
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownCommissionStatus(pub String);
impl std::error::Error for UnknownCommissionStatus {}
impl fmt::Display for UnknownCommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown commission status '{}'", self.0) }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Commission {
    pub id: i64,
    /// Promoter's internal id; `None` when the promoter uid matched no user.
    pub user_id: Option<i64>,
    pub user_uid: String,
    pub order_id: i64,
    pub order_item_id: i64,
    pub product_id: String,
    pub product_name: String,
    pub product_price: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub status: String,
    pub metadata: serde_json::Value,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commission {
    /// Moves the commission to `status`. Returns whether anything changed.
    pub fn settle(&mut self, status: CommissionStatus, now: DateTime<Utc>) -> bool {
        let stamp = status == CommissionStatus::Paid && self.paid_at.is_none();
        if self.status == status.as_str() && !stamp { return false; }
        self.status = status.as_str().to_string();
        if stamp { self.paid_at = Some(now); }
        self.updated_at = now;
        true
    }
}

/// Commission row to insert alongside its order item.
#[derive(Debug, Clone)]
pub struct NewCommission {
    pub user_id: Option<i64>,
    pub user_uid: String,
    pub order_id: i64,
    pub order_item_id: i64,
    pub product_id: String,
    pub product_name: String,
    pub product_price: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub status: CommissionStatus,
    pub metadata: serde_json::Value,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewCommission {
    pub fn for_item(order: &Order, item: &OrderItem, terms: CommissionTerms, promoter_id: Option<i64>, status: CommissionStatus, now: DateTime<Utc>) -> Self {
        Self {
            user_id: promoter_id,
            user_uid: terms.promoter_uid,
            order_id: order.id,
            order_item_id: item.id,
            product_id: item.product_id.clone(),
            product_name: item.product_name.clone(),
            product_price: item.price,
            commission_rate: terms.rate.value(),
            commission_amount: terms.amount,
            status,
            metadata: serde_json::json!({
                "orderId": order.id.to_string(),
                "orderNumber": order.order_number,
                "orderItemId": item.id.to_string(),
            }),
            paid_at: (status == CommissionStatus::Paid).then_some(now),
            created_at: now,
        }
    }

    pub fn into_commission(self, id: i64) -> Commission {
        Commission {
            id, user_id: self.user_id, user_uid: self.user_uid, order_id: self.order_id, order_item_id: self.order_item_id,
            product_id: self.product_id, product_name: self.product_name, product_price: self.product_price,
            commission_rate: self.commission_rate, commission_amount: self.commission_amount,
            status: self.status.as_str().to_string(), metadata: self.metadata, paid_at: self.paid_at,
            created_at: self.created_at, updated_at: self.created_at,
        }
    }
}
