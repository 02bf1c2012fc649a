//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::domain::aggregates::commission::{Commission, CommissionStatus};
use crate::domain::value_objects::{line_value, to_cents, CommissionRate, OrderNumber, OrderNumberError, MAX_AMOUNT};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, OutForDelivery, Delivered, Canceled, Returned, Refunded }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Canceled => "canceled",
            Self::Returned => "returned",
            Self::Refunded => "refunded",
        }
    }

    /// Whether the order may move from `self` to `to`. Re-entering the
    /// current status is always allowed.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        if self == to { return true; }
        match self {
            Pending => matches!(to, Confirmed | Processing | Shipped | OutForDelivery | Delivered | Canceled),
            Confirmed => matches!(to, Processing | Shipped | OutForDelivery | Delivered | Canceled),
            Processing => matches!(to, Shipped | OutForDelivery | Delivered | Canceled),
            Shipped => matches!(to, OutForDelivery | Delivered | Returned),
            OutForDelivery => matches!(to, Delivered | Returned),
            Delivered => matches!(to, Returned | Refunded),
            Returned => matches!(to, Refunded),
            Canceled | Refunded => false,
        }
    }

    pub fn transition(self, to: OrderStatus) -> Result<Transition, OrderError> {
        if !self.can_transition_to(to) {
            return Err(OrderError::InvalidTransition { from: self, to });
        }
        Ok(Transition { from: self, to, cascade: CommissionStatus::for_order(to) })
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            "returned" => Ok(Self::Returned),
            "refunded" => Ok(Self::Refunded),
            _ => Err(OrderError::UnknownStatus(s.to_string())),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// An accepted status change and the commission status it forces, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition { pub from: OrderStatus, pub to: OrderStatus, pub cascade: Option<CommissionStatus> }

// ---------------------------------------------------------------------------
// Checkout input
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub order_number: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    #[validate]
    pub items: Vec<NewOrderItem>,
    #[serde(default)] pub subtotal: Decimal,
    #[serde(default)] pub shipping: Decimal,
    #[serde(default)] pub tax: Decimal,
    #[serde(default, alias = "totalAmount")] pub total: Decimal,
    pub shipping_address: Option<serde_json::Value>,
    #[validate(length(max = 64))]
    pub payment_method: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub promoter_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    #[validate(length(min = 1, message = "product id is required"))]
    pub product_id: String,
    #[serde(default)] pub product_name: String,
    pub product_image: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub attributes: Option<serde_json::Value>,
    #[serde(default)] pub is_promoted_product: bool,
    pub promoter_id: Option<String>,
}

/// Normalized order ready to be persisted in one unit of work.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub order_number: OrderNumber,
    pub user_id: i64,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub shipping_address: Option<serde_json::Value>,
    pub payment_method: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub promoter_uid: Option<String>,
    pub items: Vec<OrderItemDraft>,
    pub commission_rate: CommissionRate,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct OrderItemDraft {
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub attributes: serde_json::Value,
    pub is_promoted_product: bool,
    pub promoter_uid: Option<String>,
}

/// Commission owed for one promoted line, before the promoter is resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommissionTerms { pub promoter_uid: String, pub rate: CommissionRate, pub amount: Decimal }

impl OrderDraft {
    /// Amounts and prices are rounded to cents before anything is derived
    /// from them, so commissions are computed from the stored price.
    pub fn prepare(user_id: i64, mut order: NewOrder, now: DateTime<Utc>) -> Result<Self, OrderError> {
        for (field, amount) in [("subtotal", &mut order.subtotal), ("shipping", &mut order.shipping), ("tax", &mut order.tax), ("total", &mut order.total)] {
            *amount = checked_amount(field, *amount)?;
        }
        for item in order.items.iter_mut() {
            item.price = checked_amount("price", item.price)?;
            match line_value(item.price, item.quantity) {
                Some(value) if value < MAX_AMOUNT => {}
                _ => return Err(OrderError::AmountTooLarge("line total")),
            }
        }
        let order_number = match order.order_number.filter(|n| !n.trim().is_empty()) {
            Some(n) => OrderNumber::new(n).map_err(OrderError::OrderNumber)?,
            None => OrderNumber::generate(now),
        };
        let status = order.status.as_deref().map(str::parse::<OrderStatus>).transpose()?.unwrap_or_default();
        let order_promoter = non_blank(order.promoter_id);
        let items = order.items.into_iter().map(|i| OrderItemDraft {
            promoter_uid: non_blank(i.promoter_id).or_else(|| order_promoter.clone()),
            product_id: i.product_id,
            product_name: i.product_name,
            product_image: i.product_image,
            price: i.price,
            quantity: i.quantity,
            size: i.size,
            color: i.color,
            attributes: i.attributes.unwrap_or_else(|| serde_json::json!({})),
            is_promoted_product: i.is_promoted_product,
        }).collect();

        Ok(Self {
            order_number, user_id, status,
            subtotal: order.subtotal, shipping: order.shipping, tax: order.tax, total: order.total,
            shipping_address: order.shipping_address, payment_method: order.payment_method,
            estimated_delivery: order.estimated_delivery, tracking_number: order.tracking_number,
            notes: order.notes, promoter_uid: order_promoter, items,
            commission_rate: CommissionRate::STANDARD, created_at: now,
        })
    }

    /// Status every derived commission starts in.
    pub fn commission_status(&self) -> CommissionStatus {
        CommissionStatus::for_order(self.status).unwrap_or(CommissionStatus::Pending)
    }
}

impl OrderItemDraft {
    pub fn commission_terms(&self, rate: CommissionRate) -> Option<CommissionTerms> {
        if !self.is_promoted_product { return None; }
        let promoter_uid = self.promoter_uid.clone()?;
        let amount = rate.amount_for(self.price, self.quantity)?;
        Some(CommissionTerms { promoter_uid, rate, amount })
    }
}

fn checked_amount(field: &'static str, amount: Decimal) -> Result<Decimal, OrderError> {
    if amount.is_sign_negative() { return Err(OrderError::NegativeAmount(field)); }
    let amount = to_cents(amount);
    if amount >= MAX_AMOUNT { return Err(OrderError::AmountTooLarge(field)); }
    Ok(amount)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Persisted rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub status: String,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub shipping_address: Option<serde_json::Value>,
    pub payment_method: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub promoter_uid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn status(&self) -> Result<OrderStatus, OrderError> { self.status.parse() }

    /// Validates a move from the stored status. A status written before the
    /// closed set existed is read as `pending`, so the order can still be
    /// confirmed, fulfilled or canceled.
    pub fn transition_to(&self, to: OrderStatus) -> Result<Transition, OrderError> {
        let from = self.status().unwrap_or_else(|_| {
            tracing::warn!(order_id = self.id, stored = %self.status, "unrecognised stored order status, treating as pending");
            OrderStatus::Pending
        });
        from.transition(to)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub attributes: serde_json::Value,
    pub is_promoted_product: bool,
    pub promoter_uid: Option<String>,
}

/// An order with its line items and derived commissions.
#[derive(Debug, Clone)]
pub struct OrderAggregate {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub commissions: Vec<Commission>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    UnknownStatus(String),
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    NegativeAmount(&'static str),
    AmountTooLarge(&'static str),
    OrderNumber(OrderNumberError),
}

impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStatus(s) => write!(f, "Unknown order status '{}'", s),
            Self::InvalidTransition { from, to } => write!(f, "Cannot move order from {} to {}", from, to),
            Self::NegativeAmount(field) => write!(f, "{} must not be negative", field),
            Self::AmountTooLarge(field) => write!(f, "{} must be less than {}", field, MAX_AMOUNT),
            Self::OrderNumber(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, qty: i32, promoted: bool, promoter: Option<&str>) -> NewOrderItem {
        NewOrderItem {
            product_id: "P1".into(), product_name: "Widget".into(), price: Decimal::new(price, 2), quantity: qty,
            is_promoted_product: promoted, promoter_id: promoter.map(Into::into), ..Default::default()
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert_eq!("cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Canceled);
        assert_eq!("lost".parse::<OrderStatus>(), Err(OrderError::UnknownStatus("lost".into())));
    }

    #[test]
    fn test_transition_table() {
        let t = OrderStatus::Pending.transition(OrderStatus::Delivered).unwrap();
        assert_eq!(t.cascade, Some(CommissionStatus::Paid));
        let t = OrderStatus::Processing.transition(OrderStatus::Canceled).unwrap();
        assert_eq!(t.cascade, Some(CommissionStatus::Canceled));
        assert_eq!(OrderStatus::Pending.transition(OrderStatus::Shipped).unwrap().cascade, None);
        assert!(OrderStatus::Delivered.transition(OrderStatus::Delivered).is_ok());
        assert_eq!(
            OrderStatus::Delivered.transition(OrderStatus::Pending),
            Err(OrderError::InvalidTransition { from: OrderStatus::Delivered, to: OrderStatus::Pending })
        );
        assert!(OrderStatus::Canceled.transition(OrderStatus::Delivered).is_err());
        assert!(OrderStatus::Shipped.transition(OrderStatus::Canceled).is_err());
    }

    #[test]
    fn test_prepare_generates_number_and_promoters() {
        let order = NewOrder {
            items: vec![item(1000, 2, true, Some("U1")), item(500, 1, true, None), item(700, 1, false, Some("U3"))],
            promoter_id: Some("U9".into()),
            total: Decimal::new(2500, 2),
            ..Default::default()
        };
        let draft = OrderDraft::prepare(7, order, Utc::now()).unwrap();
        assert!(draft.order_number.as_str().starts_with("ORD"));
        assert_eq!(draft.status, OrderStatus::Pending);
        assert_eq!(draft.items[0].promoter_uid.as_deref(), Some("U1"));
        assert_eq!(draft.items[1].promoter_uid.as_deref(), Some("U9"));
        assert_eq!(draft.items[0].attributes, serde_json::json!({}));

        let terms: Vec<_> = draft.items.iter().filter_map(|i| i.commission_terms(draft.commission_rate)).collect();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].amount, Decimal::new(20, 2));
        assert_eq!(terms[1].promoter_uid, "U9");
    }

    #[test]
    fn test_prepare_rejects_bad_input() {
        let order = NewOrder { items: vec![item(-100, 1, false, None)], ..Default::default() };
        assert_eq!(OrderDraft::prepare(1, order, Utc::now()).unwrap_err(), OrderError::NegativeAmount("price"));
        let order = NewOrder { status: Some("teleported".into()), ..Default::default() };
        assert!(matches!(OrderDraft::prepare(1, order, Utc::now()), Err(OrderError::UnknownStatus(_))));
    }

    #[test]
    fn test_prepare_rounds_sub_cent_prices_before_commission() {
        let mut line = item(0, 100, true, Some("U1"));
        line.price = Decimal::new(1005, 3);
        let order = NewOrder { items: vec![line], total: Decimal::new(100_505, 4), ..Default::default() };
        let draft = OrderDraft::prepare(1, order, Utc::now()).unwrap();
        let stored = &draft.items[0];
        assert_eq!(stored.price, Decimal::new(101, 2));
        assert_eq!(draft.total, Decimal::new(1005, 2));

        let terms = stored.commission_terms(draft.commission_rate).unwrap();
        let expected = (stored.price * Decimal::from(stored.quantity) * draft.commission_rate.value()).round_dp(2);
        assert_eq!(terms.amount, expected);
        assert_eq!(terms.amount, Decimal::new(101, 2));
    }

    #[test]
    fn test_prepare_rejects_amounts_beyond_storage() {
        let order = NewOrder { items: vec![item(100_000_000_000_000, 1, false, None)], ..Default::default() };
        assert_eq!(OrderDraft::prepare(1, order, Utc::now()).unwrap_err(), OrderError::AmountTooLarge("price"));

        let order = NewOrder { total: Decimal::new(10_000_000_000, 0), ..Default::default() };
        assert_eq!(OrderDraft::prepare(1, order, Utc::now()).unwrap_err(), OrderError::AmountTooLarge("total"));

        let order = NewOrder { items: vec![item(900_000_000_000, 2, true, Some("U1"))], ..Default::default() };
        assert_eq!(OrderDraft::prepare(1, order, Utc::now()).unwrap_err(), OrderError::AmountTooLarge("line total"));

        let mut line = item(0, 2, true, Some("U1"));
        line.price = Decimal::from_i128_with_scale(7 * 10i128.pow(28), 0);
        let order = NewOrder { items: vec![line], ..Default::default() };
        assert_eq!(OrderDraft::prepare(1, order, Utc::now()).unwrap_err(), OrderError::AmountTooLarge("price"));

        let order = NewOrder { items: vec![item(999_999_999_999, 1, true, Some("U1"))], ..Default::default() };
        let draft = OrderDraft::prepare(1, order, Utc::now()).unwrap();
        assert_eq!(draft.items[0].commission_terms(draft.commission_rate).unwrap().amount, Decimal::new(10_000_000_000, 2));
    }

    #[test]
    fn test_unrecognised_stored_status_reads_as_pending() {
        let now = Utc::now();
        let mut order = Order {
            id: 1, order_number: "ORD1".into(), user_id: 1, status: "awaiting_pickup".into(),
            subtotal: Decimal::ZERO, shipping: Decimal::ZERO, tax: Decimal::ZERO, total: Decimal::ZERO,
            shipping_address: None, payment_method: None, estimated_delivery: None, tracking_number: None,
            notes: None, promoter_uid: None, created_at: now, updated_at: now,
        };
        let t = order.transition_to(OrderStatus::Canceled).unwrap();
        assert_eq!((t.from, t.cascade), (OrderStatus::Pending, Some(CommissionStatus::Canceled)));
        assert!(order.transition_to(OrderStatus::Delivered).is_ok());
        assert!(order.transition_to(OrderStatus::Refunded).is_err());

        order.status = "refunded".into();
        assert!(order.transition_to(OrderStatus::Canceled).is_err());
    }

    #[test]
    fn test_delivered_draft_starts_commissions_paid() {
        let order = NewOrder { order_number: Some("ORD-42".into()), status: Some("delivered".into()), ..Default::default() };
        let draft = OrderDraft::prepare(1, order, Utc::now()).unwrap();
        assert_eq!(draft.order_number.as_str(), "ORD-42");
        assert_eq!(draft.commission_status(), CommissionStatus::Paid);
    }

    #[test]
    fn test_new_order_validation() {
        let order = NewOrder { items: vec![item(100, 0, false, None)], ..Default::default() };
        assert!(order.validate().is_err());
        let order: NewOrder = serde_json::from_value(serde_json::json!({
            "items": [{"productId": "P1", "price": 10.0, "quantity": 2, "isPromotedProduct": true, "promoterId": "U1"}],
            "totalAmount": 20.0
        })).unwrap();
        assert!(order.validate().is_ok());
        assert_eq!(order.total, Decimal::new(20, 0));
        assert!(order.items[0].is_promoted_product);
    }
}
