//! Value Objects for the commerce and feed domains

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Human-facing order number, unique per order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(String);

impl OrderNumber {
    const MAX_LEN: usize = 64;

    /// Accepts a caller-supplied number.
    pub fn new(value: impl Into<String>) -> Result<Self, OrderNumberError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(OrderNumberError::Empty); }
        if value.len() > Self::MAX_LEN { return Err(OrderNumberError::TooLong); }
        Ok(Self(value))
    }

    /// `ORD{unix millis}{8 random alphanumerics}`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect();
        Self(format!("ORD{}{}", now.timestamp_millis(), suffix.to_uppercase()))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderNumberError { Empty, TooLong }
impl std::error::Error for OrderNumberError {}
impl fmt::Display for OrderNumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "Order number empty"), Self::TooLong => write!(f, "Order number too long") }
    }
}

/// Fraction of a promoted line's value owed to the promoter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    /// 1%, applied to every promoted sale.
    pub const STANDARD: CommissionRate = CommissionRate(Decimal::from_parts(1, 0, 0, false, 2));

    pub fn value(&self) -> Decimal { self.0 }

    /// `round(price * quantity * rate, 2)`, half-to-even. `None` on overflow.
    pub fn amount_for(&self, price: Decimal, quantity: i32) -> Option<Decimal> {
        let amount = line_value(price, quantity)?.checked_mul(self.0)?;
        Some(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven))
    }
}

/// Exclusive upper bound of a stored money value (`NUMERIC(12,2)`).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

/// Rounds a client-supplied amount to cents the way the database stores it.
pub fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `price * quantity`, `None` on overflow.
pub fn line_value(price: Decimal, quantity: i32) -> Option<Decimal> {
    price.checked_mul(Decimal::from(quantity))
}

/// Kind of feed post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType { Reel, Product, Photo }

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Reel => "reel", Self::Product => "product", Self::Photo => "photo" }
    }
}

impl FromStr for PostType {
    type Err = PostTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reel" => Ok(Self::Reel),
            "product" => Ok(Self::Product),
            "photo" => Ok(Self::Photo),
            _ => Err(PostTypeError),
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct PostTypeError;
impl std::error::Error for PostTypeError {}
impl fmt::Display for PostTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Invalid post type") }
}

/// Limit/offset window for list endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page { pub limit: i64, pub offset: i64 }

impl Page {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Page { fn default() -> Self { Self::new(None, None) } }
