//! Order persistence.
//!
//! [`OrderStore`] is the seam between the order workflow and the
//! relational store. Every method is one unit of work: creation writes
//! the order, its items and derived commissions together, and a status
//! change updates the order and cascades to its commissions together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::aggregates::{Commission, CommissionStatus, Order, OrderAggregate, OrderDraft, OrderStatus, Transition};
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

/// Result of an accepted status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub transition: Transition,
    /// Commissions whose status or paid stamp moved.
    pub commissions_updated: usize,
    pub order: OrderAggregate,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists the order, its items and their commissions atomically.
    async fn create(&self, draft: OrderDraft) -> Result<OrderAggregate>;

    async fn find_for_owner(&self, owner_id: i64, order_id: i64) -> Result<Option<OrderAggregate>>;

    /// Owner's orders, newest first, optionally filtered by status.
    async fn list_for_owner(&self, owner_id: i64, status: Option<OrderStatus>) -> Result<Vec<OrderAggregate>>;

    /// Moves the order to `to` and applies the commission cascade.
    /// `None` when the owner has no such order.
    async fn transition(&self, owner_id: i64, order_id: i64, to: OrderStatus, now: DateTime<Utc>) -> Result<Option<StatusChange>>;

    async fn set_tracking(&self, owner_id: i64, order_id: i64, tracking_number: &str, now: DateTime<Utc>) -> Result<Option<Order>>;

    /// Commissions credited to a promoter, newest first.
    async fn commissions_for_promoter(&self, promoter_id: i64, status: Option<CommissionStatus>) -> Result<Vec<Commission>>;
}
