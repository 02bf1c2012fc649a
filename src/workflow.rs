//! Order and commission workflow.
//!
//! Checkout creates an order with its line items and, for every
//! promoted line that names a promoter, a commission. Owner-initiated
//! status changes keep commission status in step with the order:
//! `delivered` pays them, `canceled` cancels them.

use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::domain::aggregates::{Commission, CommissionStatus, NewOrder, Order, OrderAggregate, OrderDraft, OrderStatus};
use crate::domain::events::{CommissionEvent, DomainEvent, OrderEvent};
use crate::publisher::EventPublisher;
use crate::store::OrderStore;
use crate::{BuyvError, Result};

#[derive(Clone)]
pub struct OrderWorkflow {
    store: Arc<dyn OrderStore>,
    events: EventPublisher,
}

impl OrderWorkflow {
    pub fn new(store: Arc<dyn OrderStore>, events: EventPublisher) -> Self { Self { store, events } }

    pub async fn place(&self, buyer_id: i64, request: NewOrder) -> Result<OrderAggregate> {
        request.validate()?;
        let draft = OrderDraft::prepare(buyer_id, request, Utc::now())?;
        let placed = self.store.create(draft).await?;
        tracing::info!(
            order_id = placed.order.id, order_number = %placed.order.order_number,
            items = placed.items.len(), commissions = placed.commissions.len(), "order placed"
        );
        self.events.publish(DomainEvent::Order(OrderEvent::Placed {
            order_id: placed.order.id,
            order_number: placed.order.order_number.clone(),
            user_id: placed.order.user_id,
            total: placed.order.total,
            commissions: placed.commissions.len(),
        })).await;
        Ok(placed)
    }

    pub async fn get(&self, owner_id: i64, order_id: i64) -> Result<OrderAggregate> {
        self.store.find_for_owner(owner_id, order_id).await?.ok_or(BuyvError::NotFound("Order"))
    }

    pub async fn list(&self, owner_id: i64, status: Option<&str>) -> Result<Vec<OrderAggregate>> {
        let status = status.map(str::parse::<OrderStatus>).transpose()?;
        self.store.list_for_owner(owner_id, status).await
    }

    pub async fn change_status(&self, owner_id: i64, order_id: i64, status: &str) -> Result<OrderAggregate> {
        let to: OrderStatus = status.parse()?;
        let change = match self.store.transition(owner_id, order_id, to, Utc::now()).await {
            Ok(Some(change)) => change,
            Ok(None) => return Err(BuyvError::NotFound("Order")),
            Err(e @ BuyvError::InvalidTransition { .. }) => {
                tracing::warn!(order_id, error = %e, "status transition rejected");
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let t = change.transition;
        tracing::info!(order_id, from = %t.from, to = %t.to, commissions = change.commissions_updated, "order status changed");

        self.events.publish(DomainEvent::Order(OrderEvent::StatusChanged { order_id, from: t.from, to: t.to })).await;
        if let Some(status) = t.cascade.filter(|_| change.commissions_updated > 0) {
            self.events.publish(DomainEvent::Commission(CommissionEvent::Settled {
                order_id, status, count: change.commissions_updated,
            })).await;
        }
        Ok(change.order)
    }

    pub async fn cancel(&self, owner_id: i64, order_id: i64) -> Result<OrderAggregate> {
        self.change_status(owner_id, order_id, OrderStatus::Canceled.as_str()).await
    }

    pub async fn update_tracking(&self, owner_id: i64, order_id: i64, tracking_number: &str) -> Result<Order> {
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(BuyvError::Validation("Tracking number must not be empty".into()));
        }
        let order = self.store.set_tracking(owner_id, order_id, tracking_number, Utc::now()).await?
            .ok_or(BuyvError::NotFound("Order"))?;
        self.events.publish(DomainEvent::Order(OrderEvent::TrackingUpdated {
            order_id, tracking_number: tracking_number.to_string(),
        })).await;
        Ok(order)
    }

    pub async fn promoter_commissions(&self, promoter_id: i64, status: Option<&str>) -> Result<Vec<Commission>> {
        let status = status
            .map(|s| s.parse::<CommissionStatus>().map_err(|e| BuyvError::Validation(e.to_string())))
            .transpose()?;
        self.store.commissions_for_promoter(promoter_id, status).await
    }
}
