//! In-memory order store for tests and local runs without Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::aggregates::{Commission, CommissionStatus, NewCommission, Order, OrderAggregate, OrderDraft, OrderItem, OrderStatus};
use crate::store::{OrderStore, StatusChange};
use crate::{BuyvError, Result};

#[derive(Default)]
struct State {
    users: HashMap<String, i64>,
    orders: Vec<Order>,
    items: Vec<OrderItem>,
    commissions: Vec<Commission>,
    next_id: i64,
}

impl State {
    fn aggregate(&self, order: &Order) -> OrderAggregate {
        OrderAggregate {
            order: order.clone(),
            items: self.items.iter().filter(|i| i.order_id == order.id).cloned().collect(),
            commissions: self.commissions.iter().filter(|c| c.order_id == order.id).cloned().collect(),
        }
    }
}

/// Order store kept in process memory. Writes are staged and only
/// applied once the whole unit of work succeeds.
#[derive(Default)]
pub struct MemoryOrderStore {
    state: RwLock<State>,
    fail_on_commission: RwLock<bool>,
}

impl MemoryOrderStore {
    pub fn new() -> Self { Self::default() }

    /// Makes `uid` resolvable as a promoter with internal id `id`.
    pub async fn register_user(&self, id: i64, uid: impl Into<String>) {
        self.state.write().await.users.insert(uid.into(), id);
    }

    /// Fails any creation that reaches the commission step.
    pub async fn set_fail_on_commission(&self, fail: bool) {
        *self.fail_on_commission.write().await = fail;
    }

    /// Overwrites an order's stored status without validation.
    pub async fn overwrite_status(&self, order_id: i64, status: &str) {
        if let Some(order) = self.state.write().await.orders.iter_mut().find(|o| o.id == order_id) {
            order.status = status.to_string();
        }
    }

    pub async fn commission_count(&self) -> usize { self.state.read().await.commissions.len() }
    pub async fn order_count(&self) -> usize { self.state.read().await.orders.len() }
    pub async fn item_count(&self) -> usize { self.state.read().await.items.len() }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, draft: OrderDraft) -> Result<OrderAggregate> {
        let fail_on_commission = *self.fail_on_commission.read().await;
        let mut state = self.state.write().await;
        if state.orders.iter().any(|o| o.order_number == draft.order_number.as_str()) {
            return Err(BuyvError::Validation("Order number already exists".into()));
        }

        let mut next_id = state.next_id;
        let mut id = || { next_id += 1; next_id };
        let now = draft.created_at;
        let order = Order {
            id: id(), order_number: draft.order_number.as_str().to_string(), user_id: draft.user_id,
            status: draft.status.as_str().to_string(), subtotal: draft.subtotal, shipping: draft.shipping,
            tax: draft.tax, total: draft.total, shipping_address: draft.shipping_address.clone(),
            payment_method: draft.payment_method.clone(), estimated_delivery: draft.estimated_delivery,
            tracking_number: draft.tracking_number.clone(), notes: draft.notes.clone(),
            promoter_uid: draft.promoter_uid.clone(), created_at: now, updated_at: now,
        };

        let commission_status = draft.commission_status();
        let mut items = Vec::with_capacity(draft.items.len());
        let mut commissions = Vec::new();
        for item in &draft.items {
            let row = OrderItem {
                id: id(), order_id: order.id, product_id: item.product_id.clone(), product_name: item.product_name.clone(),
                product_image: item.product_image.clone(), price: item.price, quantity: item.quantity,
                size: item.size.clone(), color: item.color.clone(), attributes: item.attributes.clone(),
                is_promoted_product: item.is_promoted_product, promoter_uid: item.promoter_uid.clone(),
            };
            if let Some(terms) = item.commission_terms(draft.commission_rate) {
                if fail_on_commission {
                    return Err(BuyvError::Internal("commission insert failed".into()));
                }
                let promoter_id = state.users.get(&terms.promoter_uid).copied();
                commissions.push(NewCommission::for_item(&order, &row, terms, promoter_id, commission_status, now).into_commission(id()));
            }
            items.push(row);
        }

        state.next_id = next_id;
        state.orders.push(order.clone());
        state.items.extend(items.iter().cloned());
        state.commissions.extend(commissions.iter().cloned());
        Ok(OrderAggregate { order, items, commissions })
    }

    async fn find_for_owner(&self, owner_id: i64, order_id: i64) -> Result<Option<OrderAggregate>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == order_id && o.user_id == owner_id).map(|o| state.aggregate(o)))
    }

    async fn list_for_owner(&self, owner_id: i64, status: Option<OrderStatus>) -> Result<Vec<OrderAggregate>> {
        let state = self.state.read().await;
        let mut orders: Vec<&Order> = state.orders.iter()
            .filter(|o| o.user_id == owner_id && status.map_or(true, |s| o.status == s.as_str()))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders.into_iter().map(|o| state.aggregate(o)).collect())
    }

    async fn transition(&self, owner_id: i64, order_id: i64, to: OrderStatus, now: DateTime<Utc>) -> Result<Option<StatusChange>> {
        let mut state = self.state.write().await;
        let Some(pos) = state.orders.iter().position(|o| o.id == order_id && o.user_id == owner_id) else { return Ok(None) };
        let transition = state.orders[pos].transition_to(to)?;

        let order = &mut state.orders[pos];
        order.status = to.as_str().to_string();
        order.updated_at = now;
        let order_id = order.id;

        let mut commissions_updated = 0;
        if let Some(status) = transition.cascade {
            for c in state.commissions.iter_mut().filter(|c| c.order_id == order_id) {
                if c.settle(status, now) { commissions_updated += 1; }
            }
        }
        let order = state.aggregate(&state.orders[pos]);
        Ok(Some(StatusChange { transition, commissions_updated, order }))
    }

    async fn set_tracking(&self, owner_id: i64, order_id: i64, tracking_number: &str, now: DateTime<Utc>) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        Ok(state.orders.iter_mut().find(|o| o.id == order_id && o.user_id == owner_id).map(|o| {
            o.tracking_number = Some(tracking_number.to_string());
            o.updated_at = now;
            o.clone()
        }))
    }

    async fn commissions_for_promoter(&self, promoter_id: i64, status: Option<CommissionStatus>) -> Result<Vec<Commission>> {
        let state = self.state.read().await;
        let mut out: Vec<Commission> = state.commissions.iter()
            .filter(|c| c.user_id == Some(promoter_id) && status.map_or(true, |s| c.status == s.as_str()))
            .cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }
}
