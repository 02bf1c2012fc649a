//! Postgres-backed order store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::aggregates::{Commission, CommissionStatus, NewCommission, Order, OrderAggregate, OrderDraft, OrderItem, OrderStatus};
use crate::store::{OrderStore, StatusChange};
use crate::{unique_violation, BuyvError, Result};

#[derive(Clone)]
pub struct PgOrderStore { pool: PgPool }

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn duplicate_order_number(e: sqlx::Error) -> BuyvError {
    match unique_violation(&e) {
        Some("orders_order_number_key") => BuyvError::Validation("Order number already exists".into()),
        _ => e.into(),
    }
}

/// Attaches items and commissions to each order, preserving order.
async fn load(conn: &mut PgConnection, orders: Vec<Order>) -> Result<Vec<OrderAggregate>> {
    if orders.is_empty() { return Ok(vec![]); }
    let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
    let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY id")
        .bind(&ids).fetch_all(&mut *conn).await?;
    let commissions = sqlx::query_as::<_, Commission>("SELECT * FROM commissions WHERE order_id = ANY($1) ORDER BY id")
        .bind(&ids).fetch_all(&mut *conn).await?;

    let mut items_by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for item in items { items_by_order.entry(item.order_id).or_default().push(item); }
    let mut commissions_by_order: HashMap<i64, Vec<Commission>> = HashMap::new();
    for c in commissions { commissions_by_order.entry(c.order_id).or_default().push(c); }

    Ok(orders.into_iter().map(|order| OrderAggregate {
        items: items_by_order.remove(&order.id).unwrap_or_default(),
        commissions: commissions_by_order.remove(&order.id).unwrap_or_default(),
        order,
    }).collect())
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, draft: OrderDraft) -> Result<OrderAggregate> {
        let mut tx = self.pool.begin().await?;
        let now = draft.created_at;

        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (order_number, user_id, status, subtotal, shipping, tax, total, shipping_address, payment_method, estimated_delivery, tracking_number, notes, promoter_uid, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14) RETURNING *")
            .bind(draft.order_number.as_str()).bind(draft.user_id).bind(draft.status.as_str())
            .bind(draft.subtotal).bind(draft.shipping).bind(draft.tax).bind(draft.total)
            .bind(&draft.shipping_address).bind(&draft.payment_method).bind(draft.estimated_delivery)
            .bind(&draft.tracking_number).bind(&draft.notes).bind(&draft.promoter_uid).bind(now)
            .fetch_one(&mut *tx).await.map_err(duplicate_order_number)?;

        let commission_status = draft.commission_status();
        let mut items = Vec::with_capacity(draft.items.len());
        let mut commissions = Vec::new();
        for item in &draft.items {
            let row = sqlx::query_as::<_, OrderItem>(
                "INSERT INTO order_items (order_id, product_id, product_name, product_image, price, quantity, size, color, attributes, is_promoted_product, promoter_uid) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *")
                .bind(order.id).bind(&item.product_id).bind(&item.product_name).bind(&item.product_image)
                .bind(item.price).bind(item.quantity).bind(&item.size).bind(&item.color)
                .bind(&item.attributes).bind(item.is_promoted_product).bind(&item.promoter_uid)
                .fetch_one(&mut *tx).await?;

            if let Some(terms) = item.commission_terms(draft.commission_rate) {
                let promoter: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE uid = $1")
                    .bind(&terms.promoter_uid).fetch_optional(&mut *tx).await?;
                if promoter.is_none() {
                    tracing::warn!(order_id = order.id, promoter_uid = %terms.promoter_uid, "promoter not found, recording orphaned commission");
                }
                let c = NewCommission::for_item(&order, &row, terms, promoter.map(|p| p.0), commission_status, now);
                let c = sqlx::query_as::<_, Commission>(
                    "INSERT INTO commissions (user_id, user_uid, order_id, order_item_id, product_id, product_name, product_price, commission_rate, commission_amount, status, metadata, paid_at, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13) RETURNING *")
                    .bind(c.user_id).bind(&c.user_uid).bind(c.order_id).bind(c.order_item_id)
                    .bind(&c.product_id).bind(&c.product_name).bind(c.product_price).bind(c.commission_rate)
                    .bind(c.commission_amount).bind(c.status.as_str()).bind(&c.metadata).bind(c.paid_at).bind(c.created_at)
                    .fetch_one(&mut *tx).await?;
                commissions.push(c);
            }
            items.push(row);
        }

        tx.commit().await?;
        Ok(OrderAggregate { order, items, commissions })
    }

    async fn find_for_owner(&self, owner_id: i64, order_id: i64) -> Result<Option<OrderAggregate>> {
        let mut conn = self.pool.acquire().await?;
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
            .bind(order_id).bind(owner_id).fetch_optional(&mut *conn).await?;
        let Some(order) = order else { return Ok(None) };
        Ok(load(&mut conn, vec![order]).await?.pop())
    }

    async fn list_for_owner(&self, owner_id: i64, status: Option<OrderStatus>) -> Result<Vec<OrderAggregate>> {
        let mut conn = self.pool.acquire().await?;
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 AND ($2::text IS NULL OR status = $2) ORDER BY created_at DESC, id DESC")
            .bind(owner_id).bind(status.map(|s| s.as_str())).fetch_all(&mut *conn).await?;
        load(&mut conn, orders).await
    }

    async fn transition(&self, owner_id: i64, order_id: i64, to: OrderStatus, now: DateTime<Utc>) -> Result<Option<StatusChange>> {
        let mut tx = self.pool.begin().await?;
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(order_id).bind(owner_id).fetch_optional(&mut *tx).await?;
        let Some(order) = order else { return Ok(None) };
        let transition = order.transition_to(to)?;

        let order = sqlx::query_as::<_, Order>("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *")
            .bind(order.id).bind(to.as_str()).bind(now).fetch_one(&mut *tx).await?;

        let commissions_updated = match transition.cascade {
            Some(status) => sqlx::query(
                "UPDATE commissions SET status = $2, paid_at = CASE WHEN $2 = 'paid' THEN COALESCE(paid_at, $3) ELSE paid_at END, updated_at = $3 \
                 WHERE order_id = $1 AND (status <> $2 OR ($2 = 'paid' AND paid_at IS NULL))")
                .bind(order.id).bind(status.as_str()).bind(now)
                .execute(&mut *tx).await?.rows_affected() as usize,
            None => 0,
        };

        let order = load(&mut *tx, vec![order]).await?.pop()
            .ok_or_else(|| BuyvError::Internal("order vanished during transition".into()))?;
        tx.commit().await?;
        Ok(Some(StatusChange { transition, commissions_updated, order }))
    }

    async fn set_tracking(&self, owner_id: i64, order_id: i64, tracking_number: &str, now: DateTime<Utc>) -> Result<Option<Order>> {
        Ok(sqlx::query_as::<_, Order>("UPDATE orders SET tracking_number = $3, updated_at = $4 WHERE id = $1 AND user_id = $2 RETURNING *")
            .bind(order_id).bind(owner_id).bind(tracking_number).bind(now)
            .fetch_optional(&self.pool).await?)
    }

    async fn commissions_for_promoter(&self, promoter_id: i64, status: Option<CommissionStatus>) -> Result<Vec<Commission>> {
        Ok(sqlx::query_as::<_, Commission>(
            "SELECT * FROM commissions WHERE user_id = $1 AND ($2::text IS NULL OR status = $2) ORDER BY created_at DESC, id DESC")
            .bind(promoter_id).bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool).await?)
    }
}
