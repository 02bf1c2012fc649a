//! Order endpoints. All reads and writes are scoped to the caller's own orders.

use axum::{extract::{Path, Query, State}, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::AppState;
use crate::auth::AuthUser;
use crate::domain::aggregates::{NewOrder, OrderAggregate, OrderItem};
use crate::Result;

#[derive(Debug, Serialize)]
pub struct PaymentInfo { pub method: Option<String>, pub status: String, pub amount: Decimal }

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub id: i64,
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub attributes: Value,
    pub is_promoted_product: bool,
    pub promoter_uid: Option<String>,
}

impl From<OrderItem> for OrderItemView {
    fn from(i: OrderItem) -> Self {
        Self {
            id: i.id, product_id: i.product_id, product_name: i.product_name, product_image: i.product_image,
            price: i.price, quantity: i.quantity, size: i.size, color: i.color, attributes: i.attributes,
            is_promoted_product: i.is_promoted_product, promoter_uid: i.promoter_uid,
        }
    }
}

/// Order as clients see it. Totals are the stored ones, never recomputed.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: i64,
    pub user_id: i64,
    pub order_number: String,
    pub items: Vec<OrderItemView>,
    pub status: String,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total_amount: Decimal,
    pub shipping_address: Option<Value>,
    pub payment_info: PaymentInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub notes: String,
    pub promoter_uid: Option<String>,
}

impl From<OrderAggregate> for OrderView {
    fn from(a: OrderAggregate) -> Self {
        let o = a.order;
        Self {
            payment_info: PaymentInfo { method: o.payment_method, status: o.status.clone(), amount: o.total },
            id: o.id, user_id: o.user_id, order_number: o.order_number,
            items: a.items.into_iter().map(OrderItemView::from).collect(),
            status: o.status, subtotal: o.subtotal, shipping: o.shipping, tax: o.tax, total_amount: o.total,
            shipping_address: o.shipping_address, created_at: o.created_at, updated_at: o.updated_at,
            estimated_delivery: o.estimated_delivery, tracking_number: o.tracking_number,
            notes: o.notes.unwrap_or_default(), promoter_uid: o.promoter_uid,
        }
    }
}

fn ok() -> Json<Value> { Json(json!({"status": "ok"})) }

pub async fn create(State(s): State<AppState>, AuthUser(me): AuthUser, Json(r): Json<NewOrder>) -> Result<Json<OrderView>> {
    Ok(Json(s.orders.place(me.id, r).await?.into()))
}

pub async fn list_mine(State(s): State<AppState>, AuthUser(me): AuthUser) -> Result<Json<Vec<OrderView>>> {
    let orders = s.orders.list(me.id, None).await?;
    Ok(Json(orders.into_iter().map(OrderView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct StatusParams { pub status: String }

pub async fn list_mine_by_status(State(s): State<AppState>, AuthUser(me): AuthUser, Query(p): Query<StatusParams>) -> Result<Json<Vec<OrderView>>> {
    let orders = s.orders.list(me.id, Some(&p.status)).await?;
    Ok(Json(orders.into_iter().map(OrderView::from).collect()))
}

pub async fn get_order(State(s): State<AppState>, AuthUser(me): AuthUser, Path(id): Path<i64>) -> Result<Json<OrderView>> {
    Ok(Json(s.orders.get(me.id, id).await?.into()))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate { pub status: String }

pub async fn update_status(State(s): State<AppState>, AuthUser(me): AuthUser, Path(id): Path<i64>, Json(r): Json<StatusUpdate>) -> Result<Json<Value>> {
    s.orders.change_status(me.id, id, &r.status).await?;
    Ok(ok())
}

pub async fn cancel(State(s): State<AppState>, AuthUser(me): AuthUser, Path(id): Path<i64>) -> Result<Json<Value>> {
    s.orders.cancel(me.id, id).await?;
    Ok(ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingUpdate {
    #[serde(alias = "tracking_number")]
    pub tracking_number: String,
}

pub async fn update_tracking(State(s): State<AppState>, AuthUser(me): AuthUser, Path(id): Path<i64>, Json(r): Json<TrackingUpdate>) -> Result<Json<Value>> {
    s.orders.update_tracking(me.id, id, &r.tracking_number).await?;
    Ok(ok())
}
