//! HTTP surface: shared state, the router and the per-resource handlers.

use std::sync::Arc;

use axum::{routing::{get, patch, post}, Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::TokenKeys;
use crate::domain::value_objects::Page;
use crate::payments::PaymentGateway;
use crate::workflow::OrderWorkflow;

mod auth;
mod comments;
mod commissions;
mod follows;
mod orders;
mod payments;
mod posts;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub tokens: TokenKeys,
    pub orders: OrderWorkflow,
    pub payments: Arc<dyn PaymentGateway>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams { pub limit: Option<i64>, pub offset: Option<i64> }

impl ListParams {
    pub fn page(&self) -> Page { Page::new(self.limit, self.offset) }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "ok", "service": "buyv-backend"})) }))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/users/search", get(users::search))
        .route("/users/:uid", get(users::get_user).put(users::update_user))
        .route("/follows/suggested", get(follows::suggested))
        .route("/follows/is_following/:uid", get(follows::is_following))
        .route("/follows/:uid", post(follows::follow).delete(follows::unfollow))
        .route("/follows/:uid/followers", get(follows::followers))
        .route("/follows/:uid/following", get(follows::following))
        .route("/follows/:uid/counts", get(follows::counts))
        .route("/posts", post(posts::create))
        .route("/posts/feed", get(posts::feed))
        .route("/posts/search", get(posts::search))
        .route("/posts/user/:uid", get(posts::by_user))
        .route("/posts/user/:uid/liked", get(posts::liked_by_user))
        .route("/posts/user/:uid/count", get(posts::count_for_user))
        .route("/posts/:uid", get(posts::get_post).delete(posts::delete))
        .route("/posts/:uid/like", post(posts::like).delete(posts::unlike))
        .route("/posts/:uid/is_liked", get(posts::is_liked))
        .route("/posts/:uid/bookmark", post(posts::bookmark).delete(posts::unbookmark))
        .route("/posts/:uid/is_bookmarked", get(posts::is_bookmarked))
        .route("/comments/:post_uid", get(comments::list).post(comments::create))
        .route("/orders", post(orders::create))
        .route("/orders/me", get(orders::list_mine))
        .route("/orders/me/by_status", get(orders::list_mine_by_status))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/status", patch(orders::update_status))
        .route("/orders/:id/cancel", post(orders::cancel))
        .route("/orders/:id/tracking", patch(orders::update_tracking))
        .route("/commissions/me", get(commissions::list_mine))
        .route("/payments/create-payment-intent", post(payments::create_payment_intent))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
