use axum::{extract::{Query, State}, Json};
use serde::Deserialize;

use super::AppState;
use crate::auth::AuthUser;
use crate::domain::aggregates::Commission;
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct CommissionParams { pub status: Option<String> }

/// Commissions earned by the caller as a promoter, newest first.
pub async fn list_mine(State(s): State<AppState>, AuthUser(me): AuthUser, Query(p): Query<CommissionParams>) -> Result<Json<Vec<Commission>>> {
    Ok(Json(s.orders.promoter_commissions(me.id, p.status.as_deref()).await?))
}
