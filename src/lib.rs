//! Buyv social-commerce backend
//!
//! Accounts, a follow graph and content feed, plus a checkout pipeline
//! that credits promoters with commissions on the products they push.
//!
//! ## Features
//! - Bearer-token identity and Argon2 password storage
//! - Follows, posts/reels, likes, bookmarks and comments
//! - Orders with derived promoter commissions kept in step with order status
//! - Stripe payment sheet sessions
//! - Optional NATS publishing of order events

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod payments;
pub mod publisher;
pub mod store;
pub mod workflow;

use domain::aggregates::{OrderError, OrderStatus};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum BuyvError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Payment provider error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BuyvError>;

impl BuyvError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated | Self::InvalidToken | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<OrderError> for BuyvError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for BuyvError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

impl IntoResponse for BuyvError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = match &self {
            Self::Storage(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

/// Name of the unique constraint `err` violated, if that is what it is.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => db.constraint(),
        _ => None,
    }
}
