use axum::{extract::State, Json};
use serde::Deserialize;

use super::AppState;
use crate::auth::AuthUser;
use crate::payments::{PaymentCustomer, PaymentSheet};
use crate::{BuyvError, Result};

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    /// Minor currency units.
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String { "usd".into() }

pub async fn create_payment_intent(State(s): State<AppState>, AuthUser(me): AuthUser, Json(r): Json<PaymentIntentRequest>) -> Result<Json<PaymentSheet>> {
    if r.amount <= 0 { return Err(BuyvError::Validation("Amount must be positive".into())); }
    let customer = PaymentCustomer { uid: me.uid.clone(), email: me.email.clone(), name: me.display_name.clone() };
    match s.payments.create_payment_sheet(&customer, r.amount, &r.currency.to_lowercase()).await {
        Ok(sheet) => Ok(Json(sheet)),
        Err(e) => {
            tracing::warn!(uid = %me.uid, amount = r.amount, error = %e, "payment sheet creation failed");
            Err(e)
        }
    }
}
