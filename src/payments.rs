//! Payment provider adapter.
//!
//! Mints the secrets a mobile payment sheet needs: a provider customer
//! for the buyer, an ephemeral key scoped to that customer, and a
//! payment intent. Nothing is stored locally.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{BuyvError, Result};

/// Provider API version the ephemeral keys are minted for.
pub const STRIPE_VERSION: &str = "2023-10-16";

/// Buyer identity handed to the provider.
#[derive(Debug, Clone)]
pub struct PaymentCustomer { pub uid: String, pub email: String, pub name: String }

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSheet {
    pub client_secret: String,
    pub ephemeral_key: String,
    pub customer: String,
    pub publishable_key: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `amount` is in the currency's minor unit.
    async fn create_payment_sheet(&self, customer: &PaymentCustomer, amount: i64, currency: &str) -> Result<PaymentSheet>;
}

pub struct StripeGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
    publishable_key: String,
}

#[derive(Deserialize)] struct List<T> { data: Vec<T> }
#[derive(Deserialize)] struct Customer { id: String }
#[derive(Deserialize)] struct EphemeralKey { secret: String }
#[derive(Deserialize)] struct PaymentIntent { client_secret: String }
#[derive(Deserialize)] struct ErrorBody { error: ErrorDetail }
#[derive(Deserialize)] struct ErrorDetail { message: Option<String> }

impl StripeGateway {
    pub fn new(base_url: impl Into<String>, secret_key: Option<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key,
            publishable_key: publishable_key.into(),
        }
    }

    fn key(&self) -> Result<&str> {
        self.secret_key.as_deref().ok_or_else(|| BuyvError::Upstream("payment provider is not configured".into()))
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(self.key()?).send().await
            .map_err(|e| BuyvError::Upstream(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.json::<ErrorBody>().await.ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("provider returned {}", status));
            return Err(BuyvError::Upstream(message));
        }
        response.json::<T>().await.map_err(|e| BuyvError::Upstream(format!("unexpected provider response: {}", e)))
    }

    async fn find_or_create_customer(&self, customer: &PaymentCustomer) -> Result<String> {
        let found: List<Customer> = self.send(
            self.http.get(format!("{}/v1/customers", self.base_url)).query(&[("email", customer.email.as_str()), ("limit", "1")])
        ).await?;
        if let Some(existing) = found.data.into_iter().next() {
            return Ok(existing.id);
        }
        let created: Customer = self.send(
            self.http.post(format!("{}/v1/customers", self.base_url)).form(&[
                ("email", customer.email.as_str()),
                ("name", customer.name.as_str()),
                ("metadata[uid]", customer.uid.as_str()),
            ])
        ).await?;
        tracing::info!(uid = %customer.uid, customer = %created.id, "created payment customer");
        Ok(created.id)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_sheet(&self, customer: &PaymentCustomer, amount: i64, currency: &str) -> Result<PaymentSheet> {
        self.key()?;
        let customer_id = self.find_or_create_customer(customer).await?;

        let key: EphemeralKey = self.send(
            self.http.post(format!("{}/v1/ephemeral_keys", self.base_url))
                .header("Stripe-Version", STRIPE_VERSION)
                .form(&[("customer", customer_id.as_str())])
        ).await?;

        let amount = amount.to_string();
        let intent: PaymentIntent = self.send(
            self.http.post(format!("{}/v1/payment_intents", self.base_url)).form(&[
                ("amount", amount.as_str()),
                ("currency", currency),
                ("customer", customer_id.as_str()),
                ("automatic_payment_methods[enabled]", "true"),
            ])
        ).await?;

        Ok(PaymentSheet {
            client_secret: intent.client_secret,
            ephemeral_key: key.secret,
            customer: customer_id,
            publishable_key: self.publishable_key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::{Form, Query}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
    use std::collections::HashMap;

    fn customer() -> PaymentCustomer {
        PaymentCustomer { uid: "U1".into(), email: "u1@example.com".into(), name: "U One".into() }
    }

    async fn stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_payment_sheet_for_new_customer() {
        let router = Router::new()
            .route("/v1/customers", get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q["email"], "u1@example.com");
                Json(serde_json::json!({"data": []}))
            }).post(|Form(f): Form<HashMap<String, String>>| async move {
                assert_eq!(f["metadata[uid]"], "U1");
                Json(serde_json::json!({"id": "cus_1"}))
            }))
            .route("/v1/ephemeral_keys", post(|headers: HeaderMap, Form(f): Form<HashMap<String, String>>| async move {
                assert_eq!(headers["stripe-version"], STRIPE_VERSION);
                assert_eq!(headers["authorization"], "Bearer sk_test");
                assert_eq!(f["customer"], "cus_1");
                Json(serde_json::json!({"secret": "ek_1"}))
            }))
            .route("/v1/payment_intents", post(|Form(f): Form<HashMap<String, String>>| async move {
                assert_eq!(f["amount"], "2599");
                assert_eq!(f["currency"], "usd");
                assert_eq!(f["automatic_payment_methods[enabled]"], "true");
                Json(serde_json::json!({"client_secret": "pi_1_secret"}))
            }));
        let gateway = StripeGateway::new(stub(router).await, Some("sk_test".into()), "pk_test");

        let sheet = gateway.create_payment_sheet(&customer(), 2599, "usd").await.unwrap();
        assert_eq!(sheet, PaymentSheet {
            client_secret: "pi_1_secret".into(), ephemeral_key: "ek_1".into(), customer: "cus_1".into(), publishable_key: "pk_test".into(),
        });
        let json = serde_json::to_value(&sheet).unwrap();
        assert_eq!(json["clientSecret"], "pi_1_secret");
        assert_eq!(json["ephemeralKey"], "ek_1");
    }

    #[tokio::test]
    async fn test_existing_customer_reused_and_errors_surface() {
        let router = Router::new()
            .route("/v1/customers", get(|| async { Json(serde_json::json!({"data": [{"id": "cus_existing"}]})) }))
            .route("/v1/ephemeral_keys", post(|Form(f): Form<HashMap<String, String>>| async move {
                assert_eq!(f["customer"], "cus_existing");
                Json(serde_json::json!({"secret": "ek_2"}))
            }))
            .route("/v1/payment_intents", post(|| async {
                (StatusCode::PAYMENT_REQUIRED, Json(serde_json::json!({"error": {"message": "Your card was declined."}})))
            }));
        let gateway = StripeGateway::new(stub(router).await, Some("sk_test".into()), "");

        match gateway.create_payment_sheet(&customer(), 100, "usd").await {
            Err(BuyvError::Upstream(message)) => assert_eq!(message, "Your card was declined."),
            other => panic!("expected upstream error, got {:?}", other.map(|s| s.customer)),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_gateway() {
        let gateway = StripeGateway::new("http://127.0.0.1:9", None, "");
        assert!(matches!(gateway.create_payment_sheet(&customer(), 100, "usd").await, Err(BuyvError::Upstream(_))));
    }
}
