//! Buyv backend server

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buyv_backend::api::{router, AppState};
use buyv_backend::auth::TokenKeys;
use buyv_backend::config::Config;
use buyv_backend::payments::StripeGateway;
use buyv_backend::publisher::EventPublisher;
use buyv_backend::store::PgOrderStore;
use buyv_backend::workflow::OrderWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new().max_connections(config.max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, order events will not be published");
                None
            }
        },
        None => None,
    };
    if config.stripe_secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set, payment intents will fail");
    }

    let state = AppState {
        tokens: TokenKeys::new(config.secret_key.as_bytes(), config.token_ttl_minutes),
        orders: OrderWorkflow::new(Arc::new(PgOrderStore::new(db.clone())), EventPublisher::new(nats)),
        payments: Arc::new(StripeGateway::new(config.stripe_api_base.clone(), config.stripe_secret_key.clone(), config.stripe_publishable_key.clone())),
        db,
    };

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Buyv backend listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, router(state)).await?;
    Ok(())
}
