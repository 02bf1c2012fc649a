//! Environment-driven configuration.

use anyhow::{bail, Context};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub port: u16,
    pub secret_key: String,
    pub token_ttl_minutes: i64,
    pub stripe_secret_key: Option<String>,
    pub stripe_publishable_key: String,
    pub stripe_api_base: String,
    pub nats_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let secret_key = get("SECRET_KEY").context("SECRET_KEY must be set")?;
        if secret_key.len() < 16 {
            bail!("SECRET_KEY must be at least 16 characters");
        }
        let port = get("PORT").map(|v| v.parse::<u16>()).transpose().context("PORT must be a port number")?.unwrap_or(8000);
        let max_connections = get("DATABASE_MAX_CONNECTIONS").map(|v| v.parse::<u32>()).transpose()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?.unwrap_or(10);
        let token_ttl_minutes = get("ACCESS_TOKEN_EXPIRE_MINUTES").map(|v| v.parse::<i64>()).transpose()
            .context("ACCESS_TOKEN_EXPIRE_MINUTES must be an integer")?.unwrap_or(30);
        if token_ttl_minutes <= 0 {
            bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be positive");
        }

        Ok(Self {
            database_url,
            max_connections,
            port,
            secret_key,
            token_ttl_minutes,
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            stripe_publishable_key: get("STRIPE_PUBLISHABLE_KEY").unwrap_or_default(),
            stripe_api_base: get("STRIPE_API_BASE").unwrap_or_else(|| STRIPE_API_BASE.to_string()),
            nats_url: get("NATS_URL"),
        })
    }
}
