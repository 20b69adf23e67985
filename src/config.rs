use anyhow::Context;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub horizon_url: String,
    pub admin_api_key: String,
    pub webhook_secret: String,
    /// Per-request bound on ledger calls (seconds). Not the business
    /// expiry window.
    pub ledger_timeout_secs: u64,
    pub confirmation_depth: i64,
    /// How long a transaction may stay unseen by the ledger before it
    /// counts as expired (seconds).
    pub pending_expiry_secs: i64,
    pub reconcile_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            horizon_url: env::var("STELLAR_HORIZON_URL")
                .context("STELLAR_HORIZON_URL is required")?,
            admin_api_key: env::var("ADMIN_API_KEY").context("ADMIN_API_KEY is required")?,
            webhook_secret: env::var("STATUS_WEBHOOK_SECRET")
                .context("STATUS_WEBHOOK_SECRET is required")?,
            ledger_timeout_secs: env::var("LEDGER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("LEDGER_TIMEOUT_SECS must be a number of seconds")?,
            confirmation_depth: env::var("CONFIRMATION_DEPTH")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("CONFIRMATION_DEPTH must be a number")?,
            pending_expiry_secs: env::var("PENDING_EXPIRY_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("PENDING_EXPIRY_SECS must be a number of seconds")?,
            reconcile_interval_secs: env::var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("RECONCILE_INTERVAL_SECS must be a number of seconds")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if self.admin_api_key.is_empty() {
            anyhow::bail!("ADMIN_API_KEY is empty");
        }
        if self.webhook_secret.is_empty() {
            anyhow::bail!("STATUS_WEBHOOK_SECRET is empty");
        }
        if self.server_port == 0 {
            anyhow::bail!("SERVER_PORT must be greater than 0");
        }
        if self.pending_expiry_secs <= self.ledger_timeout_secs as i64 {
            anyhow::bail!("PENDING_EXPIRY_SECS must exceed LEDGER_TIMEOUT_SECS");
        }

        url::Url::parse(&self.horizon_url).context("STELLAR_HORIZON_URL is not a valid URL")?;

        Ok(())
    }
}
