//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — Postgres connection string (required)
/// - `STRIPE_SECRET_KEY` — processor API key (required)
/// - `STRIPE_WEBHOOK_SECRET` — webhook signing secret (required)
/// - `STRIPE_BASE_URL` — processor endpoint override (optional)
/// - `GATEWAY_TIMEOUT_SECS` — processor request timeout (default: `10`)
/// - `CURRENCY` — charge currency (default: `"usd"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_base_url: Option<String>,
    pub gateway_timeout: Duration,
    pub currency: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Returns an error naming the first missing required variable.
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: require("DATABASE_URL")?,
            stripe_secret_key: require("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: require("STRIPE_WEBHOOK_SECRET")?,
            stripe_base_url: std::env::var("STRIPE_BASE_URL").ok(),
            gateway_timeout: Duration::from_secs(
                std::env::var("GATEWAY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(10),
            ),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "usd".to_string()),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn require(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("missing required environment variable {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "debug".to_string(),
            database_url: "postgres://localhost/checkout".to_string(),
            stripe_secret_key: "sk_test".to_string(),
            stripe_webhook_secret: "whsec_test".to_string(),
            stripe_base_url: None,
            gateway_timeout: Duration::from_secs(10),
            currency: "usd".to_string(),
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
