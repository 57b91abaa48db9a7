//! Storefront API configuration module.
//!
//! Configuration is loaded once at startup from environment variables (a
//! `.env` file is honoured by `main`) and shared read-only afterwards.

use std::env;
use std::time::Duration;

use serde::Serialize;
use storefront_core::{Percent, TaxRate};
use storefront_db::DbConfig;
use storefront_gateway::{Environment, MidtransConfig};

/// Allowed range for the gateway HTTP timeout, in seconds.
pub const GATEWAY_TIMEOUT_RANGE: (u64, u64) = (10, 30);

/// Storefront API configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// HTTP listen port
    pub port: u16,

    /// Public base URL, used to build the gateway callback URLs
    pub app_url: String,

    /// SQLite database path
    pub database_url: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Gateway server key (basic-auth user and signature secret)
    #[serde(skip)]
    pub server_key: String,

    /// Gateway client key, handed to the browser-side Snap script
    pub client_key: String,

    /// Gateway environment
    pub environment: Environment,

    /// Reject notifications whose signature does not verify
    pub verify_signature: bool,

    /// Gateway HTTP timeout
    pub gateway_timeout: Duration,

    /// Per-request deadline
    pub request_timeout: Duration,

    /// Process-wide tax percent
    pub tax_percent: TaxRate,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingRequired(key.to_string()))
        };

        let gateway_timeout_secs: u64 = get("GATEWAY_TIMEOUT_SECS", "15")
            .parse()
            .map_err(|_| ConfigError::InvalidValue("GATEWAY_TIMEOUT_SECS".to_string()))?;

        let config = AppConfig {
            port: get("APP_PORT", "8080")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("APP_PORT".to_string()))?,

            app_url: get("APP_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_string(),

            database_url: get("DATABASE_URL", "storefront.db"),

            db_max_connections: get("DB_MAX_CONNECTIONS", "5")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,

            server_key: required("MIDTRANS_SERVER_KEY")?,

            client_key: required("MIDTRANS_CLIENT_KEY")?,

            environment: get("MIDTRANS_ENVIRONMENT", "sandbox")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MIDTRANS_ENVIRONMENT".to_string()))?,

            verify_signature: parse_bool(&get("MIDTRANS_VERIFY_SIGNATURE", "true"))
                .ok_or_else(|| ConfigError::InvalidValue("MIDTRANS_VERIFY_SIGNATURE".to_string()))?,

            gateway_timeout: Duration::from_secs(
                gateway_timeout_secs.clamp(GATEWAY_TIMEOUT_RANGE.0, GATEWAY_TIMEOUT_RANGE.1),
            ),

            request_timeout: Duration::from_secs(
                get("REQUEST_TIMEOUT_SECS", "45")
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string()))?,
            ),

            tax_percent: get("TAX_PERCENT", "12.00")
                .parse::<Percent>()
                .map_err(|_| ConfigError::InvalidValue("TAX_PERCENT".to_string()))?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    /// Writers queue behind a checkout for as long as its gateway call may
    /// take, plus slack for the statements around it.
    pub fn db_config(&self) -> DbConfig {
        let lock_wait = self.gateway_timeout + Duration::from_secs(5);
        DbConfig::new(&self.database_url)
            .max_connections(self.db_max_connections)
            .busy_timeout(lock_wait)
            .connect_timeout(lock_wait)
    }

    pub fn gateway_config(&self) -> MidtransConfig {
        MidtransConfig::new(&self.server_key, &self.client_key)
            .environment(self.environment)
            .timeout(self.gateway_timeout)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
