use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub token_secret: String,
    pub token_ttl_hours: i64,
    pub store_url: String,
    pub store_api_key: String,
    pub store_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            bind_addr: env::var("MEDICUS_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            token_secret: env::var("MEDICUS_TOKEN_SECRET")
                .unwrap_or_else(|_| {
                    warn!("MEDICUS_TOKEN_SECRET not set, using empty value");
                    String::new()
                }),
            token_ttl_hours: env::var("MEDICUS_TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            store_url: env::var("MEDICUS_STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("MEDICUS_STORE_URL not set, falling back to the in-memory store");
                    String::new()
                }),
            store_api_key: env::var("MEDICUS_STORE_API_KEY")
                .unwrap_or_else(|_| String::new()),
            store_timeout_secs: env::var("MEDICUS_STORE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.token_secret.is_empty()
    }

    pub fn has_rest_store(&self) -> bool {
        !self.store_url.is_empty()
    }
}
