use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::utils::CircuitBreakerConfig;

// ============================================================================
// Configuration
// ============================================================================
//
// Read once at startup from the environment, after loading `.env` if present.
// Every setting has a default except the webhook secret, whose absence turns
// the webhook endpoint into a 500.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Scylla,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "scylla" | "scylladb" => Ok(StoreBackend::Scylla),
            other => bail!("unknown order store '{}', expected memory or scylla", other),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,

    pub store: StoreBackend,
    pub scylla_node: String,
    pub scylla_keyspace: String,

    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,
    pub currency: String,
    pub allowed_country: String,

    pub notify_failure_threshold: u32,
    pub notify_cooldown: Duration,
}

// Keeps the webhook secret out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("store", &self.store)
            .field("scylla_node", &self.scylla_node)
            .field("scylla_keyspace", &self.scylla_keyspace)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .field("currency", &self.currency)
            .field("allowed_country", &self.allowed_country)
            .field("notify_failure_threshold", &self.notify_failure_threshold)
            .field("notify_cooldown", &self.notify_cooldown)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let config = Self {
            server_host: text("SERVER_HOST", "127.0.0.1"),
            server_port: parse(&lookup, "SERVER_PORT", 8080)?,
            store: parse(&lookup, "ORDER_STORE", StoreBackend::Memory)?,
            scylla_node: text("SCYLLA_NODE", "127.0.0.1:9042"),
            scylla_keyspace: text("SCYLLA_KEYSPACE", "marketplace_ks"),
            webhook_secret: lookup("PAYMENT_WEBHOOK_SECRET").filter(|s| !s.trim().is_empty()),
            webhook_tolerance_secs: parse(&lookup, "WEBHOOK_TOLERANCE_SECS", 300)?,
            currency: text("PAYMENT_CURRENCY", "usd").to_ascii_lowercase(),
            allowed_country: text("ALLOWED_COUNTRY", "US"),
            notify_failure_threshold: parse(&lookup, "NOTIFY_FAILURE_THRESHOLD", 5)?,
            notify_cooldown: Duration::from_secs(parse(&lookup, "NOTIFY_COOLDOWN_SECS", 30)?),
        };

        if config.webhook_tolerance_secs <= 0 {
            bail!("WEBHOOK_TOLERANCE_SECS must be positive");
        }
        if config.notify_failure_threshold == 0 {
            bail!("NOTIFY_FAILURE_THRESHOLD must be at least 1");
        }
        if !config
            .scylla_keyspace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            bail!("SCYLLA_KEYSPACE may only contain letters, digits and underscores");
        }

        Ok(config)
    }

    pub fn notification_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.notify_failure_threshold,
            cooldown: self.notify_cooldown,
        }
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid {} value '{}'", key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.scylla_keyspace, "marketplace_ks");
        assert_eq!(config.webhook_secret, None);
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert_eq!(config.currency, "usd");
        assert_eq!(config.allowed_country, "US");
        assert_eq!(config.notification_breaker().failure_threshold, 5);
        assert_eq!(config.notify_cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SERVER_PORT", "9000"),
            ("ORDER_STORE", "Scylla"),
            ("PAYMENT_WEBHOOK_SECRET", "whsec_live"),
            ("PAYMENT_CURRENCY", "EUR"),
        ])
        .unwrap();

        assert_eq!(config.server_port, 9000);
        assert_eq!(config.store, StoreBackend::Scylla);
        assert_eq!(config.webhook_secret.as_deref(), Some("whsec_live"));
        assert_eq!(config.currency, "eur");
        assert!(!format!("{:?}", config).contains("whsec_live"));
    }

    #[test]
    fn test_invalid_values_fail_startup() {
        assert!(config_from(&[("SERVER_PORT", "eighty")]).is_err());
        assert!(config_from(&[("ORDER_STORE", "postgres")]).is_err());
        assert!(config_from(&[("WEBHOOK_TOLERANCE_SECS", "0")]).is_err());
        assert!(config_from(&[("NOTIFY_FAILURE_THRESHOLD", "0")]).is_err());
        assert!(config_from(&[("SCYLLA_KEYSPACE", "ks; DROP")]).is_err());
    }

    #[test]
    fn test_blank_secret_counts_as_missing() {
        let config = config_from(&[("PAYMENT_WEBHOOK_SECRET", "  ")]).unwrap();
        assert!(config.webhook_secret.is_none());
    }
}
