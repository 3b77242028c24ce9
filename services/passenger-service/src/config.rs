//! Configuration for the passenger service.
//!
//! Loads configuration from environment variables with sensible defaults.

use airport_contract::BAGGAGE_TOPIC;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to a value that does not parse
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Baggage feed configuration
    pub redpanda: RedpandaConfig,
    /// Baggage service lookups
    pub baggage: BaggageServiceConfig,
    /// Notification ledger bound (`None` = unbounded)
    pub ledger_capacity: Option<usize>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log filter directive
    pub log_level: String,
    /// Install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Baggage feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses (comma-separated); the consumer is disabled when unset
    pub brokers: Option<String>,
    /// Consumer group for the baggage consumer
    pub consumer_group: String,
    /// Topic carrying `BaggageStateChanged` events
    pub baggage_topic: String,
    /// Dead letter queue bound
    pub dlq_max_size: usize,
}

/// Baggage service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggageServiceConfig {
    /// Base URL; `GET /passenger/:id/baggage` answers 503 when unset
    pub url: Option<String>,
    /// Bound on one lookup, in milliseconds
    pub timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric or boolean variable is
    /// set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "PORT", 8081)?,
                log_level: lookup("RUST_LOG").unwrap_or_else(|| "passenger_service=info".to_string()),
                metrics_enabled: parse_or(&lookup, "METRICS_ENABLED", true)?,
                shutdown_timeout: parse_or(&lookup, "SHUTDOWN_TIMEOUT", 30)?,
            },
            redpanda: RedpandaConfig {
                brokers: lookup("REDPANDA_BROKERS").filter(|b| !b.trim().is_empty()),
                consumer_group: lookup("CONSUMER_GROUP")
                    .unwrap_or_else(|| "passenger-service-baggage".to_string()),
                baggage_topic: lookup("BAGGAGE_TOPIC").unwrap_or_else(|| BAGGAGE_TOPIC.to_string()),
                dlq_max_size: parse_or(&lookup, "DLQ_MAX_SIZE", 1000)?,
            },
            baggage: BaggageServiceConfig {
                url: lookup("BAGGAGE_SERVICE_URL").filter(|u| !u.trim().is_empty()),
                timeout_ms: parse_or(&lookup, "BAGGAGE_LOOKUP_TIMEOUT_MS", 5000)?,
            },
            ledger_capacity: parse_opt(&lookup, "LEDGER_CAPACITY")?,
        })
    }

    /// Address to bind the HTTP server to
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Graceful shutdown timeout
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }

    /// Bound on one baggage lookup
    #[must_use]
    pub const fn baggage_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.baggage.timeout_ms)
    }
}

fn parse_opt<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|value| {
            value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(lookup, name)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8081");
        assert!(config.server.metrics_enabled);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.redpanda.brokers, None);
        assert_eq!(config.redpanda.baggage_topic, "baggage-state-change");
        assert_eq!(config.redpanda.dlq_max_size, 1000);
        assert_eq!(config.ledger_capacity, None);
        assert_eq!(config.baggage.url, None);
        assert_eq!(config.baggage_lookup_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("PORT", "9000"),
            ("METRICS_ENABLED", "false"),
            ("REDPANDA_BROKERS", "localhost:9092"),
            ("CONSUMER_GROUP", "ops"),
            ("LEDGER_CAPACITY", " 500 "),
            ("BAGGAGE_SERVICE_URL", "http://baggage:8082"),
            ("BAGGAGE_LOOKUP_TIMEOUT_MS", "750"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(!config.server.metrics_enabled);
        assert_eq!(config.redpanda.brokers.as_deref(), Some("localhost:9092"));
        assert_eq!(config.redpanda.consumer_group, "ops");
        assert_eq!(config.ledger_capacity, Some(500));
        assert_eq!(config.baggage.url.as_deref(), Some("http://baggage:8082"));
        assert_eq!(config.baggage_lookup_timeout(), Duration::from_millis(750));
    }

    #[test]
    fn blank_brokers_disable_the_consumer() {
        let config = load(&[("REDPANDA_BROKERS", "  ")]).unwrap();
        assert_eq!(config.redpanda.brokers, None);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { name: "PORT", ref value, .. } if value == "eighty"
        ));

        assert!(load(&[("LEDGER_CAPACITY", "-1")]).is_err());
    }
}
