//! Process configuration, read from `SHIPSYNC_*` environment variables.

use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid bind address {value:?}: {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

/// Top-level process configuration. Worker tuning lives with the workers
/// ([`PollConfig`](crate::poll::PollConfig),
/// [`ConsumerConfig`](crate::queue::ConsumerConfig)).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Base URL of the carrier REST API.
    pub carrier_base_url: String,
    /// Bearer token for the carrier REST API.
    pub carrier_api_key: String,
    /// URL of the carrier's published signing key set.
    pub key_set_url: String,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("SHIPSYNC_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind.clone(),
                source,
            })?;

        Ok(AppConfig {
            bind_addr,
            carrier_base_url: require(&lookup, "SHIPSYNC_CARRIER_BASE_URL")?,
            carrier_api_key: require(&lookup, "SHIPSYNC_CARRIER_API_KEY")?,
            key_set_url: require(&lookup, "SHIPSYNC_KEY_SET_URL")?,
        })
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    lookup(name).ok_or(ConfigError::MissingVar(name))
}
