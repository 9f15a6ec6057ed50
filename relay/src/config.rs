//! Configuration for the upload relay.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

/// Address the relay listens on when `SNAPQR_RELAY_BIND` is not set
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// Largest accepted request body (base64 PNG snapshots are a few MiB)
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound for one upstream round trip
pub const UPSTREAM_TIMEOUT_SECS: u64 = 60;

pub const UPSTREAM_URL_ENV: &str = "SNAPQR_UPSTREAM_URL";
pub const BIND_ENV: &str = "SNAPQR_RELAY_BIND";
pub const BODY_LIMIT_ENV: &str = "SNAPQR_BODY_LIMIT_BYTES";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("SNAPQR_UPSTREAM_URL is not set")]
    MissingUpstream,
    #[error("Invalid upstream URL {value:?}: {source}")]
    InvalidUpstream {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid bind address {0:?}")]
    InvalidBind(String),
    #[error("Invalid body limit {0:?}")]
    InvalidBodyLimit(String),
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Script endpoint every upload is forwarded to
    pub upstream_url: Url,
    pub bind: SocketAddr,
    pub body_limit: usize,
}

impl RelayConfig {
    pub fn new(upstream_url: &str) -> Result<Self, ConfigError> {
        let upstream_url =
            Url::parse(upstream_url).map_err(|source| ConfigError::InvalidUpstream {
                value: upstream_url.to_string(),
                source,
            })?;

        Ok(Self {
            upstream_url,
            bind: parse_bind(DEFAULT_BIND)?,
            body_limit: DEFAULT_BODY_LIMIT_BYTES,
        })
    }

    /// Read the relay settings from the environment (and `.env`, if the
    /// binary loaded one).
    pub fn from_env() -> Result<Self, ConfigError> {
        let upstream = std::env::var(UPSTREAM_URL_ENV).map_err(|_| ConfigError::MissingUpstream)?;
        let mut config = Self::new(&upstream)?;

        if let Ok(bind) = std::env::var(BIND_ENV) {
            config.bind = parse_bind(&bind)?;
        }
        if let Ok(limit) = std::env::var(BODY_LIMIT_ENV) {
            config.body_limit = limit
                .parse()
                .map_err(|_| ConfigError::InvalidBodyLimit(limit.clone()))?;
        }

        Ok(config)
    }
}

fn parse_bind(value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidBind(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_defaults() {
        let config = RelayConfig::new("https://script.example.com/macros/s/abc/exec").unwrap();
        assert_eq!(config.bind.port(), 3000);
        assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT_BYTES);
        assert_eq!(config.upstream_url.host_str(), Some("script.example.com"));
    }

    #[test]
    fn test_new_rejects_invalid_upstream() {
        assert!(matches!(
            RelayConfig::new("::nope"),
            Err(ConfigError::InvalidUpstream { .. })
        ));
    }

    #[test]
    fn test_parse_bind() {
        assert!(parse_bind("127.0.0.1:8080").is_ok());
        assert!(matches!(
            parse_bind("localhost"),
            Err(ConfigError::InvalidBind(_))
        ));
    }
}
