//! Configuration constants for the SnapQR booth.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Relay upload endpoint used when `SNAPQR_RELAY_URL` is not set
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3000/upload";

/// Environment variable overriding the relay upload endpoint
pub const RELAY_URL_ENV: &str = "SNAPQR_RELAY_URL";

/// Seconds the QR stays up without activity
pub const IDLE_TIMEOUT_SECS: u64 = 30;

/// Seconds between auto-close and the full reload
pub const RESET_TIMEOUT_SECS: u64 = 10;

/// Seconds after start-up before the manual refresh control appears
pub const MANUAL_REFRESH_REVEAL_SECS: u64 = 180;

/// Minimum QR code edge in pixels
pub const QR_SIZE: u32 = 220;

/// Upper bound for a single relay round trip
pub const UPLOAD_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid relay URL {value:?}: {source}")]
    InvalidRelayUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Relay URL must use http or https, got {0}")]
    UnsupportedScheme(String),
}

/// Durations driving the two session countdowns and the refresh reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub idle: Duration,
    pub reset: Duration,
    pub manual_refresh_reveal: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(IDLE_TIMEOUT_SECS),
            reset: Duration::from_secs(RESET_TIMEOUT_SECS),
            manual_refresh_reveal: Duration::from_secs(MANUAL_REFRESH_REVEAL_SECS),
        }
    }
}

/// Start-up configuration for a booth.
#[derive(Debug, Clone)]
pub struct BoothConfig {
    pub relay_url: Url,
    pub timings: Timings,
    pub qr_size: u32,
    /// Flip snapshots horizontally so they match the selfie preview
    pub mirror: bool,
    pub upload_timeout: Duration,
}

impl BoothConfig {
    /// Build a config for the given relay endpoint with default timings.
    pub fn new(relay_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            relay_url: parse_relay_url(relay_url)?,
            timings: Timings::default(),
            qr_size: QR_SIZE,
            mirror: true,
            upload_timeout: Duration::from_secs(UPLOAD_TIMEOUT_SECS),
        })
    }

    /// Read the relay endpoint from `SNAPQR_RELAY_URL`, falling back to
    /// [`DEFAULT_RELAY_URL`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let relay_url = std::env::var(RELAY_URL_ENV).unwrap_or_else(|_| DEFAULT_RELAY_URL.into());
        Self::new(&relay_url)
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }
}

fn parse_relay_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidRelayUrl {
        value: value.to_string(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}
