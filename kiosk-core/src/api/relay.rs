//! HTTP client for the upload relay.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Server error: {status}: {body}")]
    Server { status: StatusCode, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("Response did not contain a url")]
    MissingUrl,
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    url: Option<String>,
}

/// Something that turns a snapshot data URL into a public link.
pub trait Relay: Send + Sync {
    fn upload(&self, image_data_url: String) -> BoxFuture<'static, Result<String, RelayError>>;
}

/// HTTP client for the relay's `POST /upload`
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    upload_url: Url,
}

impl RelayClient {
    pub fn new(upload_url: Url, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, upload_url })
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }

    /// Upload a `data:image/png;base64,...` snapshot and return its public URL
    pub async fn upload_image(&self, image_data_url: &str) -> Result<String, RelayError> {
        log::info!(
            "Uploading snapshot ({} bytes) to {}",
            image_data_url.len(),
            self.upload_url
        );

        let response = self
            .client
            .post(self.upload_url.clone())
            .json(&UploadRequest {
                image: image_data_url,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RelayError::Server { status, body });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)?;
        match parsed.url {
            Some(url) if !url.trim().is_empty() => {
                log::info!("Snapshot available at {}", url);
                Ok(url)
            }
            _ => {
                log::warn!("Relay answered without a url: {}", body);
                Err(RelayError::MissingUrl)
            }
        }
    }
}

impl Relay for RelayClient {
    fn upload(&self, image_data_url: String) -> BoxFuture<'static, Result<String, RelayError>> {
        let client = self.clone();
        async move { client.upload_image(&image_data_url).await }.boxed()
    }
}
