//! `POST /upload` pass-through to the storage script.
//!
//! The relay exists for CORS and to keep the script URL off the kiosk. It
//! forwards the parsed JSON body re-serialized (same values, key order and
//! whitespace not preserved) and hands back whatever the upstream said,
//! status and body, without retrying or reshaping it.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use url::Url;

use crate::config::{RelayConfig, UPSTREAM_TIMEOUT_SECS};

/// Longest upstream body echoed into the log
const LOG_PREVIEW_CHARS: usize = 300;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        log::error!("Proxy error: {}", self);
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Shared state for the relay routes
struct ProxyState {
    client: reqwest::Client,
    upstream: Url,
}

/// Build the relay router for `config`.
pub fn router(config: &RelayConfig) -> Result<Router, ProxyError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
        .build()?;

    let state = Arc::new(ProxyState {
        client,
        upstream: config.upstream_url.clone(),
    });

    Ok(Router::new()
        .route("/upload", post(upload))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state))
}

/// POST /upload: forward the re-serialized body, answer with the upstream response
async fn upload(
    State(state): State<Arc<ProxyState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ProxyError> {
    let image_len = body
        .get("image")
        .and_then(|v| v.as_str())
        .map(str::len)
        .unwrap_or(0);
    log::info!("Upload received ({} bytes of image data)", image_len);

    let upstream = state
        .client
        .post(state.upstream.clone())
        .json(&body)
        .send()
        .await?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let text = upstream.text().await?;
    log::info!("Upstream answered {}: {}", status, preview(&text));

    Ok((status, [(header::CONTENT_TYPE, "application/json")], text).into_response())
}

/// GET /health: liveness probe
async fn health() -> &'static str {
    "ok"
}

fn preview(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{}… ({} bytes)", head, text.len())
    }
}
