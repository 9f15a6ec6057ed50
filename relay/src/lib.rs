//! SnapQR upload relay.
//!
//! A single-route HTTP service: the kiosk posts `{ "image": <data URL> }` to
//! `/upload`, the relay forwards it to the configured script endpoint and
//! returns the script's answer (`{ "url": ... }` on success).

pub mod config;
pub mod proxy;

use thiserror::Error;

pub use config::{ConfigError, RelayConfig};
pub use proxy::{router, ProxyError};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to build relay: {0}")]
    Proxy(#[from] ProxyError),
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the relay until Ctrl-C.
pub async fn serve(config: RelayConfig) -> Result<(), ServeError> {
    let app = router(&config)?;

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServeError::Bind {
            addr: config.bind,
            source,
        })?;

    log::info!(
        "Relay listening on http://{}, forwarding to {}",
        config.bind,
        config.upstream_url
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServeError::Serve)?;

    log::info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
