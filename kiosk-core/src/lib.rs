//! SnapQR booth core - everything behind the kiosk UI.
//!
//! Architecture:
//! - `state` module: GTK-free session state machine (testable)
//! - `timer` module: named one-shot countdown slots used by the state machine
//! - `app` module: executes state machine commands on a tokio runtime
//! - `api` module: HTTP client for the upload relay
//! - `capture` module: frame source contract and snapshot encoding
//! - `qr` module: QR code rendering for the public photo link

pub mod api;
pub mod app;
pub mod capture;
pub mod config;
pub mod qr;
pub mod state;
pub mod timer;

pub use api::{Relay, RelayClient, RelayError};
pub use app::{AppMessage, BoothContext, MessageSender};
pub use capture::{CameraError, FrameBuffer, FrameSource, Snapshot, SnapshotError};
pub use config::{BoothConfig, ConfigError, Timings};
pub use qr::{QrError, QrImage};
pub use state::{
    BoothCommand, BoothEvent, BoothView, CameraState, SessionController, SessionState, Status,
};
pub use timer::{TimerId, TimerKind};
