//! GTK-free session state machine.
//!
//! [`SessionController`] is the single authority over the booth session. It
//! consumes [`BoothEvent`]s and answers with [`BoothCommand`]s for the
//! executor and UI layer to carry out; it never performs I/O itself and never
//! reads a clock, which keeps every transition testable here.

use std::fmt;
use std::time::Duration;

use crate::capture::Snapshot;
use crate::config::Timings;
use crate::qr::QrImage;
use crate::timer::{TimerId, TimerKind, TimerSlots};

/// Observable session states over (`result_visible`, `qr_present`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Camera running, nothing captured
    Idle,
    /// A snapshot is shown, not uploaded yet
    Previewing,
    /// Upload succeeded, QR code shown, idle timer running
    QrShown,
    /// Result cleared, reset timer running
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraState {
    Starting,
    Live,
    Unavailable(String),
    /// Stopped ahead of a reload
    Stopped,
}

/// User-facing status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    StartingCamera,
    Ready,
    Captured,
    CaptureUnavailable,
    CaptureFailed { reason: String },
    PreviewClosed,
    CaptureFirst,
    Uploading,
    QrReady { secs: u64 },
    UploadFailed { reason: String },
    Closing { secs: u64 },
    Reloading,
    CameraError { reason: String },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::StartingCamera => f.write_str("Starting camera…"),
            Status::Ready => f.write_str("Ready. Tap capture to take a selfie."),
            Status::Captured => f.write_str("Captured. Preview below."),
            Status::CaptureUnavailable => f.write_str("Camera is not ready yet."),
            Status::CaptureFailed { reason } => write!(f, "Capture failed: {}", reason),
            Status::PreviewClosed => f.write_str("Preview closed."),
            Status::CaptureFirst => f.write_str("Take a selfie first."),
            Status::Uploading => f.write_str("Uploading…"),
            Status::QrReady { secs } => write!(
                f,
                "Ready! Scan the QR code to get your photo. Closes in {} seconds.",
                secs
            ),
            Status::UploadFailed { reason } => {
                write!(f, "Upload failed: {}. Tap upload to retry.", reason)
            }
            Status::Closing { secs } => write!(f, "Closed. Reloading in {} seconds.", secs),
            Status::Reloading => f.write_str("Reloading…"),
            Status::CameraError { reason } => write!(f, "Camera error: {}", reason),
        }
    }
}

/// The snapshot currently on screen
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Increases with every accepted snapshot
    pub shot: u64,
    pub image: Snapshot,
}

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum BoothEvent {
    // User actions
    Capture,
    Retake,
    ClosePreview,
    Upload,
    /// Pointer motion, tap, key press or scroll
    Activity,
    ManualRefresh,

    // Camera
    CameraStarted,
    CameraFailed { error: String },

    // Snapshot encoding
    SnapshotReady { image: Snapshot },
    SnapshotFailed { error: String },

    // Relay responses
    UploadSucceeded { shot: u64, url: String, qr: QrImage },
    UploadFailed { shot: u64, error: String },

    // Internal
    TimerFired { kind: TimerKind, id: TimerId },
    RevealManualRefresh,
}

/// Commands emitted by the state machine for the executor/UI to carry out
#[derive(Debug, Clone)]
pub enum BoothCommand {
    /// Grab the current frame and encode it
    TakeSnapshot,
    /// Send the snapshot to the relay
    Upload { shot: u64, image: Snapshot },
    /// Display a QR code, replacing nothing (a `RemoveQr` precedes it if needed)
    ShowQr { qr: QrImage },
    RemoveQr,
    /// Schedule `TimerFired { kind, id }` after `after`, replacing any
    /// countdown of the same kind
    ArmTimer {
        kind: TimerKind,
        id: TimerId,
        after: Duration,
    },
    CancelTimer { kind: TimerKind },
    StopCamera,
    /// Discard the session and start a fresh one
    Reload,
    /// Re-render from [`SessionController::view`]
    UpdateUI,
}

/// Everything the UI needs to render the session
#[derive(Debug, Clone)]
pub struct BoothView {
    pub state: SessionState,
    pub status: String,
    pub preview: Option<Snapshot>,
    pub qr_url: Option<String>,
    pub capture_enabled: bool,
    pub upload_enabled: bool,
    pub download_enabled: bool,
    pub manual_refresh_visible: bool,
}

/// The booth session state machine
#[derive(Debug)]
pub struct SessionController {
    timings: Timings,
    captured: Option<CapturedImage>,
    result_visible: bool,
    upload_in_flight: bool,
    /// URL encoded in the QR code on screen, if any
    qr_url: Option<String>,
    timers: TimerSlots,
    status: Status,
    camera: CameraState,
    manual_refresh_visible: bool,
    next_shot: u64,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(Timings::default())
    }
}

impl SessionController {
    pub fn new(timings: Timings) -> Self {
        Self {
            timings,
            captured: None,
            result_visible: false,
            upload_in_flight: false,
            qr_url: None,
            timers: TimerSlots::new(),
            status: Status::StartingCamera,
            camera: CameraState::Starting,
            manual_refresh_visible: false,
            next_shot: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        match (self.result_visible, self.qr_url.is_some()) {
            (true, true) => SessionState::QrShown,
            (true, false) => SessionState::Previewing,
            (false, _) if self.timers.is_armed(TimerKind::Reset) => SessionState::Closing,
            (false, _) => SessionState::Idle,
        }
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn captured(&self) -> Option<&CapturedImage> {
        self.captured.as_ref()
    }

    pub fn is_result_visible(&self) -> bool {
        self.result_visible
    }

    pub fn is_qr_present(&self) -> bool {
        self.qr_url.is_some()
    }

    pub fn is_upload_in_flight(&self) -> bool {
        self.upload_in_flight
    }

    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.timers.is_armed(kind)
    }

    pub fn is_manual_refresh_visible(&self) -> bool {
        self.manual_refresh_visible
    }

    pub fn view(&self) -> BoothView {
        BoothView {
            state: self.state(),
            status: self.status.to_string(),
            preview: self
                .captured
                .as_ref()
                .filter(|_| self.result_visible)
                .map(|c| c.image.clone()),
            qr_url: self.qr_url.clone(),
            capture_enabled: self.camera == CameraState::Live,
            upload_enabled: self.captured.is_some() && !self.upload_in_flight,
            download_enabled: self.captured.is_some(),
            manual_refresh_visible: self.manual_refresh_visible,
        }
    }

    /// The relationships between session fields that every transition keeps.
    pub fn invariants_hold(&self) -> bool {
        let image_iff_visible = self.captured.is_some() == self.result_visible;
        let qr_implies_visible = self.qr_url.is_none() || self.result_visible;
        let reset_only_when_cleared =
            !(self.timers.is_armed(TimerKind::Reset) && self.result_visible);
        let idle_only_with_qr = !(self.timers.is_armed(TimerKind::Idle) && self.qr_url.is_none());

        image_iff_visible && qr_implies_visible && reset_only_when_cleared && idle_only_with_qr
    }

    /// Process an event and return commands to execute
    pub fn process(&mut self, event: BoothEvent) -> Vec<BoothCommand> {
        let mut commands = Vec::new();

        match event {
            BoothEvent::Capture => self.request_capture(&mut commands),
            BoothEvent::SnapshotReady { image } => self.on_capture(image, &mut commands),
            BoothEvent::SnapshotFailed { error } => {
                log::warn!("Snapshot failed: {}", error);
                if !matches!(self.camera, CameraState::Unavailable(_)) {
                    self.status = Status::CaptureFailed { reason: error };
                    commands.push(BoothCommand::UpdateUI);
                }
            }

            BoothEvent::Retake => self.clear_result(Status::Ready, &mut commands),
            BoothEvent::ClosePreview => self.clear_result(Status::PreviewClosed, &mut commands),

            BoothEvent::Upload => self.on_upload(&mut commands),
            BoothEvent::UploadSucceeded { shot, url, qr } => {
                self.on_upload_succeeded(shot, url, qr, &mut commands)
            }
            BoothEvent::UploadFailed { shot, error } => {
                self.upload_in_flight = false;
                if self.is_current_shot(shot) {
                    log::warn!("Upload of shot {} failed: {}", shot, error);
                    self.status = Status::UploadFailed { reason: error };
                } else {
                    log::debug!("Ignoring failure for superseded shot {}", shot);
                }
                commands.push(BoothCommand::UpdateUI);
            }

            BoothEvent::Activity => {
                // Only a shown QR code is kept alive; a bare preview is not.
                if self.qr_url.is_some() {
                    self.arm_timer(TimerKind::Idle, &mut commands);
                }
            }

            BoothEvent::TimerFired { kind, id } => {
                if !self.timers.fire(kind, id) {
                    log::debug!("Ignoring stale {} timer", kind);
                } else {
                    match kind {
                        TimerKind::Idle => self.on_idle_timeout(&mut commands),
                        TimerKind::Reset => self.reload(&mut commands),
                    }
                }
            }

            BoothEvent::ManualRefresh => {
                if self.manual_refresh_visible {
                    log::info!("Manual refresh requested");
                    self.reload(&mut commands);
                } else {
                    log::debug!("Manual refresh not available yet");
                }
            }

            BoothEvent::RevealManualRefresh => {
                if !self.manual_refresh_visible {
                    self.manual_refresh_visible = true;
                    commands.push(BoothCommand::UpdateUI);
                }
            }

            BoothEvent::CameraStarted => {
                if self.camera == CameraState::Stopped {
                    log::debug!("Ignoring camera start for a session being reloaded");
                } else {
                    self.camera = CameraState::Live;
                    if self.status == Status::StartingCamera {
                        self.status = Status::Ready;
                    }
                    commands.push(BoothCommand::UpdateUI);
                }
            }

            BoothEvent::CameraFailed { error } => {
                if self.camera != CameraState::Stopped {
                    log::error!("Camera unavailable: {}", error);
                    self.status = Status::CameraError {
                        reason: error.clone(),
                    };
                    self.camera = CameraState::Unavailable(error);
                    commands.push(BoothCommand::UpdateUI);
                }
            }
        }

        debug_assert!(self.invariants_hold(), "session invariants broken: {:?}", self);
        commands
    }

    fn request_capture(&mut self, commands: &mut Vec<BoothCommand>) {
        match self.camera {
            CameraState::Live => commands.push(BoothCommand::TakeSnapshot),
            // The camera error stays on screen
            CameraState::Unavailable(_) => log::warn!("Capture ignored: camera unavailable"),
            CameraState::Starting | CameraState::Stopped => {
                self.status = Status::CaptureUnavailable;
                commands.push(BoothCommand::UpdateUI);
            }
        }
    }

    fn on_capture(&mut self, image: Snapshot, commands: &mut Vec<BoothCommand>) {
        if self.camera == CameraState::Stopped {
            log::debug!("Dropping snapshot taken before reload");
            return;
        }

        // A fresh capture supersedes any shown QR and pending countdown.
        if self.qr_url.take().is_some() {
            commands.push(BoothCommand::RemoveQr);
        }
        self.cancel_timer(TimerKind::Idle, commands);
        self.cancel_timer(TimerKind::Reset, commands);

        self.next_shot += 1;
        log::info!("Captured shot {} ({}x{})", self.next_shot, image.width(), image.height());
        self.captured = Some(CapturedImage {
            shot: self.next_shot,
            image,
        });
        self.result_visible = true;
        self.status = Status::Captured;
        commands.push(BoothCommand::UpdateUI);
    }

    /// Retake and manual close. Cancels both countdowns and never arms the
    /// reset timer.
    fn clear_result(&mut self, status: Status, commands: &mut Vec<BoothCommand>) {
        if !self.result_visible && self.qr_url.is_none() && !self.timers.any_armed() {
            return;
        }

        if self.qr_url.take().is_some() {
            commands.push(BoothCommand::RemoveQr);
        }
        self.cancel_timer(TimerKind::Idle, commands);
        self.cancel_timer(TimerKind::Reset, commands);
        self.captured = None;
        self.result_visible = false;
        if !matches!(self.camera, CameraState::Unavailable(_)) {
            self.status = status;
        }
        commands.push(BoothCommand::UpdateUI);
    }

    fn on_upload(&mut self, commands: &mut Vec<BoothCommand>) {
        if self.upload_in_flight {
            log::info!("Upload already in flight, ignoring");
            return;
        }

        let Some(captured) = &self.captured else {
            self.status = Status::CaptureFirst;
            commands.push(BoothCommand::UpdateUI);
            return;
        };

        self.upload_in_flight = true;
        self.status = Status::Uploading;
        commands.push(BoothCommand::Upload {
            shot: captured.shot,
            image: captured.image.clone(),
        });
        commands.push(BoothCommand::UpdateUI);
    }

    fn on_upload_succeeded(
        &mut self,
        shot: u64,
        url: String,
        qr: QrImage,
        commands: &mut Vec<BoothCommand>,
    ) {
        self.upload_in_flight = false;

        if !self.is_current_shot(shot) {
            log::info!("Discarding upload result for superseded shot {}", shot);
            commands.push(BoothCommand::UpdateUI);
            return;
        }

        if self.qr_url.take().is_some() {
            commands.push(BoothCommand::RemoveQr);
        }
        commands.push(BoothCommand::ShowQr { qr });
        self.qr_url = Some(url);
        self.arm_timer(TimerKind::Idle, commands);
        self.status = Status::QrReady {
            secs: self.timings.idle.as_secs(),
        };
        commands.push(BoothCommand::UpdateUI);
    }

    fn on_idle_timeout(&mut self, commands: &mut Vec<BoothCommand>) {
        log::info!("Idle timeout, closing result");
        if self.qr_url.take().is_some() {
            commands.push(BoothCommand::RemoveQr);
        }
        self.captured = None;
        self.result_visible = false;
        self.status = Status::Closing {
            secs: self.timings.reset.as_secs(),
        };
        self.arm_timer(TimerKind::Reset, commands);
        commands.push(BoothCommand::UpdateUI);
    }

    /// Reset timeout and manual refresh: stop the camera and ask for a fresh
    /// session.
    fn reload(&mut self, commands: &mut Vec<BoothCommand>) {
        if self.qr_url.take().is_some() {
            commands.push(BoothCommand::RemoveQr);
        }
        self.cancel_timer(TimerKind::Idle, commands);
        self.cancel_timer(TimerKind::Reset, commands);
        self.captured = None;
        self.result_visible = false;
        self.camera = CameraState::Stopped;
        self.status = Status::Reloading;

        commands.push(BoothCommand::StopCamera);
        commands.push(BoothCommand::Reload);
        commands.push(BoothCommand::UpdateUI);
    }

    fn is_current_shot(&self, shot: u64) -> bool {
        self.captured.as_ref().is_some_and(|c| c.shot == shot)
    }

    fn arm_timer(&mut self, kind: TimerKind, commands: &mut Vec<BoothCommand>) {
        let id = self.timers.arm(kind);
        let after = match kind {
            TimerKind::Idle => self.timings.idle,
            TimerKind::Reset => self.timings.reset,
        };
        commands.push(BoothCommand::ArmTimer { kind, id, after });
    }

    fn cancel_timer(&mut self, kind: TimerKind, commands: &mut Vec<BoothCommand>) {
        if self.timers.cancel(kind) {
            commands.push(BoothCommand::CancelTimer { kind });
        }
    }
}
