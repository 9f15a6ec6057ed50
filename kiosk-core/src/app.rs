//! Booth context - bridges the state machine with collaborators and timers.
//!
//! The context lives on the UI thread. Slow work (snapshot encoding, uploads,
//! countdowns) runs on the tokio runtime and reports back as [`BoothEvent`]s
//! through the message channel, so every transition is processed serially on
//! the thread that drains it.
//!
//! Each reload starts a new session epoch. Work spawned for a session reports
//! with that session's epoch, and [`BoothContext::handle_message`] discards
//! anything from an earlier one, so nothing started for one user can reach
//! the next.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use crate::api::Relay;
use crate::capture::{FrameSource, Snapshot, SnapshotError};
use crate::config::BoothConfig;
use crate::qr;
use crate::state::{BoothCommand, BoothEvent, SessionController};
use crate::timer::TimerKind;

/// Messages sent from async tasks to the UI loop
#[derive(Debug, Clone)]
pub enum AppMessage {
    /// Process a booth event through the state machine
    Event(BoothEvent),
    /// Result of work started by session `epoch`; dropped once that session
    /// has been reloaded
    Session { epoch: u64, event: BoothEvent },
}

impl AppMessage {
    pub fn event(&self) -> &BoothEvent {
        match self {
            AppMessage::Event(event) | AppMessage::Session { event, .. } => event,
        }
    }
}

/// Sender that can dispatch messages to the UI loop from any thread
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<AppMessage>,
}

impl MessageSender {
    pub fn send(&self, msg: AppMessage) {
        let _ = self.tx.send(msg);
    }

    pub fn send_event(&self, event: BoothEvent) {
        self.send(AppMessage::Event(event));
    }

    fn send_session_event(&self, epoch: u64, event: BoothEvent) {
        self.send(AppMessage::Session { epoch, event });
    }
}

/// Holds the session and executes the commands it emits
pub struct BoothContext {
    pub config: BoothConfig,
    /// The GTK-free state machine
    pub state_machine: RefCell<SessionController>,
    frame_source: RefCell<Box<dyn FrameSource>>,
    relay: Arc<dyn Relay>,
    runtime: Handle,
    pub message_tx: MessageSender,
    /// Bumped on every reload; results tagged with an older epoch are dropped
    epoch: Cell<u64>,
    timers: RefCell<HashMap<TimerKind, JoinHandle<()>>>,
    refresh_reveal: RefCell<Option<JoinHandle<()>>>,
    /// Snapshot encodes and uploads still running
    work: RefCell<Vec<AbortHandle>>,
}

impl BoothContext {
    pub fn new(
        config: BoothConfig,
        frame_source: Box<dyn FrameSource>,
        relay: Arc<dyn Relay>,
        runtime: Handle,
    ) -> (Self, mpsc::UnboundedReceiver<AppMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let ctx = Self {
            state_machine: RefCell::new(SessionController::new(config.timings)),
            config,
            frame_source: RefCell::new(frame_source),
            relay,
            runtime,
            message_tx: MessageSender { tx },
            epoch: Cell::new(0),
            timers: RefCell::new(HashMap::new()),
            refresh_reveal: RefCell::new(None),
            work: RefCell::new(Vec::new()),
        };

        (ctx, rx)
    }

    /// Start the camera and the manual refresh countdown for a fresh session
    pub fn start(&self) {
        log::info!("Starting booth session");
        let result = self.frame_source.borrow_mut().start();
        let epoch = self.epoch.get();
        match result {
            Ok(()) => self
                .message_tx
                .send_session_event(epoch, BoothEvent::CameraStarted),
            Err(e) => {
                log::error!("Camera start failed: {}", e);
                self.message_tx.send_session_event(
                    epoch,
                    BoothEvent::CameraFailed {
                        error: e.to_string(),
                    },
                );
            }
        }
        self.schedule_refresh_reveal();
    }

    /// Current session generation
    pub fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    /// Send an event to the state machine (from any thread, via the channel)
    pub fn send_event(&self, event: BoothEvent) {
        self.message_tx.send_event(event);
    }

    pub fn handle_message(&self, msg: AppMessage) -> Vec<BoothCommand> {
        match msg {
            AppMessage::Event(event) => self.process_event(event),
            AppMessage::Session { epoch, event } => {
                if epoch != self.epoch.get() {
                    log::debug!("Dropping {:?} from reloaded session {}", event, epoch);
                    return Vec::new();
                }
                self.process_event(event)
            }
        }
    }

    /// Process an event and execute the resulting commands.
    ///
    /// Must be called from the loop that drains the message channel. UI
    /// commands (`ShowQr`, `RemoveQr`, `UpdateUI`, `Reload`) are returned for
    /// the caller to apply after the context has handled its share.
    pub fn process_event(&self, event: BoothEvent) -> Vec<BoothCommand> {
        let commands = self.state_machine.borrow_mut().process(event);

        for cmd in &commands {
            self.execute_command(cmd.clone());
        }

        commands
    }

    /// The current snapshot, for download-local
    pub fn current_snapshot(&self) -> Option<Snapshot> {
        self.state_machine
            .borrow()
            .captured()
            .map(|c| c.image.clone())
    }

    /// Number of countdowns with a live task, for diagnostics and tests
    pub fn scheduled_timers(&self) -> usize {
        self.timers
            .borrow()
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn execute_command(&self, cmd: BoothCommand) {
        match cmd {
            BoothCommand::TakeSnapshot => {
                let frame = self.frame_source.borrow().current_frame();
                let tx = self.message_tx.clone();
                let epoch = self.epoch.get();
                let mirror = self.config.mirror;

                let Some(frame) = frame else {
                    tx.send_session_event(
                        epoch,
                        BoothEvent::SnapshotFailed {
                            error: SnapshotError::NoFrame.to_string(),
                        },
                    );
                    return;
                };

                let encode = self
                    .runtime
                    .spawn_blocking(move || Snapshot::from_frame(frame, mirror));
                let report = self.runtime.spawn(async move {
                    let event = match encode.await {
                        Ok(Ok(image)) => BoothEvent::SnapshotReady { image },
                        Ok(Err(e)) => BoothEvent::SnapshotFailed {
                            error: e.to_string(),
                        },
                        Err(e) => BoothEvent::SnapshotFailed {
                            error: format!("encoder task failed: {}", e),
                        },
                    };
                    tx.send_session_event(epoch, event);
                });
                self.track(report.abort_handle());
            }

            BoothCommand::Upload { shot, image } => {
                let tx = self.message_tx.clone();
                let epoch = self.epoch.get();
                let relay = self.relay.clone();
                let qr_size = self.config.qr_size;

                let upload = self.runtime.spawn(async move {
                    let url = relay.upload(image.data_url()).await?;
                    let qr = qr::render(&url, qr_size)?;
                    Ok::<_, Box<dyn std::error::Error + Send + Sync>>((url, qr))
                });

                // Report from a second task so that even a panicking upload
                // releases the in-flight guard.
                let abort_upload = upload.abort_handle();
                let report = self.runtime.spawn(async move {
                    let event = match upload.await {
                        Ok(Ok((url, qr))) => BoothEvent::UploadSucceeded { shot, url, qr },
                        Ok(Err(e)) => BoothEvent::UploadFailed {
                            shot,
                            error: e.to_string(),
                        },
                        Err(e) => BoothEvent::UploadFailed {
                            shot,
                            error: format!("upload task failed: {}", e),
                        },
                    };
                    tx.send_session_event(epoch, event);
                });
                self.track(abort_upload);
                self.track(report.abort_handle());
            }

            BoothCommand::ArmTimer { kind, id, after } => {
                log::debug!("Arming {} timer for {:?}", kind, after);
                let tx = self.message_tx.clone();
                let epoch = self.epoch.get();
                let handle = self.runtime.spawn(async move {
                    tokio::time::sleep(after).await;
                    tx.send_session_event(epoch, BoothEvent::TimerFired { kind, id });
                });
                if let Some(previous) = self.timers.borrow_mut().insert(kind, handle) {
                    previous.abort();
                }
            }

            BoothCommand::CancelTimer { kind } => {
                if let Some(handle) = self.timers.borrow_mut().remove(&kind) {
                    log::debug!("Cancelling {} timer", kind);
                    handle.abort();
                }
            }

            BoothCommand::StopCamera => {
                log::info!("Stopping camera");
                self.frame_source.borrow_mut().stop();
            }

            BoothCommand::Reload => self.reload(),

            BoothCommand::ShowQr { .. } | BoothCommand::RemoveQr | BoothCommand::UpdateUI => {
                // Handled by the UI layer after processing
            }
        }
    }

    /// Tear the session down and start a fresh one
    fn reload(&self) {
        log::info!("Reloading session");

        for (_, handle) in self.timers.borrow_mut().drain() {
            handle.abort();
        }
        if let Some(handle) = self.refresh_reveal.borrow_mut().take() {
            handle.abort();
        }
        for handle in self.work.borrow_mut().drain(..) {
            handle.abort();
        }

        // Anything the old session still has queued or running is stale now.
        self.epoch.set(self.epoch.get() + 1);
        *self.state_machine.borrow_mut() = SessionController::new(self.config.timings);
        self.start();
    }

    fn track(&self, handle: AbortHandle) {
        let mut work = self.work.borrow_mut();
        work.retain(|h| !h.is_finished());
        work.push(handle);
    }

    fn schedule_refresh_reveal(&self) {
        let tx = self.message_tx.clone();
        let epoch = self.epoch.get();
        let after: Duration = self.config.timings.manual_refresh_reveal;
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            tx.send_session_event(epoch, BoothEvent::RevealManualRefresh);
        });
        if let Some(previous) = self.refresh_reveal.borrow_mut().replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for BoothContext {
    fn drop(&mut self) {
        for (_, handle) in self.timers.get_mut().drain() {
            handle.abort();
        }
        if let Some(handle) = self.refresh_reveal.get_mut().take() {
            handle.abort();
        }
        for handle in self.work.get_mut().drain(..) {
            handle.abort();
        }
        self.frame_source.get_mut().stop();
    }
}
