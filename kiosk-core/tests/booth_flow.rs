//! End-to-end session flows through BoothContext with a paused clock.
//!
//! The camera and relay are in-memory fakes; timers are real tokio sleeps, so
//! these tests exercise the countdown scheduling and cancellation as well as
//! the state machine.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use snapqr_core::{
    AppMessage, BoothCommand, BoothConfig, BoothContext, BoothEvent, CameraError, FrameBuffer,
    FrameSource, Relay, RelayError, SessionState, Snapshot, Status, TimerId, TimerKind, Timings,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

#[derive(Default)]
struct CameraLog {
    starts: usize,
    stops: usize,
    running: bool,
}

struct FakeCamera {
    log: Rc<RefCell<CameraLog>>,
    fail: bool,
}

impl FrameSource for FakeCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        if self.fail {
            return Err(CameraError::PermissionDenied);
        }
        let mut log = self.log.borrow_mut();
        log.starts += 1;
        log.running = true;
        Ok(())
    }

    fn current_frame(&self) -> Option<FrameBuffer> {
        self.log.borrow().running.then(|| FrameBuffer {
            width: 2,
            height: 2,
            rgb: vec![128; 12],
        })
    }

    fn stop(&mut self) {
        let mut log = self.log.borrow_mut();
        log.stops += 1;
        log.running = false;
    }
}

struct FakeRelay {
    calls: AtomicUsize,
    latency: Duration,
    url: Option<String>,
}

impl FakeRelay {
    fn answering(url: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            latency: Duration::from_secs(2),
            url: Some(url.to_string()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            latency: Duration::from_secs(2),
            url: None,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Relay for FakeRelay {
    fn upload(&self, image_data_url: String) -> BoxFuture<'static, Result<String, RelayError>> {
        assert!(image_data_url.starts_with("data:image/png;base64,"));
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency;
        let url = self.url.clone();
        async move {
            tokio::time::sleep(latency).await;
            url.ok_or(RelayError::MissingUrl)
        }
        .boxed()
    }
}

struct Booth {
    ctx: BoothContext,
    rx: UnboundedReceiver<AppMessage>,
    camera: Rc<RefCell<CameraLog>>,
    /// Every command the UI layer would have seen
    ui: Vec<BoothCommand>,
}

impl Booth {
    fn new(relay: Arc<FakeRelay>, timings: Timings, camera_fails: bool) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let camera = Rc::new(RefCell::new(CameraLog::default()));
        let config = BoothConfig::new("http://relay.test/upload")
            .unwrap()
            .with_timings(timings);
        let (ctx, rx) = BoothContext::new(
            config,
            Box::new(FakeCamera {
                log: camera.clone(),
                fail: camera_fails,
            }),
            relay,
            tokio::runtime::Handle::current(),
        );

        Self {
            ctx,
            rx,
            camera,
            ui: Vec::new(),
        }
    }

    fn process(&mut self, event: BoothEvent) {
        self.deliver(AppMessage::Event(event));
    }

    fn deliver(&mut self, msg: AppMessage) {
        let commands = self.ctx.handle_message(msg);
        self.ui.extend(commands.into_iter().filter(|c| {
            matches!(
                c,
                BoothCommand::ShowQr { .. }
                    | BoothCommand::RemoveQr
                    | BoothCommand::Reload
                    | BoothCommand::ArmTimer { .. }
            )
        }));
    }

    /// Apply messages until one matching `pred` has been handled
    async fn pump_until(&mut self, pred: impl Fn(&BoothEvent) -> bool) {
        loop {
            let msg = self.rx.recv().await.expect("channel closed");
            let done = pred(msg.event());
            self.deliver(msg);
            if done {
                return;
            }
        }
    }

    /// Apply whatever is already queued
    fn drain(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.deliver(msg);
        }
    }

    async fn start(&mut self) {
        self.ctx.start();
        self.pump_until(|e| {
            matches!(
                e,
                BoothEvent::CameraStarted | BoothEvent::CameraFailed { .. }
            )
        })
        .await;
    }

    async fn capture(&mut self) {
        self.process(BoothEvent::Capture);
        self.pump_until(|e| {
            matches!(
                e,
                BoothEvent::SnapshotReady { .. } | BoothEvent::SnapshotFailed { .. }
            )
        })
        .await;
    }

    async fn upload(&mut self) {
        self.process(BoothEvent::Upload);
        self.pump_until(|e| {
            matches!(
                e,
                BoothEvent::UploadSucceeded { .. } | BoothEvent::UploadFailed { .. }
            )
        })
        .await;
    }

    fn state(&self) -> SessionState {
        self.ctx.state_machine.borrow().state()
    }

    /// Id of the most recently armed idle countdown
    fn last_idle_timer(&self) -> Option<TimerId> {
        self.ui.iter().rev().find_map(|c| match c {
            BoothCommand::ArmTimer {
                kind: TimerKind::Idle,
                id,
                ..
            } => Some(*id),
            _ => None,
        })
    }

    /// Start with the manual refresh already revealed
    async fn start_refreshable(&mut self) {
        self.start().await;
        self.pump_until(|e| matches!(e, BoothEvent::RevealManualRefresh))
            .await;
    }

    fn reloads(&self) -> usize {
        self.ui
            .iter()
            .filter(|c| matches!(c, BoothCommand::Reload))
            .count()
    }
}

fn timings() -> Timings {
    Timings {
        manual_refresh_reveal: Duration::from_secs(3600),
        ..Timings::default()
    }
}

fn refreshable() -> Timings {
    Timings {
        manual_refresh_reveal: Duration::from_secs(1),
        ..Timings::default()
    }
}

fn is_timer(kind: TimerKind) -> impl Fn(&BoothEvent) -> bool {
    move |e| matches!(e, BoothEvent::TimerFired { kind: k, .. } if *k == kind)
}

#[tokio::test(start_paused = true)]
async fn test_upload_shows_qr_for_relay_url() {
    let relay = FakeRelay::answering("https://x/y");
    let mut booth = Booth::new(relay.clone(), timings(), false);
    booth.start().await;
    booth.capture().await;
    assert_eq!(booth.state(), SessionState::Previewing);

    booth.upload().await;

    assert_eq!(relay.calls(), 1);
    assert_eq!(booth.state(), SessionState::QrShown);
    assert!(booth
        .ui
        .iter()
        .any(|c| matches!(c, BoothCommand::ShowQr { qr } if qr.text() == "https://x/y")));
    assert_eq!(booth.ctx.scheduled_timers(), 1);
    assert_eq!(
        booth.ctx.state_machine.borrow().status(),
        &Status::QrReady { secs: 30 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_idle_close_then_single_reload() {
    let mut booth = Booth::new(FakeRelay::answering("https://x/y"), timings(), false);
    booth.start().await;
    booth.capture().await;
    booth.upload().await;
    let shown_at = Instant::now();

    tokio::time::sleep(Duration::from_secs(29)).await;
    booth.drain();
    assert_eq!(booth.state(), SessionState::QrShown);

    booth.pump_until(is_timer(TimerKind::Idle)).await;
    assert!(shown_at.elapsed() >= Duration::from_secs(30));
    assert_eq!(booth.state(), SessionState::Closing);
    assert!(booth.ui.iter().any(|c| matches!(c, BoothCommand::RemoveQr)));
    let closed_at = Instant::now();

    // Activity cannot stretch the closing window.
    tokio::time::sleep(Duration::from_secs(5)).await;
    booth.process(BoothEvent::Activity);

    booth.pump_until(is_timer(TimerKind::Reset)).await;
    assert!(closed_at.elapsed() >= Duration::from_secs(10));
    assert!(closed_at.elapsed() < Duration::from_secs(11));
    assert_eq!(booth.reloads(), 1);
    assert_eq!(booth.camera.borrow().stops, 1);
    assert_eq!(booth.camera.borrow().starts, 2);

    booth.pump_until(|e| matches!(e, BoothEvent::CameraStarted)).await;
    assert_eq!(booth.state(), SessionState::Idle);
    assert_eq!(booth.ctx.state_machine.borrow().status(), &Status::Ready);

    tokio::time::sleep(Duration::from_secs(120)).await;
    booth.drain();
    assert_eq!(booth.reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_activity_keeps_qr_alive() {
    let mut booth = Booth::new(FakeRelay::answering("https://x/y"), timings(), false);
    booth.start().await;
    booth.capture().await;
    booth.upload().await;
    let shown_at = Instant::now();

    tokio::time::sleep(Duration::from_secs(29)).await;
    booth.process(BoothEvent::Activity);
    assert_eq!(booth.ctx.scheduled_timers(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    booth.drain();
    assert_eq!(booth.state(), SessionState::QrShown);

    booth.pump_until(is_timer(TimerKind::Idle)).await;
    assert!(shown_at.elapsed() >= Duration::from_secs(59));
    assert_eq!(booth.state(), SessionState::Closing);
}

#[tokio::test(start_paused = true)]
async fn test_double_upload_calls_relay_once() {
    let relay = FakeRelay::answering("https://x/y");
    let mut booth = Booth::new(relay.clone(), timings(), false);
    booth.start().await;
    booth.capture().await;

    booth.process(BoothEvent::Upload);
    booth.process(BoothEvent::Upload);
    booth
        .pump_until(|e| matches!(e, BoothEvent::UploadSucceeded { .. }))
        .await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    booth.drain();
    assert_eq!(relay.calls(), 1);
    assert!(!booth.ctx.state_machine.borrow().is_upload_in_flight());
}

#[tokio::test(start_paused = true)]
async fn test_relay_failure_stays_in_preview() {
    let relay = FakeRelay::failing();
    let mut booth = Booth::new(relay.clone(), timings(), false);
    booth.start().await;
    booth.capture().await;
    booth.upload().await;

    assert_eq!(booth.state(), SessionState::Previewing);
    assert_eq!(booth.ctx.scheduled_timers(), 0);
    {
        let sm = booth.ctx.state_machine.borrow();
        assert!(!sm.is_upload_in_flight());
        assert!(matches!(sm.status(), Status::UploadFailed { .. }));
    }

    booth.upload().await;
    assert_eq!(relay.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unencodable_url_is_upload_failure() {
    let long_url = format!("https://x/{}", "a".repeat(8000));
    let mut booth = Booth::new(FakeRelay::answering(&long_url), timings(), false);
    booth.start().await;
    booth.capture().await;
    booth.upload().await;

    assert_eq!(booth.state(), SessionState::Previewing);
    assert!(!booth
        .ui
        .iter()
        .any(|c| matches!(c, BoothCommand::ShowQr { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_camera_failure_disables_capture() {
    let mut booth = Booth::new(FakeRelay::answering("https://x/y"), timings(), true);
    booth.start().await;

    let view = booth.ctx.state_machine.borrow().view();
    assert!(!view.capture_enabled);
    assert_eq!(view.status, "Camera error: Camera permission denied");

    booth.process(BoothEvent::Capture);
    tokio::time::sleep(Duration::from_secs(1)).await;
    booth.drain();
    assert_eq!(booth.state(), SessionState::Idle);
    assert!(booth.ctx.current_snapshot().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_manual_refresh_revealed_after_delay() {
    let reveal = Duration::from_secs(300);
    let mut booth = Booth::new(
        FakeRelay::answering("https://x/y"),
        Timings {
            manual_refresh_reveal: reveal,
            ..Timings::default()
        },
        false,
    );
    let started = Instant::now();
    booth.start().await;

    booth.process(BoothEvent::ManualRefresh);
    assert_eq!(booth.reloads(), 0);

    booth
        .pump_until(|e| matches!(e, BoothEvent::RevealManualRefresh))
        .await;
    assert!(started.elapsed() >= reveal);
    assert!(booth.ctx.state_machine.borrow().view().manual_refresh_visible);

    booth.capture().await;
    booth.process(BoothEvent::ManualRefresh);
    assert_eq!(booth.reloads(), 1);
    assert_eq!(booth.camera.borrow().stops, 1);
    assert!(booth.ctx.current_snapshot().is_none());
    assert!(!booth.ctx.state_machine.borrow().view().manual_refresh_visible);

    // The fresh session waits the full delay again.
    let reloaded = Instant::now();
    booth
        .pump_until(|e| matches!(e, BoothEvent::RevealManualRefresh))
        .await;
    assert!(reloaded.elapsed() >= reveal);
}

#[tokio::test(start_paused = true)]
async fn test_retake_cancels_scheduled_countdowns() {
    let mut booth = Booth::new(FakeRelay::answering("https://x/y"), timings(), false);
    booth.start().await;
    booth.capture().await;
    booth.upload().await;
    assert_eq!(booth.ctx.scheduled_timers(), 1);

    booth.process(BoothEvent::Retake);
    assert_eq!(booth.state(), SessionState::Idle);

    tokio::time::sleep(Duration::from_secs(60)).await;
    booth.drain();
    assert_eq!(booth.state(), SessionState::Idle);
    assert_eq!(booth.reloads(), 0);
    assert_eq!(booth.ctx.scheduled_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_upload_from_before_reload_never_reaches_next_session() {
    let relay = FakeRelay::answering("https://x/previous-user");
    let mut booth = Booth::new(relay.clone(), refreshable(), false);
    booth.start_refreshable().await;
    booth.capture().await;

    booth.process(BoothEvent::Upload);
    // Let the upload reach the relay before the reload.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(relay.calls(), 1);
    let previous = booth.ctx.epoch();
    booth.process(BoothEvent::ManualRefresh);
    assert_eq!(booth.reloads(), 1);
    assert_ne!(booth.ctx.epoch(), previous);

    booth
        .pump_until(|e| matches!(e, BoothEvent::CameraStarted))
        .await;
    booth.capture().await;
    assert_eq!(booth.ctx.state_machine.borrow().captured().unwrap().shot, 1);

    // The in-flight upload was cancelled with the old session.
    tokio::time::sleep(Duration::from_secs(5)).await;
    booth.drain();
    assert_eq!(relay.calls(), 1);
    assert_eq!(booth.state(), SessionState::Previewing);

    // A result that was already queued is ignored as well.
    booth.process(BoothEvent::Upload);
    assert!(booth.ctx.state_machine.borrow().is_upload_in_flight());
    booth.deliver(AppMessage::Session {
        epoch: previous,
        event: BoothEvent::UploadSucceeded {
            shot: 1,
            url: "https://x/previous-user".into(),
            qr: snapqr_core::qr::render("https://x/previous-user", 64).unwrap(),
        },
    });

    let sm = booth.ctx.state_machine.borrow();
    assert_eq!(sm.state(), SessionState::Previewing);
    assert!(sm.view().qr_url.is_none());
    assert!(sm.is_upload_in_flight());
    assert!(!booth.ui.iter().any(|c| matches!(c, BoothCommand::ShowQr { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_from_before_reload_never_reaches_next_session() {
    let mut booth = Booth::new(FakeRelay::answering("https://x/y"), refreshable(), false);
    booth.start_refreshable().await;

    booth.process(BoothEvent::Capture);
    let previous = booth.ctx.epoch();
    booth.process(BoothEvent::ManualRefresh);

    tokio::time::sleep(Duration::from_secs(1)).await;
    booth.drain();
    assert_eq!(booth.state(), SessionState::Idle);
    assert!(booth.ctx.current_snapshot().is_none());

    let frame = FrameBuffer {
        width: 2,
        height: 2,
        rgb: vec![128; 12],
    };
    booth.deliver(AppMessage::Session {
        epoch: previous,
        event: BoothEvent::SnapshotReady {
            image: Snapshot::from_frame(frame, true).unwrap(),
        },
    });
    assert_eq!(booth.state(), SessionState::Idle);
    assert!(booth.ctx.current_snapshot().is_none());
    assert_eq!(booth.ctx.state_machine.borrow().status(), &Status::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_timer_from_before_reload_never_reaches_next_session() {
    let mut booth = Booth::new(FakeRelay::answering("https://x/y"), refreshable(), false);
    booth.start_refreshable().await;
    booth.capture().await;
    booth.upload().await;
    let stale_timer = booth.last_idle_timer().unwrap();
    let previous = booth.ctx.epoch();

    booth.process(BoothEvent::ManualRefresh);
    booth
        .pump_until(|e| matches!(e, BoothEvent::CameraStarted))
        .await;
    booth.capture().await;
    booth.upload().await;
    assert_eq!(booth.state(), SessionState::QrShown);
    // The fresh session numbers its countdowns from the start again.
    assert_eq!(booth.last_idle_timer(), Some(stale_timer));

    booth.deliver(AppMessage::Session {
        epoch: previous,
        event: BoothEvent::TimerFired {
            kind: TimerKind::Idle,
            id: stale_timer,
        },
    });
    assert_eq!(booth.state(), SessionState::QrShown);
    assert!(booth.ctx.current_snapshot().is_some());
}
