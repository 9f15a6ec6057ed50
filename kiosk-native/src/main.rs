//! SnapQR Booth kiosk - GTK4 + GStreamer selfie booth.
//!
//! Architecture:
//! - `snapqr_core`: GTK-free session state machine, relay client, QR and
//!   snapshot encoding, and the context that executes commands
//! - `video` module: GStreamer pipeline for camera preview and stills
//! - `ui` module: GTK4 widgets and the main window

use std::rc::Rc;
use std::sync::Arc;

use gtk4 as gtk;
use gtk4::prelude::*;
use libadwaita as adw;

use snapqr_core::{BoothConfig, BoothContext, FrameSource, RelayClient};

mod ui;
mod video;

use ui::MainWindow;
use video::{UnavailableCamera, VideoPipeline};

fn main() -> glib::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting SnapQR Booth");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => Arc::new(runtime),
        Err(e) => {
            log::error!("Failed to create tokio runtime: {}", e);
            return glib::ExitCode::FAILURE;
        }
    };

    // Invisible cursor theme for X11 sessions; the window also hides it
    std::env::set_var("XCURSOR_THEME", "InvisibleCursor");
    std::env::set_var("XCURSOR_SIZE", "1");

    let app = adw::Application::builder()
        .application_id("com.snapqr.booth")
        .build();

    app.connect_activate(move |app| {
        let config = match BoothConfig::from_env() {
            Ok(config) => config,
            Err(e) => {
                log::error!("Invalid configuration: {}", e);
                app.quit();
                return;
            }
        };
        log::info!("Uploading through {}", config.relay_url);

        let relay = match RelayClient::new(config.relay_url.clone(), config.upload_timeout) {
            Ok(relay) => relay,
            Err(e) => {
                log::error!("Failed to create relay client: {}", e);
                app.quit();
                return;
            }
        };

        // Camera pipeline, or a stand-in that reports the failure on start
        let device = std::env::var(video::CAMERA_DEVICE_ENV).ok();
        let (frame_source, paintable, bus): (Box<dyn FrameSource>, Option<gtk::gdk::Paintable>, _) =
            match VideoPipeline::new(device.as_deref()) {
                Ok(pipeline) => {
                    let paintable = pipeline.paintable().clone();
                    let bus = pipeline.bus();
                    (Box::new(pipeline) as Box<dyn FrameSource>, Some(paintable), bus)
                }
                Err(e) => {
                    log::error!("Failed to build video pipeline: {}", e);
                    (Box::new(UnavailableCamera::new(e.to_string())), None, None)
                }
            };

        let (ctx, mut rx) =
            BoothContext::new(config, frame_source, Arc::new(relay), runtime.handle().clone());
        let ctx = Rc::new(ctx);

        let bus_watch = bus.and_then(|bus| video::watch_bus(&bus, ctx.message_tx.clone()));
        let main_window = MainWindow::new(app, ctx.clone(), paintable.as_ref(), bus_watch);

        // Poll the tokio channel from the GTK main loop
        let window = main_window.clone();
        glib::timeout_add_local(std::time::Duration::from_millis(16), move || {
            while let Ok(msg) = rx.try_recv() {
                window.handle_message(msg);
            }
            glib::ControlFlow::Continue
        });

        ctx.start();
        main_window.window.present();
    });

    let code = app.run();

    log::info!("SnapQR Booth shutting down");
    code
}
