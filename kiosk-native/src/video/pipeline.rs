//! GStreamer camera pipeline: live preview plus on-demand RGB frames.
//!
//! ```text
//! v4l2src ! videoconvert ! tee ─┬─ queue ! gtk4paintablesink        (preview)
//!                               └─ queue ! videoconvert ! appsink   (snapshots)
//! ```

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use gtk4 as gtk;
use thiserror::Error;

use snapqr_core::{BoothEvent, CameraError, FrameBuffer, FrameSource, MessageSender};

/// Environment variable selecting a specific V4L2 device
pub const CAMERA_DEVICE_ENV: &str = "SNAPQR_CAMERA_DEVICE";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("GStreamer error: {0}")]
    Gstreamer(#[from] glib::Error),
    #[error("GStreamer bool error: {0}")]
    GstreamerBool(#[from] glib::BoolError),
    #[error("Failed to create element: {0}")]
    ElementCreation(String),
    #[error("State change failed")]
    StateChange,
}

fn make(factory: &str) -> Result<gst::Element, PipelineError> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|_| PipelineError::ElementCreation(factory.into()))
}

/// Camera pipeline feeding the preview widget and the snapshot sink
pub struct VideoPipeline {
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    paintable: gtk::gdk::Paintable,
}

impl VideoPipeline {
    /// Build the pipeline for `device` (a V4L2 path), or the system default
    /// camera when `None`.
    pub fn new(device: Option<&str>) -> Result<Self, PipelineError> {
        gst::init()?;
        gstgtk4::plugin_register_static()?;

        let pipeline = gst::Pipeline::new();

        let source = match device {
            Some(device) => gst::ElementFactory::make("v4l2src")
                .property("device", device)
                .build()
                .map_err(|_| PipelineError::ElementCreation("v4l2src".into()))?,
            None => make("autovideosrc")?,
        };
        let convert = make("videoconvert")?;
        let tee = make("tee")?;

        // Preview branch
        let preview_queue = make("queue")?;
        let sink = make("gtk4paintablesink")?;
        let paintable = sink.property::<gtk::gdk::Paintable>("paintable");

        // Snapshot branch: keep only the newest frame
        let snap_queue = gst::ElementFactory::make("queue")
            .property("max-size-buffers", 1u32)
            .property_from_str("leaky", "downstream")
            .build()
            .map_err(|_| PipelineError::ElementCreation("queue".into()))?;
        let snap_convert = make("videoconvert")?;
        let appsink = gst_app::AppSink::builder()
            .caps(
                &gst_video::VideoCapsBuilder::new()
                    .format(gst_video::VideoFormat::Rgb)
                    .build(),
            )
            .max_buffers(1)
            .drop(true)
            .build();
        appsink.set_property("sync", false);

        pipeline.add_many([
            &source,
            &convert,
            &tee,
            &preview_queue,
            &sink,
            &snap_queue,
            &snap_convert,
            appsink.upcast_ref(),
        ])?;

        gst::Element::link_many([&source, &convert, &tee])?;
        gst::Element::link_many([&tee, &preview_queue, &sink])?;
        gst::Element::link_many([&tee, &snap_queue, &snap_convert, appsink.upcast_ref()])?;

        Ok(Self {
            pipeline,
            appsink,
            paintable,
        })
    }

    /// Get the paintable for use in GTK widgets
    pub fn paintable(&self) -> &gtk::gdk::Paintable {
        &self.paintable
    }

    pub fn bus(&self) -> Option<gst::Bus> {
        self.pipeline.bus()
    }

    fn set_state(&self, state: gst::State) -> Result<(), PipelineError> {
        self.pipeline
            .set_state(state)
            .map(|_| ())
            .map_err(|_| PipelineError::StateChange)
    }
}

impl FrameSource for VideoPipeline {
    fn start(&mut self) -> Result<(), CameraError> {
        log::info!("Starting video pipeline");
        self.set_state(gst::State::Playing)
            .map_err(|e| CameraError::Backend(e.to_string()))
    }

    /// Never blocks: takes the queued frame if there is one, otherwise the
    /// last frame the sink rendered.
    fn current_frame(&self) -> Option<FrameBuffer> {
        let sample = self
            .appsink
            .try_pull_sample(gst::ClockTime::ZERO)
            .or_else(|| self.appsink.property::<Option<gst::Sample>>("last-sample"))?;
        let info = gst_video::VideoInfo::from_caps(sample.caps()?).ok()?;
        let buffer = sample.buffer()?;
        let frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &info).ok()?;

        let stride = frame.plane_stride()[0] as usize;
        let rgb = pack_rgb(frame.plane_data(0).ok()?, stride, info.width(), info.height())?;

        Some(FrameBuffer {
            width: info.width(),
            height: info.height(),
            rgb,
        })
    }

    fn stop(&mut self) {
        log::info!("Stopping video pipeline");
        if let Err(e) = self.set_state(gst::State::Null) {
            log::warn!("Failed to stop pipeline: {}", e);
        }
    }
}

impl Drop for VideoPipeline {
    fn drop(&mut self) {
        let _ = self.set_state(gst::State::Null);
    }
}

/// Copy `height` rows of packed RGB out of a plane whose rows are `stride`
/// bytes apart.
fn pack_rgb(data: &[u8], stride: usize, width: u32, height: u32) -> Option<Vec<u8>> {
    let row = width as usize * 3;
    if stride < row {
        return None;
    }

    let mut rgb = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        rgb.extend_from_slice(data.get(start..start + row)?);
    }
    Some(rgb)
}

/// Report pipeline errors (device lost, permission denied) as camera failures.
///
/// The returned guard keeps the watch alive.
pub fn watch_bus(bus: &gst::Bus, tx: MessageSender) -> Option<gst::bus::BusWatchGuard> {
    let result = bus.add_watch(move |_bus, msg| {
        if let gst::MessageView::Error(err) = msg.view() {
            log::error!(
                "Pipeline error from {:?}: {} ({:?})",
                err.src().map(|s| s.path_string()),
                err.error(),
                err.debug()
            );
            tx.send_event(BoothEvent::CameraFailed {
                error: err.error().to_string(),
            });
        }
        glib::ControlFlow::Continue
    });

    match result {
        Ok(guard) => Some(guard),
        Err(e) => {
            log::warn!("Could not watch pipeline bus: {}", e);
            None
        }
    }
}

/// Stand-in used when no pipeline could be built; every start fails.
pub struct UnavailableCamera {
    reason: String,
}

impl UnavailableCamera {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FrameSource for UnavailableCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        Err(CameraError::Backend(self.reason.clone()))
    }

    fn current_frame(&self) -> Option<FrameBuffer> {
        None
    }

    fn stop(&mut self) {}
}
