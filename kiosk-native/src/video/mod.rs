//! Camera capture over GStreamer.

pub mod pipeline;

pub use gstreamer::bus::BusWatchGuard;
pub use pipeline::{watch_bus, UnavailableCamera, VideoPipeline, CAMERA_DEVICE_ENV};
