//! Camera frame source contract and still snapshot encoding.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("No camera device found")]
    NoDevice,
    #[error("{0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("No frame available from the camera")]
    NoFrame,
    #[error("Frame is {len} bytes, expected {expected} for {width}x{height} RGB")]
    Malformed {
        width: u32,
        height: u32,
        len: usize,
        expected: usize,
    },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// One decoded camera frame, packed RGB8 without row padding
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgb.len())
            .finish()
    }
}

/// A live camera feed.
///
/// Implementations are driven from the UI thread only.
pub trait FrameSource {
    /// Acquire the device and begin streaming.
    fn start(&mut self) -> Result<(), CameraError>;

    /// Latest frame, if the stream has produced one.
    fn current_frame(&self) -> Option<FrameBuffer>;

    /// Release the device. Safe to call when not started.
    fn stop(&mut self);
}

/// A captured still, PNG encoded
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    width: u32,
    height: u32,
    png: Arc<[u8]>,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

impl Snapshot {
    /// Encode a frame, flipping it horizontally when `mirror` is set so the
    /// still matches what the user saw in the preview.
    pub fn from_frame(frame: FrameBuffer, mirror: bool) -> Result<Self, SnapshotError> {
        let FrameBuffer { width, height, rgb } = frame;
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || rgb.len() != expected {
            return Err(SnapshotError::Malformed {
                width,
                height,
                len: rgb.len(),
                expected,
            });
        }

        let mut image = image::RgbImage::from_raw(width, height, rgb).ok_or(
            SnapshotError::Malformed {
                width,
                height,
                len: 0,
                expected,
            },
        )?;
        if mirror {
            image::imageops::flip_horizontal_in_place(&mut image);
        }

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
        log::debug!("Encoded {}x{} snapshot ({} bytes)", width, height, png.len());

        Ok(Self {
            width,
            height,
            png: png.into(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Whether both handles refer to the same encoded still (no byte compare)
    pub fn same_image(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.png, &other.png)
    }

    /// `data:image/png;base64,...`, the form the relay expects
    pub fn data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.png);
        format!("data:image/png;base64,{}", encoded)
    }

    /// Write the still as `selfie_<unix millis>.png` inside `dir`.
    pub fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("selfie_{}.png", millis));
        std::fs::write(&path, &self.png)?;
        log::info!("Saved snapshot to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x1 frame: red pixel on the left, blue on the right
    fn two_pixel_frame() -> FrameBuffer {
        FrameBuffer {
            width: 2,
            height: 1,
            rgb: vec![255, 0, 0, 0, 0, 255],
        }
    }

    fn decode(snapshot: &Snapshot) -> image::RgbImage {
        image::load_from_memory(snapshot.png()).unwrap().to_rgb8()
    }

    #[test]
    fn test_from_frame_keeps_orientation_without_mirror() {
        let snapshot = Snapshot::from_frame(two_pixel_frame(), false).unwrap();
        let image = decode(&snapshot);
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_from_frame_mirrors() {
        let snapshot = Snapshot::from_frame(two_pixel_frame(), true).unwrap();
        assert_eq!((snapshot.width(), snapshot.height()), (2, 1));
        let image = decode(&snapshot);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 0, 0]);
    }

    #[test]
    fn test_from_frame_rejects_short_buffer() {
        let frame = FrameBuffer {
            width: 4,
            height: 4,
            rgb: vec![0; 10],
        };
        assert!(matches!(
            Snapshot::from_frame(frame, true),
            Err(SnapshotError::Malformed { expected: 48, len: 10, .. })
        ));
    }

    #[test]
    fn test_from_frame_rejects_empty_frame() {
        let frame = FrameBuffer {
            width: 0,
            height: 0,
            rgb: Vec::new(),
        };
        assert!(Snapshot::from_frame(frame, false).is_err());
    }

    #[test]
    fn test_data_url_prefix() {
        let snapshot = Snapshot::from_frame(two_pixel_frame(), false).unwrap();
        let url = snapshot.data_url();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_save_to_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::from_frame(two_pixel_frame(), false).unwrap();
        let path = snapshot.save_to(dir.path()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("selfie_") && name.ends_with(".png"));
        assert_eq!(std::fs::read(&path).unwrap(), snapshot.png());
    }
}
