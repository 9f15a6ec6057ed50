//! QR code rendering for public photo links.

use std::fmt;
use std::io::Cursor;

use qrcode::QrCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QrError {
    #[error("Nothing to encode")]
    Empty,
    #[error("Cannot encode QR code: {0}")]
    Encode(String),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// A rendered code, dark modules on a white quiet zone
#[derive(Clone, PartialEq)]
pub struct QrImage {
    text: String,
    image: image::GrayImage,
}

impl fmt::Debug for QrImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QrImage")
            .field("text", &self.text)
            .field("size", &self.image.width())
            .finish()
    }
}

/// Render `text` as a square grayscale QR code at least `size` pixels wide.
pub fn render(text: &str, size: u32) -> Result<QrImage, QrError> {
    if text.is_empty() {
        return Err(QrError::Empty);
    }

    let code = QrCode::new(text.as_bytes()).map_err(|e| QrError::Encode(e.to_string()))?;
    let image = code
        .render::<image::Luma<u8>>()
        .min_dimensions(size, size)
        .build();

    log::debug!("Rendered {}px QR code for {}", image.width(), text);
    Ok(QrImage {
        text: text.to_string(),
        image,
    })
}

impl QrImage {
    /// The encoded text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn size(&self) -> u32 {
        self.image.width()
    }

    /// Luma value at a pixel (0 = dark module)
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y).0[0]
    }

    pub fn to_png(&self) -> Result<Vec<u8>, QrError> {
        let mut png = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_respects_minimum_size() {
        let qr = render("https://x/y", 220).unwrap();
        assert!(qr.size() >= 220);
        assert_eq!(qr.text(), "https://x/y");
    }

    #[test]
    fn test_render_has_quiet_zone_and_dark_modules() {
        let qr = render("https://drive.example.com/file/d/abc123/view", 100).unwrap();
        assert_eq!(qr.luma(0, 0), 255);

        let size = qr.size();
        let dark = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x, y)))
            .filter(|&(x, y)| qr.luma(x, y) == 0)
            .count();
        assert!(dark > 0);
    }

    #[test]
    fn test_render_rejects_empty() {
        assert!(matches!(render("", 220), Err(QrError::Empty)));
    }

    #[test]
    fn test_render_rejects_oversized_payload() {
        let huge = "x".repeat(8000);
        assert!(matches!(render(&huge, 220), Err(QrError::Encode(_))));
    }

    #[test]
    fn test_to_png_is_decodable() {
        let qr = render("https://x/y", 64).unwrap();
        let png = qr.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), qr.size());
    }
}
