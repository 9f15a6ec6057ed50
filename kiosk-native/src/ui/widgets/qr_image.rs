//! QR code display for uploaded photos.

use gtk4 as gtk;
use gtk4::prelude::*;

use snapqr_core::QrImage;

/// Decode PNG bytes into a texture
pub fn texture_from_png(png: &[u8]) -> Result<gtk::gdk::Texture, glib::Error> {
    let bytes = glib::Bytes::from_owned(png.to_vec());
    gtk::gdk::Texture::from_bytes(&bytes)
}

/// Holds at most one QR code and the link it encodes
pub struct QrView {
    pub container: gtk::Box,
    picture: gtk::Picture,
    caption: gtk::Label,
}

impl QrView {
    pub fn new(size: u32) -> Self {
        let container = gtk::Box::new(gtk::Orientation::Vertical, 8);
        container.add_css_class("qr-panel");
        container.set_halign(gtk::Align::Center);
        container.set_visible(false);

        let picture = gtk::Picture::new();
        picture.set_size_request(size as i32, size as i32);
        picture.set_can_shrink(false);
        picture.set_content_fit(gtk::ContentFit::Contain);
        picture.add_css_class("qr-image");

        let caption = gtk::Label::new(Some("Scan to download"));
        caption.add_css_class("qr-caption");
        caption.set_wrap(true);
        caption.set_max_width_chars(32);

        container.append(&picture);
        container.append(&caption);

        Self {
            container,
            picture,
            caption,
        }
    }

    /// Replace whatever is shown with `qr`
    pub fn show(&self, qr: &QrImage) {
        let texture = match qr.to_png().map(|png| texture_from_png(&png)) {
            Ok(Ok(texture)) => texture,
            Ok(Err(e)) => {
                log::error!("Failed to load QR texture: {}", e);
                return;
            }
            Err(e) => {
                log::error!("Failed to encode QR image: {}", e);
                return;
            }
        };

        self.picture.set_paintable(Some(&texture));
        self.caption.set_tooltip_text(Some(qr.text()));
        self.container.set_visible(true);
    }

    pub fn clear(&self) {
        self.picture.set_paintable(None::<&gtk::gdk::Paintable>);
        self.caption.set_tooltip_text(None);
        self.container.set_visible(false);
    }
}
