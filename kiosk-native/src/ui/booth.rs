//! Booth screen: live preview with the capture control, and the result
//! panel holding the captured still, its QR code and the follow-up actions.

use gtk4 as gtk;
use gtk4::prelude::*;
use std::cell::RefCell;

use snapqr_core::{BoothView, QrImage, Snapshot};

use crate::ui::widgets::{self, animations, QrView};

/// Something the user asked for from the booth screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoothAction {
    Capture,
    Retake,
    ClosePreview,
    Upload,
    Download,
    ToggleFullscreen,
    ManualRefresh,
}

/// References to updateable widgets in the booth screen
pub struct BoothWidgets {
    pub root: gtk::Overlay,
    pub status_label: gtk::Label,
    pub capture_button: gtk::Button,
    pub refresh_button: gtk::Button,
    pub result_panel: gtk::Box,
    pub upload_button: gtk::Button,
    pub download_button: gtk::Button,
    preview: gtk::Picture,
    flash: gtk::Box,
    qr: QrView,
    shown: RefCell<Option<Snapshot>>,
}

/// Create the booth screen.
///
/// `paintable` is the live camera feed; without one a placeholder is shown
/// in its place. `on_action` receives every button press.
pub fn create_booth_screen(
    paintable: Option<&gtk::gdk::Paintable>,
    mirror: bool,
    qr_size: u32,
    on_action: impl Fn(BoothAction) + Clone + 'static,
) -> BoothWidgets {
    let root = gtk::Overlay::new();
    root.add_css_class("booth-screen");

    // === Live preview ===
    let live: gtk::Widget = match paintable {
        Some(paintable) => {
            let video = gtk::Picture::new();
            video.set_paintable(Some(paintable));
            video.set_content_fit(gtk::ContentFit::Cover);
            video.set_hexpand(true);
            video.set_vexpand(true);
            video.add_css_class("video-preview");
            if mirror {
                video.add_css_class("mirrored");
            }
            video.upcast()
        }
        None => {
            let placeholder = gtk::Label::new(Some("No camera"));
            placeholder.add_css_class("camera-placeholder");
            placeholder.set_hexpand(true);
            placeholder.set_vexpand(true);
            placeholder.upcast()
        }
    };
    root.set_child(Some(&live));

    // Capture flash
    let flash = gtk::Box::new(gtk::Orientation::Vertical, 0);
    flash.add_css_class("capture-flash");
    flash.set_can_target(false);
    flash.set_visible(false);
    root.add_overlay(&flash);

    // === Top bar ===
    let top_bar = gtk::Box::new(gtk::Orientation::Horizontal, 12);
    top_bar.add_css_class("top-bar");
    top_bar.set_valign(gtk::Align::Start);
    top_bar.set_margin_start(24);
    top_bar.set_margin_end(24);
    top_bar.set_margin_top(16);

    let status_label = gtk::Label::new(None);
    status_label.add_css_class("status-label");
    status_label.set_xalign(0.0);
    status_label.set_hexpand(true);

    let refresh_button = gtk::Button::from_icon_name("view-refresh-symbolic");
    refresh_button.add_css_class("refresh-button");
    refresh_button.set_tooltip_text(Some("Restart the booth"));
    refresh_button.set_visible(false);
    let on = on_action.clone();
    refresh_button.connect_clicked(move |_| on(BoothAction::ManualRefresh));

    let fullscreen_button = gtk::Button::from_icon_name("view-fullscreen-symbolic");
    fullscreen_button.add_css_class("fullscreen-button");
    fullscreen_button.set_tooltip_text(Some("Toggle fullscreen"));
    let on = on_action.clone();
    fullscreen_button.connect_clicked(move |_| on(BoothAction::ToggleFullscreen));

    top_bar.append(&status_label);
    top_bar.append(&refresh_button);
    top_bar.append(&fullscreen_button);
    root.add_overlay(&top_bar);

    // === Capture control ===
    let on = on_action.clone();
    let capture_button = widgets::create_capture_button(move || on(BoothAction::Capture));
    capture_button.set_halign(gtk::Align::Center);
    capture_button.set_valign(gtk::Align::End);
    capture_button.set_margin_bottom(32);
    capture_button.set_sensitive(false);
    root.add_overlay(&capture_button);

    // === Result panel ===
    let result_panel = gtk::Box::new(gtk::Orientation::Vertical, 16);
    result_panel.add_css_class("result-panel");
    result_panel.set_halign(gtk::Align::Center);
    result_panel.set_valign(gtk::Align::Center);
    result_panel.set_visible(false);

    let media = gtk::Box::new(gtk::Orientation::Horizontal, 24);
    media.set_halign(gtk::Align::Center);

    let preview = gtk::Picture::new();
    preview.set_content_fit(gtk::ContentFit::Contain);
    preview.set_size_request(480, 360);
    preview.add_css_class("still-preview");

    let qr = QrView::new(qr_size);

    media.append(&preview);
    media.append(&qr.container);

    let actions = gtk::Box::new(gtk::Orientation::Horizontal, 12);
    actions.set_halign(gtk::Align::Center);

    let on = on_action.clone();
    let retake_button = widgets::create_action_button("edit-undo-symbolic", "Retake", move || {
        on(BoothAction::Retake)
    });
    let on = on_action.clone();
    let upload_button =
        widgets::create_action_button("send-to-symbolic", "Get QR code", move || {
            on(BoothAction::Upload)
        });
    upload_button.add_css_class("suggested-action");
    let on = on_action.clone();
    let download_button =
        widgets::create_action_button("document-save-symbolic", "Download", move || {
            on(BoothAction::Download)
        });
    let on = on_action;
    let close_button = widgets::create_action_button("window-close-symbolic", "Close", move || {
        on(BoothAction::ClosePreview)
    });

    actions.append(&retake_button);
    actions.append(&upload_button);
    actions.append(&download_button);
    actions.append(&close_button);

    result_panel.append(&media);
    result_panel.append(&actions);
    root.add_overlay(&result_panel);

    BoothWidgets {
        root,
        status_label,
        capture_button,
        refresh_button,
        result_panel,
        upload_button,
        download_button,
        preview,
        flash,
        qr,
        shown: RefCell::new(None),
    }
}

impl BoothWidgets {
    /// Bring every widget in line with `view`
    pub fn render(&self, view: &BoothView) {
        self.status_label.set_text(&view.status);
        self.capture_button.set_sensitive(view.capture_enabled);
        self.upload_button.set_sensitive(view.upload_enabled);
        self.download_button.set_sensitive(view.download_enabled);
        self.refresh_button.set_visible(view.manual_refresh_visible);

        match &view.preview {
            Some(snapshot) => {
                self.set_still(snapshot);
                if !self.result_panel.is_visible() {
                    animations::fade_in(&self.result_panel, animations::duration::NORMAL);
                }
            }
            None => {
                if self.shown.borrow_mut().take().is_some() {
                    self.preview.set_paintable(None::<&gtk::gdk::Paintable>);
                }
                self.result_panel.set_visible(false);
            }
        }
    }

    fn set_still(&self, snapshot: &Snapshot) {
        let unchanged = self
            .shown
            .borrow()
            .as_ref()
            .is_some_and(|shown| shown.same_image(snapshot));
        if unchanged {
            return;
        }

        match widgets::texture_from_png(snapshot.png()) {
            Ok(texture) => self.preview.set_paintable(Some(&texture)),
            Err(e) => log::error!("Failed to load snapshot texture: {}", e),
        }
        *self.shown.borrow_mut() = Some(snapshot.clone());
    }

    pub fn show_qr(&self, qr: &QrImage) {
        self.qr.show(qr);
    }

    pub fn remove_qr(&self) {
        self.qr.clear();
    }

    pub fn flash(&self) {
        animations::flash(&self.flash);
    }

    /// Drop everything left from the previous session
    pub fn reset(&self) {
        self.remove_qr();
        self.shown.borrow_mut().take();
        self.preview.set_paintable(None::<&gtk::gdk::Paintable>);
        self.result_panel.set_visible(false);
    }
}
