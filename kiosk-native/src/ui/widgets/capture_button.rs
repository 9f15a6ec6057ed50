//! Capture and action buttons.

use gtk4 as gtk;
use gtk4::prelude::*;

use super::animations;

/// Create the round capture button with press feedback
pub fn create_capture_button<F>(on_click: F) -> gtk::Button
where
    F: Fn() + 'static,
{
    let button = gtk::Button::new();
    button.add_css_class("capture-button");
    button.set_size_request(112, 112);
    button.set_tooltip_text(Some("Take a photo"));

    let icon = gtk::Image::from_icon_name("camera-photo-symbolic");
    icon.set_pixel_size(44);
    icon.add_css_class("capture-icon");
    button.set_child(Some(&icon));

    button.connect_clicked(move |button| {
        animations::button_press(button);
        on_click();
    });

    button
}

/// A labelled pill button for the result panel
pub fn create_action_button<F>(icon_name: &str, label: &str, on_click: F) -> gtk::Button
where
    F: Fn() + 'static,
{
    let content = gtk::Box::new(gtk::Orientation::Horizontal, 8);
    content.set_halign(gtk::Align::Center);
    content.append(&gtk::Image::from_icon_name(icon_name));
    content.append(&gtk::Label::new(Some(label)));

    let button = gtk::Button::new();
    button.set_child(Some(&content));
    button.add_css_class("action-button");
    button.connect_clicked(move |button| {
        animations::button_press(button);
        on_click();
    });

    button
}
