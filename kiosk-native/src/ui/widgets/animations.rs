//! Small libadwaita animation helpers.

use gtk4 as gtk;
use gtk4::prelude::*;
use libadwaita as adw;
use libadwaita::prelude::*;

/// Animation durations (in milliseconds)
pub mod duration {
    pub const FAST: u32 = 150;
    pub const NORMAL: u32 = 250;
}

/// Animate a widget's opacity
pub fn fade(
    widget: &impl IsA<gtk::Widget>,
    from: f64,
    to: f64,
    duration_ms: u32,
    on_complete: Option<Box<dyn Fn()>>,
) -> adw::TimedAnimation {
    widget.set_opacity(from);

    let target_widget = widget.clone().upcast::<gtk::Widget>();
    let target = adw::CallbackAnimationTarget::new(move |value| {
        target_widget.set_opacity(value);
    });

    let animation = adw::TimedAnimation::builder()
        .widget(widget)
        .value_from(from)
        .value_to(to)
        .duration(duration_ms)
        .easing(adw::Easing::EaseOutCubic)
        .target(&target)
        .build();

    if let Some(callback) = on_complete {
        animation.connect_done(move |_| callback());
    }

    animation.play();
    animation
}

/// Show a widget and fade it in
pub fn fade_in(widget: &impl IsA<gtk::Widget>, duration_ms: u32) -> adw::TimedAnimation {
    widget.set_visible(true);
    fade(widget, 0.0, 1.0, duration_ms, None)
}

/// Fade a widget out, then hide it
pub fn fade_out(widget: &impl IsA<gtk::Widget>, duration_ms: u32) -> adw::TimedAnimation {
    let hidden = widget.clone().upcast::<gtk::Widget>();
    fade(
        widget,
        1.0,
        0.0,
        duration_ms,
        Some(Box::new(move || {
            hidden.set_visible(false);
            hidden.set_opacity(1.0);
        })),
    )
}

/// Quick opacity dip used as press feedback
pub fn button_press(widget: &impl IsA<gtk::Widget>) -> adw::TimedAnimation {
    let target_widget = widget.clone().upcast::<gtk::Widget>();
    let target = adw::CallbackAnimationTarget::new(move |value| {
        // 1.0 -> 0.7 -> 1.0
        let opacity = if value < 0.5 {
            1.0 - value * 0.6
        } else {
            0.7 + (value - 0.5) * 0.6
        };
        target_widget.set_opacity(opacity);
    });

    let animation = adw::TimedAnimation::builder()
        .widget(widget)
        .value_from(0.0)
        .value_to(1.0)
        .duration(duration::FAST)
        .easing(adw::Easing::EaseOutCubic)
        .target(&target)
        .build();

    animation.play();
    animation
}

/// White flash over the preview when a photo is taken
pub fn flash(widget: &impl IsA<gtk::Widget>) -> adw::TimedAnimation {
    widget.set_visible(true);
    fade_out(widget, duration::NORMAL)
}
