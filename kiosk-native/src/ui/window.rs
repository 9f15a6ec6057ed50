//! Main application window hosting the booth screen.

use gtk4 as gtk;
use gtk4::prelude::*;
use libadwaita as adw;
use libadwaita::prelude::*;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use snapqr_core::{AppMessage, BoothCommand, BoothContext, BoothEvent, MessageSender};

use crate::ui::booth::{self, BoothAction, BoothWidgets};
use crate::video::BusWatchGuard;

/// Main window containing the booth screen
pub struct MainWindow {
    pub window: adw::ApplicationWindow,
    ctx: Rc<BoothContext>,
    widgets: BoothWidgets,
    toasts: adw::ToastOverlay,
    /// Input listeners that count as user activity; rebuilt on reload
    activity: RefCell<Vec<gtk::EventController>>,
    _bus_watch: Option<BusWatchGuard>,
}

impl MainWindow {
    pub fn new(
        app: &adw::Application,
        ctx: Rc<BoothContext>,
        paintable: Option<&gtk::gdk::Paintable>,
        bus_watch: Option<BusWatchGuard>,
    ) -> Rc<Self> {
        let window = adw::ApplicationWindow::builder()
            .application(app)
            .title("SnapQR Booth")
            .default_width(1920)
            .default_height(1080)
            .build();

        // Go fullscreen once the window is mapped
        window.connect_map(|window| {
            let window = window.clone();
            glib::timeout_add_local_once(std::time::Duration::from_millis(100), move || {
                window.fullscreen();
            });
        });

        window.set_cursor_from_name(Some("none"));

        let main_window = Rc::new_cyclic(|this: &Weak<MainWindow>| {
            let this = this.clone();
            let widgets = booth::create_booth_screen(
                paintable,
                ctx.config.mirror,
                ctx.config.qr_size,
                move |action| {
                    if let Some(window) = this.upgrade() {
                        window.on_action(action);
                    }
                },
            );

            let toasts = adw::ToastOverlay::new();
            toasts.set_child(Some(&widgets.root));
            window.set_content(Some(&toasts));

            Self {
                window,
                ctx,
                widgets,
                toasts,
                activity: RefCell::new(Vec::new()),
                _bus_watch: bus_watch,
            }
        });

        main_window.load_css();
        main_window.subscribe_activity();
        main_window.update_ui();

        main_window
    }

    fn load_css(&self) {
        let Some(display) = gtk::gdk::Display::default() else {
            log::warn!("No display, skipping stylesheet");
            return;
        };

        let provider = gtk::CssProvider::new();
        provider.load_from_string(include_str!("../../resources/style.css"));
        gtk::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }

    /// Route a button press to the state machine or handle it locally
    fn on_action(&self, action: BoothAction) {
        log::debug!("Booth action: {:?}", action);
        match action {
            BoothAction::Capture => {
                self.widgets.flash();
                self.ctx.send_event(BoothEvent::Capture);
            }
            BoothAction::Retake => self.ctx.send_event(BoothEvent::Retake),
            BoothAction::ClosePreview => self.ctx.send_event(BoothEvent::ClosePreview),
            BoothAction::Upload => self.ctx.send_event(BoothEvent::Upload),
            BoothAction::ManualRefresh => self.ctx.send_event(BoothEvent::ManualRefresh),
            BoothAction::Download => self.download(),
            BoothAction::ToggleFullscreen => {
                if self.window.is_fullscreen() {
                    self.window.unfullscreen();
                } else {
                    self.window.fullscreen();
                }
            }
        }
    }

    /// Save the current still to the Pictures folder
    fn download(&self) {
        let Some(snapshot) = self.ctx.current_snapshot() else {
            return;
        };

        let dir = glib::user_special_dir(glib::UserDirectory::Pictures)
            .unwrap_or_else(glib::home_dir);
        let message = match snapshot.save_to(&dir) {
            Ok(path) => format!(
                "Saved {}",
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            ),
            Err(e) => {
                log::error!("Failed to save photo to {}: {}", dir.display(), e);
                format!("Could not save photo: {}", e)
            }
        };
        self.toasts.add_toast(adw::Toast::new(&message));
    }

    /// Listen for any pointer, touch, key or scroll input on the window.
    ///
    /// Existing listeners are removed first, so calling this again after a
    /// reload leaves exactly one set attached.
    fn subscribe_activity(&self) {
        let mut controllers = self.activity.borrow_mut();
        for controller in controllers.drain(..) {
            self.window.remove_controller(&controller);
        }

        let tx: MessageSender = self.ctx.message_tx.clone();

        let motion = gtk::EventControllerMotion::new();
        let motion_tx = tx.clone();
        motion.connect_motion(move |_, _, _| motion_tx.send_event(BoothEvent::Activity));

        let click = gtk::GestureClick::new();
        click.set_propagation_phase(gtk::PropagationPhase::Capture);
        let click_tx = tx.clone();
        click.connect_pressed(move |_, _, _, _| click_tx.send_event(BoothEvent::Activity));

        let key = gtk::EventControllerKey::new();
        key.set_propagation_phase(gtk::PropagationPhase::Capture);
        let key_tx = tx.clone();
        key.connect_key_pressed(move |_, _, _, _| {
            key_tx.send_event(BoothEvent::Activity);
            glib::Propagation::Proceed
        });

        let scroll = gtk::EventControllerScroll::new(gtk::EventControllerScrollFlags::BOTH_AXES);
        scroll.set_propagation_phase(gtk::PropagationPhase::Capture);
        scroll.connect_scroll(move |_, _, _| {
            tx.send_event(BoothEvent::Activity);
            glib::Propagation::Proceed
        });

        for controller in [
            motion.upcast::<gtk::EventController>(),
            click.upcast(),
            key.upcast(),
            scroll.upcast(),
        ] {
            self.window.add_controller(controller.clone());
            controllers.push(controller);
        }
    }

    /// Handle app messages - main entry point for state updates
    pub fn handle_message(&self, msg: AppMessage) {
        let commands = self.ctx.handle_message(msg);
        self.apply(&commands);
    }

    /// Apply the UI side of the commands the context already executed
    fn apply(&self, commands: &[BoothCommand]) {
        let mut needs_update = false;

        for cmd in commands {
            match cmd {
                BoothCommand::ShowQr { qr } => self.widgets.show_qr(qr),
                BoothCommand::RemoveQr => self.widgets.remove_qr(),
                BoothCommand::Reload => {
                    log::info!("Resetting booth screen");
                    self.widgets.reset();
                    self.subscribe_activity();
                    needs_update = true;
                }
                BoothCommand::UpdateUI => needs_update = true,
                _ => {}
            }
        }

        if needs_update {
            self.update_ui();
        }
    }

    /// Update the UI to reflect current state
    fn update_ui(&self) {
        let view = self.ctx.state_machine.borrow().view();
        self.widgets.render(&view);
    }
}
