//! UI components for the kiosk.

pub mod booth;
pub mod widgets;
pub mod window;

pub use window::MainWindow;
