//! TUI application module
//!
//! Contains the terminal wrapper, the dashboard screen and the view state
//! driven by benchmark session events.

pub mod app;
pub mod screens;
pub mod state;
pub mod tui;

pub use app::App;
pub use state::{Action, AppState, SubsystemView};
pub use tui::Tui;
