//! Terminal User Interface components

mod app;
pub mod theme;
mod widgets;

pub use app::{App, AppState, KeyRow, LogEntry, LOG_CAPACITY};
pub use theme::Palette;
pub use widgets::*;
