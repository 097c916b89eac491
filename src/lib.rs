//! virt-keys - virtual key press emulator
//!
//! Triggering a configured key code reports a press to the host input
//! framework, holds the key down for a fixed duration, then reports the
//! release on its own. Repeated triggers while a key is down are ignored.

pub mod config;
pub mod control;
pub mod keyboard;
pub mod sink;
pub mod timer;
pub mod ui;

pub use config::Config;
pub use control::Control;
pub use keyboard::{KeyCode, KeyRegistry, KeyStateMachine};
pub use sink::EventSink;
