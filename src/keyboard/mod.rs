//! Key registry, events, and the press/release state machine

mod event;
pub mod keymap;
mod machine;
mod registry;

pub use event::{KeyEvent, KeyEventType};
pub use keymap::{key_name, KeyCode, KEY_NAMES};
pub use machine::{KeyError, KeyStateMachine, TriggerOutcome, HOLD_DURATION};
pub use registry::{KeyDescriptor, KeyRecord, KeyRegistry, KeyState};
