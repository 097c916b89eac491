//! Text control surface: list keys, trigger a key
//!
//! `read` renders the supported codes as
//!
//! ```text
//! Support Keys:
//! 116
//! 115
//! ```
//!
//! and `write` takes a decimal code and presses it.

use crate::keyboard::{KeyCode, KeyError, KeyRegistry, KeyStateMachine, TriggerOutcome};
use log::warn;
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;

/// First line of the key listing
pub const LIST_HEADER: &str = "Support Keys:";

/// Error type for control writes
#[derive(Debug, Error)]
pub enum ControlError {
    /// Payload is not a base-10 key code
    #[error("invalid key code: {0:?}")]
    InvalidArgument(String),
    /// The state machine no longer accepts triggers
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Read/write endpoint over a [`KeyStateMachine`]
#[derive(Clone)]
pub struct Control {
    machine: Arc<KeyStateMachine>,
}

impl Control {
    pub fn new(machine: Arc<KeyStateMachine>) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> &KeyStateMachine {
        &self.machine
    }

    /// Header line followed by one code per line, in registry order
    pub fn read(&self) -> String {
        listing(self.machine.registry())
    }

    /// Parse `text` as a key code and trigger it.
    ///
    /// Returns the number of bytes consumed. Unknown codes are accepted and
    /// ignored; unparseable text is rejected without touching any key.
    pub fn write(&self, text: &str) -> Result<usize, ControlError> {
        self.write_with_outcome(text).map(|_| text.len())
    }

    /// Like [`write`](Self::write), reporting which branch the trigger took
    pub fn write_with_outcome(&self, text: &str) -> Result<TriggerOutcome, ControlError> {
        let code = parse_code(text)?;
        Ok(self.machine.trigger(code)?)
    }
}

/// Render the key listing for `registry`; this is what [`Control::read`] returns
pub fn listing(registry: &KeyRegistry) -> String {
    let mut out = format!("{}\n", LIST_HEADER);
    for code in registry.list_codes() {
        let _ = writeln!(out, "{}", code);
    }
    out
}

/// Parse a base-10 key code, allowing surrounding whitespace
pub fn parse_code(text: &str) -> Result<KeyCode, ControlError> {
    let trimmed = text.trim();
    trimmed.parse::<u32>().map(KeyCode).map_err(|_| {
        warn!("convert keycode fail: {:?}", trimmed);
        ControlError::InvalidArgument(trimmed.to_string())
    })
}
