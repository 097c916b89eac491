//! Key event types reported to sinks

use super::KeyCode;
use std::time::Instant;

/// Type of keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    /// Key was pressed down
    Press,
    /// Key was released
    Release,
}

impl KeyEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::Release => "release",
        }
    }

    /// Value carried by an input-framework key event
    pub fn value(&self) -> i32 {
        match self {
            Self::Press => 1,
            Self::Release => 0,
        }
    }
}

/// A key event with timing information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code
    pub code: KeyCode,
    /// Type of event (press/release)
    pub event_type: KeyEventType,
    /// When the event was emitted
    pub timestamp: Instant,
}

impl KeyEvent {
    pub fn new(code: KeyCode, event_type: KeyEventType, timestamp: Instant) -> Self {
        Self {
            code,
            event_type,
            timestamp,
        }
    }

    pub fn press(code: KeyCode) -> Self {
        Self::new(code, KeyEventType::Press, Instant::now())
    }

    pub fn release(code: KeyCode) -> Self {
        Self::new(code, KeyEventType::Release, Instant::now())
    }
}
