//! The set of emulable keys
//!
//! A [`KeyRegistry`] is built once from configuration records and never
//! resized. Each [`KeyDescriptor`] guards its own press state with its own
//! lock, so work on different keys never contends.

use super::KeyCode;
use crate::config::{ConfigError, KeyEntry};
use crate::timer::TimerHandle;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fmt;

/// Logical state of one key's press cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    Idle,
    Pressed,
}

impl KeyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Pressed => "Pressed",
        }
    }
}

/// Anything a registry can be loaded from: a record that may carry a code
pub trait KeyRecord {
    fn code(&self) -> Option<u32>;

    fn label(&self) -> Option<&str> {
        None
    }
}

impl KeyRecord for u32 {
    fn code(&self) -> Option<u32> {
        Some(*self)
    }
}

impl KeyRecord for KeyEntry {
    fn code(&self) -> Option<u32> {
        self.code
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl<T: KeyRecord + ?Sized> KeyRecord for &T {
    fn code(&self) -> Option<u32> {
        (**self).code()
    }

    fn label(&self) -> Option<&str> {
        (**self).label()
    }
}

/// Mutable part of a key, only touched under the descriptor's lock
#[derive(Debug, Default)]
pub(crate) struct KeySlot {
    pub(crate) state: KeyState,
    pub(crate) pending: Option<TimerHandle>,
}

/// One emulable key
pub struct KeyDescriptor {
    code: KeyCode,
    label: Option<String>,
    slot: Mutex<KeySlot>,
}

impl KeyDescriptor {
    fn new(code: KeyCode, label: Option<String>) -> Self {
        Self {
            code,
            label,
            slot: Mutex::new(KeySlot::default()),
        }
    }

    pub fn code(&self) -> KeyCode {
        self.code
    }

    /// Label from configuration, if one was given
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn state(&self) -> KeyState {
        self.slot.lock().state
    }

    /// Whether a release timer is currently held for this key
    pub fn has_pending_release(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, KeySlot> {
        self.slot.lock()
    }
}

impl fmt::Debug for KeyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyDescriptor")
            .field("code", &self.code)
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

/// Ordered, fixed collection of key descriptors
#[derive(Debug)]
pub struct KeyRegistry {
    keys: Vec<KeyDescriptor>,
    index: HashMap<KeyCode, usize>,
}

impl KeyRegistry {
    /// Build a registry from configuration records.
    ///
    /// Fails if there are no records, a record has no code, or two records
    /// share a code. No partial registry is ever produced.
    pub fn load<I, R>(records: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = R>,
        R: KeyRecord,
    {
        let mut keys = Vec::new();
        let mut index = HashMap::new();

        for (position, record) in records.into_iter().enumerate() {
            let code = record
                .code()
                .map(KeyCode)
                .ok_or(ConfigError::MissingCode { index: position })?;

            if index.insert(code, keys.len()).is_some() {
                return Err(ConfigError::DuplicateCode(code));
            }
            keys.push(KeyDescriptor::new(code, record.label().map(str::to_owned)));
        }

        if keys.is_empty() {
            return Err(ConfigError::EmptyKeymap);
        }

        Ok(Self { keys, index })
    }

    /// All known codes in registration order
    pub fn list_codes(&self) -> Vec<KeyCode> {
        self.keys.iter().map(|key| key.code).collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false for a loaded registry
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, code: KeyCode) -> bool {
        self.index.contains_key(&code)
    }

    pub fn get(&self, code: KeyCode) -> Option<&KeyDescriptor> {
        self.position(code).and_then(|i| self.keys.get(i))
    }

    /// Registration index of a code
    pub fn position(&self, code: KeyCode) -> Option<usize> {
        self.index.get(&code).copied()
    }

    pub fn descriptor(&self, position: usize) -> Option<&KeyDescriptor> {
        self.keys.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyDescriptor> {
        self.keys.iter()
    }
}
