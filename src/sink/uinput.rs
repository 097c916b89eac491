//! Virtual input device backed by Linux uinput
//!
//! Registers one device whose key capabilities are exactly the registry's
//! codes, under the configured name and physical path, then reports presses
//! and releases through it. Each emitted batch is
//! terminated with a sync report by the `evdev` crate.

use super::{EventSink, SinkError};
use crate::config::DeviceConfig;
use crate::keyboard::{KeyCode, KeyEventType, KeyRegistry};
use evdev::uinput::VirtualDevice;
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId};
use log::info;
use parking_lot::Mutex;
use std::ffi::CString;
use std::io;

/// Highest key code the kernel accepts
pub const KEY_MAX: u32 = 0x2ff;

/// Sink that drives a uinput virtual keyboard
pub struct UinputSink {
    device: Mutex<VirtualDevice>,
}

fn to_raw(code: KeyCode) -> Result<u16, SinkError> {
    u16::try_from(code.as_u32())
        .ok()
        .filter(|raw| u32::from(*raw) <= KEY_MAX)
        .ok_or(SinkError::UnsupportedCode(code))
}

fn phys_path(phys: &str) -> Result<CString, SinkError> {
    CString::new(phys).map_err(|_| {
        SinkError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "device phys path contains a NUL byte",
        ))
    })
}

impl UinputSink {
    /// Create the device with a key capability for every registered code.
    ///
    /// Usually needs write access to `/dev/uinput`.
    pub fn new(registry: &KeyRegistry, config: &DeviceConfig) -> Result<Self, SinkError> {
        let mut keys = AttributeSet::<evdev::KeyCode>::new();
        for code in registry.list_codes() {
            keys.insert(evdev::KeyCode::new(to_raw(code)?));
        }
        let phys = phys_path(&config.phys)?;

        let device = VirtualDevice::builder()?
            .name(config.name.as_str())
            .input_id(InputId::new(BusType::BUS_HOST, 0, 0, 0))
            .with_phys(&phys)?
            .with_keys(&keys)?
            .build()?;

        info!(
            "registered virtual input device '{}' at {} with {} key(s)",
            config.name,
            config.phys,
            registry.len()
        );

        Ok(Self {
            device: Mutex::new(device),
        })
    }

    fn emit(&self, code: KeyCode, event_type: KeyEventType) -> Result<(), SinkError> {
        let event = InputEvent::new(EventType::KEY.0, to_raw(code)?, event_type.value());
        self.device.lock().emit(&[event])?;
        Ok(())
    }
}

impl EventSink for UinputSink {
    fn press(&self, code: KeyCode) -> Result<(), SinkError> {
        self.emit(code, KeyEventType::Press)
    }

    fn release(&self, code: KeyCode) -> Result<(), SinkError> {
        self.emit(code, KeyEventType::Release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_within_key_max_convert() {
        assert_eq!(to_raw(KeyCode(116)).unwrap(), 116);
        assert_eq!(to_raw(KeyCode(KEY_MAX)).unwrap(), KEY_MAX as u16);
    }

    #[test]
    fn codes_above_key_max_are_rejected() {
        assert!(matches!(
            to_raw(KeyCode(KEY_MAX + 1)),
            Err(SinkError::UnsupportedCode(KeyCode(0x300)))
        ));
        assert!(to_raw(KeyCode(70_000)).is_err());
    }

    #[test]
    fn phys_path_from_config() {
        let phys = phys_path(&DeviceConfig::default().phys).unwrap();
        assert_eq!(phys.to_str().unwrap(), "virtkey/input0");
        assert!(matches!(phys_path("virt\0key"), Err(SinkError::Io(_))));
    }
}
