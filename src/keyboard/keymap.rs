//! Key code definitions and display names

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Represents a host input-framework key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub fn new(code: u32) -> Self {
        Self(code)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for KeyCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Linux input key names, used for labels only
pub static KEY_NAMES: LazyLock<HashMap<KeyCode, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    map.insert(KeyCode(1), "Esc");
    for (offset, name) in ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"]
        .into_iter()
        .enumerate()
    {
        map.insert(KeyCode(2 + offset as u32), name);
    }
    map.insert(KeyCode(14), "Backspace");
    map.insert(KeyCode(15), "Tab");
    for (offset, name) in ["Q", "W", "E", "R", "T", "Y", "U", "I", "O", "P"]
        .into_iter()
        .enumerate()
    {
        map.insert(KeyCode(16 + offset as u32), name);
    }
    map.insert(KeyCode(28), "Enter");
    map.insert(KeyCode(29), "LeftCtrl");
    for (offset, name) in ["A", "S", "D", "F", "G", "H", "J", "K", "L"]
        .into_iter()
        .enumerate()
    {
        map.insert(KeyCode(30 + offset as u32), name);
    }
    map.insert(KeyCode(42), "LeftShift");
    for (offset, name) in ["Z", "X", "C", "V", "B", "N", "M"].into_iter().enumerate() {
        map.insert(KeyCode(44 + offset as u32), name);
    }
    map.insert(KeyCode(54), "RightShift");
    map.insert(KeyCode(56), "LeftAlt");
    map.insert(KeyCode(57), "Space");
    map.insert(KeyCode(58), "CapsLock");
    for (offset, name) in ["F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10"]
        .into_iter()
        .enumerate()
    {
        map.insert(KeyCode(59 + offset as u32), name);
    }
    map.insert(KeyCode(87), "F11");
    map.insert(KeyCode(88), "F12");
    map.insert(KeyCode(102), "Home");
    map.insert(KeyCode(103), "Up");
    map.insert(KeyCode(104), "PageUp");
    map.insert(KeyCode(105), "Left");
    map.insert(KeyCode(106), "Right");
    map.insert(KeyCode(107), "End");
    map.insert(KeyCode(108), "Down");
    map.insert(KeyCode(109), "PageDown");
    map.insert(KeyCode(110), "Insert");
    map.insert(KeyCode(111), "Delete");

    // Media and system keys, the usual targets for virtual presses
    map.insert(KeyCode(113), "Mute");
    map.insert(KeyCode(114), "VolumeDown");
    map.insert(KeyCode(115), "VolumeUp");
    map.insert(KeyCode(116), "Power");
    map.insert(KeyCode(142), "Sleep");
    map.insert(KeyCode(143), "WakeUp");
    map.insert(KeyCode(158), "Back");
    map.insert(KeyCode(163), "NextSong");
    map.insert(KeyCode(164), "PlayPause");
    map.insert(KeyCode(165), "PreviousSong");
    map.insert(KeyCode(172), "HomePage");
    map.insert(KeyCode(212), "Camera");
    map.insert(KeyCode(224), "BrightnessDown");
    map.insert(KeyCode(225), "BrightnessUp");

    map
});

/// Look up the conventional name of a key code
pub fn key_name(code: KeyCode) -> Option<&'static str> {
    KEY_NAMES.get(&code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_names() {
        assert_eq!(key_name(KeyCode(30)), Some("A"));
        assert_eq!(key_name(KeyCode(11)), Some("0"));
        assert_eq!(key_name(KeyCode(59)), Some("F1"));
        assert_eq!(key_name(KeyCode(68)), Some("F10"));
        assert_eq!(key_name(KeyCode(116)), Some("Power"));
    }

    #[test]
    fn unknown_code_has_no_name() {
        assert_eq!(key_name(KeyCode(9999)), None);
    }

    #[test]
    fn key_code_displays_as_decimal() {
        assert_eq!(KeyCode(116).to_string(), "116");
    }
}
