//! Panel palettes
//!
//! Each role the panel draws (key badges, the event log, the prompt and the
//! status bar) gets its own entry, picked from the configured [`Theme`].

use crate::config::Theme;
use crate::keyboard::{KeyEventType, KeyState};
use ratatui::style::{Color, Modifier, Style};

/// Colors and styles for every element of the panel
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    /// Key codes, labels and other plain text
    pub text: Color,
    /// Borders, timestamps and key hints
    pub muted: Color,
    /// Selected row marker and label
    pub selection: Color,
    /// Badge for a key at rest
    pub idle: Style,
    /// Badge for a key held down
    pub pressed: Style,
    /// Log entries for presses
    pub press_event: Color,
    /// Log entries for releases
    pub release_event: Color,
    /// `code>` prompt
    pub prompt: Color,
    /// Status bar background
    pub status: Style,
    /// Transient status message
    pub notice: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self::dark(),
            Theme::Light => Self::light(),
        }
    }

    pub fn dark() -> Self {
        Self {
            text: Color::Rgb(214, 219, 229),
            muted: Color::Rgb(98, 106, 124),
            selection: Color::Rgb(136, 192, 208),
            idle: Style::new().fg(Color::Rgb(160, 168, 184)).bg(Color::Rgb(46, 52, 64)),
            pressed: Style::new()
                .fg(Color::Rgb(30, 34, 42))
                .bg(Color::Rgb(235, 203, 139))
                .add_modifier(Modifier::BOLD),
            press_event: Color::Rgb(235, 203, 139),
            release_event: Color::Rgb(143, 188, 187),
            prompt: Color::Rgb(136, 192, 208),
            status: Style::new().fg(Color::Rgb(214, 219, 229)).bg(Color::Rgb(59, 66, 82)),
            notice: Color::Rgb(208, 135, 112),
        }
    }

    pub fn light() -> Self {
        Self {
            text: Color::Rgb(36, 41, 51),
            muted: Color::Rgb(128, 134, 148),
            selection: Color::Rgb(40, 96, 150),
            idle: Style::new().fg(Color::Rgb(70, 76, 90)).bg(Color::Rgb(226, 229, 236)),
            pressed: Style::new()
                .fg(Color::Rgb(255, 255, 255))
                .bg(Color::Rgb(178, 112, 20))
                .add_modifier(Modifier::BOLD),
            press_event: Color::Rgb(178, 112, 20),
            release_event: Color::Rgb(40, 120, 110),
            prompt: Color::Rgb(40, 96, 150),
            status: Style::new().fg(Color::Rgb(36, 41, 51)).bg(Color::Rgb(216, 222, 233)),
            notice: Color::Rgb(170, 60, 40),
        }
    }

    /// Badge style for a key in `state`
    pub fn badge(&self, state: KeyState) -> Style {
        match state {
            KeyState::Idle => self.idle,
            KeyState::Pressed => self.pressed,
        }
    }

    /// Log color for an event of `event_type`
    pub fn event(&self, event_type: KeyEventType) -> Color {
        match event_type {
            KeyEventType::Press => self.press_event,
            KeyEventType::Release => self.release_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressed_badge_stands_out_from_idle() {
        for theme in [Theme::Dark, Theme::Light] {
            let palette = Palette::for_theme(theme);
            assert_ne!(palette.badge(KeyState::Idle), palette.badge(KeyState::Pressed));
            assert_ne!(
                palette.event(KeyEventType::Press),
                palette.event(KeyEventType::Release)
            );
        }
    }

    #[test]
    fn themes_differ() {
        assert_ne!(Palette::dark().text, Palette::light().text);
    }
}
