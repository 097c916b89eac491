//! Terminal control panel state and logic

use super::Palette;
use crate::config::Theme;
use crate::control::Control;
use crate::keyboard::{key_name, KeyCode, KeyEvent, KeyEventType, KeyState, TriggerOutcome};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::time::Instant;

/// Maximum number of lines kept in the event log
pub const LOG_CAPACITY: usize = 200;

/// Longest code the input line accepts (u32::MAX has 10 digits)
const MAX_INPUT_DIGITS: usize = 10;

/// Application running state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Running,
    Quitting,
}

/// One row of the key list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRow {
    pub code: KeyCode,
    pub label: String,
    pub state: KeyState,
}

/// One line of the event log
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub code: KeyCode,
    pub event_type: KeyEventType,
}

/// Main application
pub struct App {
    /// Application state
    pub state: AppState,
    /// Control endpoint the panel drives
    pub control: Control,
    /// Index of the highlighted key
    pub selected: usize,
    /// Digits typed so far
    pub input: String,
    /// Most recent events, newest last
    pub log: VecDeque<LogEntry>,
    /// Color palette
    pub palette: Palette,
    /// Application start time
    pub start_time: Instant,
    /// Total events observed
    pub total_events: u64,
    /// Last status message
    pub status_message: Option<String>,
    /// Status message timestamp
    pub status_time: Option<Instant>,
}

impl App {
    pub fn new(control: Control, theme: Theme) -> Self {
        Self {
            state: AppState::Running,
            control,
            selected: 0,
            input: String::new(),
            log: VecDeque::with_capacity(LOG_CAPACITY),
            palette: Palette::for_theme(theme),
            start_time: Instant::now(),
            total_events: 0,
            status_message: None,
            status_time: None,
        }
    }

    /// Record an event reported by the state machine
    pub fn process_event(&mut self, event: &KeyEvent) {
        self.total_events += 1;
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(LogEntry {
            at: Local::now(),
            code: event.code,
            event_type: event.event_type,
        });
    }

    /// Current key list with live states
    pub fn rows(&self) -> Vec<KeyRow> {
        self.control
            .machine()
            .registry()
            .iter()
            .map(|key| KeyRow {
                code: key.code(),
                label: key
                    .label()
                    .or_else(|| key_name(key.code()))
                    .unwrap_or("?")
                    .to_string(),
                state: key.state(),
            })
            .collect()
    }

    pub fn key_count(&self) -> usize {
        self.control.machine().registry().len()
    }

    pub fn select_next(&mut self) {
        let count = self.key_count();
        if count > 0 {
            self.selected = (self.selected + 1) % count;
        }
    }

    pub fn select_prev(&mut self) {
        let count = self.key_count();
        if count > 0 {
            self.selected = if self.selected == 0 {
                count - 1
            } else {
                self.selected - 1
            };
        }
    }

    /// Trigger the highlighted key
    pub fn trigger_selected(&mut self) {
        let code = self
            .control
            .machine()
            .registry()
            .descriptor(self.selected)
            .map(|key| key.code());
        if let Some(code) = code {
            self.submit(&code.to_string());
        }
    }

    pub fn push_digit(&mut self, c: char) {
        if c.is_ascii_digit() && self.input.len() < MAX_INPUT_DIGITS {
            self.input.push(c);
        }
    }

    pub fn pop_digit(&mut self) {
        self.input.pop();
    }

    /// Write the typed code through the control endpoint
    pub fn submit_input(&mut self) {
        let input = std::mem::take(&mut self.input);
        self.submit(&input);
    }

    fn submit(&mut self, text: &str) {
        let message = match self.control.write_with_outcome(text) {
            Ok(TriggerOutcome::Pressed) => format!("Pressed {}", text),
            Ok(TriggerOutcome::AlreadyPressed) => format!("{} is already down", text),
            Ok(TriggerOutcome::Unknown) => format!("{} is not a supported key", text),
            Err(err) => format!("Error: {}", err),
        };
        self.set_status(message);
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.state = AppState::Quitting;
    }

    /// Set a status message
    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
        self.status_time = Some(Instant::now());
    }

    /// Get status message if still valid (within 3 seconds)
    pub fn get_status(&self) -> Option<&str> {
        match (&self.status_message, self.status_time) {
            (Some(msg), Some(time)) if time.elapsed().as_secs() < 3 => Some(msg),
            _ => None,
        }
    }

    /// Get elapsed time formatted
    pub fn elapsed_formatted(&self) -> String {
        let secs = self.start_time.elapsed().as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{KeyRegistry, KeyStateMachine};
    use crate::sink::ChannelSink;
    use std::sync::Arc;
    use std::time::Duration;

    fn app(codes: &[u32]) -> (App, std::sync::mpsc::Receiver<KeyEvent>) {
        let registry = KeyRegistry::load(codes.iter().copied()).unwrap();
        let (sink, rx) = ChannelSink::channel();
        let machine =
            KeyStateMachine::with_hold(registry, Arc::new(sink), Duration::from_secs(5)).unwrap();
        (App::new(Control::new(Arc::new(machine)), Theme::Dark), rx)
    }

    #[test]
    fn rows_use_key_names() {
        let (app, _rx) = app(&[30, 116, 9000]);
        let labels: Vec<_> = app.rows().into_iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["A", "Power", "?"]);
    }

    #[test]
    fn selection_wraps() {
        let (mut app, _rx) = app(&[1, 2, 3]);
        app.select_prev();
        assert_eq!(app.selected, 2);
        app.select_next();
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn trigger_selected_presses_key() {
        let (mut app, rx) = app(&[7, 9]);
        app.select_next();
        app.trigger_selected();

        assert_eq!(rx.try_recv().unwrap().code, KeyCode(9));
        assert_eq!(app.rows()[1].state, KeyState::Pressed);
        assert_eq!(app.get_status(), Some("Pressed 9"));
    }

    #[test]
    fn typed_input_goes_through_control() {
        let (mut app, rx) = app(&[7]);
        for c in ['7', 'x'] {
            app.push_digit(c);
        }
        assert_eq!(app.input, "7");
        app.submit_input();

        assert!(app.input.is_empty());
        assert_eq!(rx.try_recv().unwrap().code, KeyCode(7));
    }

    #[test]
    fn empty_input_reports_error() {
        let (mut app, rx) = app(&[7]);
        app.submit_input();
        assert!(app.get_status().unwrap().starts_with("Error"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn log_is_bounded() {
        let (mut app, _rx) = app(&[7]);
        for _ in 0..LOG_CAPACITY + 5 {
            app.process_event(&KeyEvent::press(KeyCode(7)));
        }
        assert_eq!(app.log.len(), LOG_CAPACITY);
        assert_eq!(app.total_events, (LOG_CAPACITY + 5) as u64);
    }
}
