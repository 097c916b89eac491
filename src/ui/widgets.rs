//! Custom TUI widgets

use super::app::{KeyRow, LogEntry};
use super::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::collections::VecDeque;

/// List of supported keys with their live state
pub struct KeyList<'a> {
    rows: &'a [KeyRow],
    selected: usize,
    palette: Palette,
}

impl<'a> KeyList<'a> {
    pub fn new(rows: &'a [KeyRow], selected: usize, palette: Palette) -> Self {
        Self {
            rows,
            selected,
            palette,
        }
    }
}

impl<'a> Widget for KeyList<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Support Keys ")
            .borders(Borders::ALL)
            .border_set(border::ROUNDED)
            .border_style(Style::default().fg(self.palette.muted));

        let inner = block.inner(area);
        block.render(area, buf);

        // Keep the selection visible when the list is taller than the area.
        let height = inner.height as usize;
        let skip = (self.selected + 1).saturating_sub(height);

        for (row_index, (i, row)) in self.rows.iter().enumerate().skip(skip).enumerate() {
            if row_index >= height {
                break;
            }
            let y = inner.y + row_index as u16;

            let marker = if i == self.selected { "> " } else { "  " };
            let name_style = if i == self.selected {
                Style::default()
                    .fg(self.palette.selection)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.palette.text)
            };

            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(self.palette.selection)),
                Span::styled(format!("{:>5} ", row.code), name_style),
                Span::styled(format!("{:<14}", row.label), name_style),
                Span::styled(
                    format!(" {:^9} ", row.state.as_str()),
                    self.palette.badge(row.state),
                ),
            ]);
            buf.set_line(inner.x, y, &line, inner.width);
        }
    }
}

/// Time-stamped press/release log, newest at the bottom
pub struct EventLog<'a> {
    entries: &'a VecDeque<LogEntry>,
    palette: Palette,
}

impl<'a> EventLog<'a> {
    pub fn new(entries: &'a VecDeque<LogEntry>, palette: Palette) -> Self {
        Self { entries, palette }
    }
}

impl<'a> Widget for EventLog<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Events ")
            .borders(Borders::ALL)
            .border_set(border::ROUNDED)
            .border_style(Style::default().fg(self.palette.muted));

        let inner = block.inner(area);
        block.render(area, buf);

        let height = inner.height as usize;
        let skip = self.entries.len().saturating_sub(height);

        for (row, entry) in self.entries.iter().skip(skip).enumerate() {
            let color = self.palette.event(entry.event_type);
            let line = Line::from(vec![
                Span::styled(
                    entry.at.format("%H:%M:%S%.3f ").to_string(),
                    Style::default().fg(self.palette.muted),
                ),
                Span::styled(
                    format!("{:<8}", entry.event_type.as_str()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(entry.code.to_string(), Style::default().fg(self.palette.text)),
            ]);
            buf.set_line(inner.x, inner.y + row as u16, &line, inner.width);
        }
    }
}

/// Single-line prompt for typing a key code
pub struct InputLine<'a> {
    input: &'a str,
    palette: Palette,
}

impl<'a> InputLine<'a> {
    pub fn new(input: &'a str, palette: Palette) -> Self {
        Self { input, palette }
    }
}

impl<'a> Widget for InputLine<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let line = Line::from(vec![
            Span::styled(" code> ", Style::default().fg(self.palette.prompt)),
            Span::styled(self.input, Style::default().fg(self.palette.text)),
            Span::styled("_", Style::default().fg(self.palette.muted)),
            Span::styled(
                "   Up/Down select  Enter trigger  0-9 type code  q quit",
                Style::default().fg(self.palette.muted),
            ),
        ]);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}

/// Status bar widget
pub struct StatusBar<'a> {
    elapsed: &'a str,
    events: u64,
    hold_ms: u128,
    message: Option<&'a str>,
    palette: Palette,
}

impl<'a> StatusBar<'a> {
    pub fn new(elapsed: &'a str, events: u64, hold_ms: u128, palette: Palette) -> Self {
        Self {
            elapsed,
            events,
            hold_ms,
            message: None,
            palette,
        }
    }

    pub fn message(mut self, message: Option<&'a str>) -> Self {
        self.message = message;
        self
    }
}

impl<'a> Widget for StatusBar<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bg_style = self.palette.status;
        for x in area.x..area.x + area.width {
            buf.set_string(x, area.y, " ", bg_style);
        }

        let left = format!(" virt-keys | hold {} ms ", self.hold_ms);
        buf.set_string(area.x, area.y, &left, bg_style.add_modifier(Modifier::BOLD));

        if let Some(msg) = self.message {
            let msg_style = self.palette.status.fg(self.palette.notice);
            let msg_x = area.x + (area.width / 2).saturating_sub(msg.len() as u16 / 2);
            buf.set_string(msg_x, area.y, msg, msg_style);
        }

        let right = format!(" {} | Events: {} ", self.elapsed, self.events);
        let right_x = area.x + area.width.saturating_sub(right.len() as u16);
        buf.set_string(right_x, area.y, &right, bg_style);
    }
}
