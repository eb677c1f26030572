//! Search bar backed by tui-input.

use ratatui::crossterm::event::{Event, KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::{C_FILTER_BG, C_FILTER_FG, C_MUTED};

#[derive(Debug, PartialEq)]
pub enum SearchAction {
    /// The text changed; carries the new value.
    Changed(String),
    /// Editing finished, the text stays.
    Confirmed,
    /// Esc on an empty bar: editing finished.
    Closed,
    None,
}

pub struct SearchInput {
    input: Input,
    active: bool,
    placeholder: String,
}

impl SearchInput {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            active: false,
            placeholder: placeholder.into(),
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    /// Esc clears the text first and closes the bar only once it is empty.
    pub fn handle_key(&mut self, key: KeyEvent) -> SearchAction {
        match key.code {
            KeyCode::Esc if !self.input.value().is_empty() => {
                self.input = Input::default();
                SearchAction::Changed(String::new())
            }
            KeyCode::Esc => {
                self.active = false;
                SearchAction::Closed
            }
            KeyCode::Enter | KeyCode::Down | KeyCode::Up => {
                self.active = false;
                SearchAction::Confirmed
            }
            _ => {
                let before = self.input.value().to_string();
                self.input.handle_event(&Event::Key(key));
                if self.input.value() == before {
                    SearchAction::None
                } else {
                    SearchAction::Changed(self.input.value().to_string())
                }
            }
        }
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        let width = area.width.saturating_sub(4) as usize;
        let scroll = self.input.visual_scroll(width);
        let value = self.input.value();
        let display = if value.is_empty() && !self.active {
            Span::styled(format!("/ {}", self.placeholder), Style::default().fg(C_MUTED))
        } else {
            let visible: String = value.chars().skip(scroll).collect();
            Span::styled(format!("/ {}", visible), Style::default().fg(C_FILTER_FG))
        };

        let paragraph = Paragraph::new(Line::from(vec![display])).style(Style::default().bg(C_FILTER_BG));
        frame.render_widget(paragraph, area);

        if self.active && area.width > 0 {
            let cursor_x = area.x + 2 + (self.input.visual_cursor().saturating_sub(scroll)) as u16;
            frame.set_cursor_position((cursor_x.min(area.x + area.width - 1), area.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_reports_changes() {
        let mut input = SearchInput::new("search episodes");
        input.activate();
        assert_eq!(input.handle_key(key(KeyCode::Char('r'))), SearchAction::Changed("r".into()));
        assert_eq!(input.handle_key(key(KeyCode::Char('a'))), SearchAction::Changed("ra".into()));
        assert_eq!(input.handle_key(key(KeyCode::Backspace)), SearchAction::Changed("r".into()));
        assert_eq!(input.text(), "r");
    }

    #[test]
    fn test_esc_clears_then_closes() {
        let mut input = SearchInput::new("search episodes");
        input.activate();
        input.handle_key(key(KeyCode::Char('g')));

        assert_eq!(input.handle_key(key(KeyCode::Esc)), SearchAction::Changed(String::new()));
        assert!(input.is_active());
        assert_eq!(input.handle_key(key(KeyCode::Esc)), SearchAction::Closed);
        assert!(!input.is_active());
    }

    #[test]
    fn test_enter_keeps_text() {
        let mut input = SearchInput::new("search episodes");
        input.activate();
        input.handle_key(key(KeyCode::Char('x')));
        assert_eq!(input.handle_key(key(KeyCode::Enter)), SearchAction::Confirmed);
        assert_eq!(input.text(), "x");
        assert!(!input.is_active());
    }
}
