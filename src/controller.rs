use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, ViewerConfig, ViewerError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &ViewerConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    /// Waits up to the poll time for a terminal event and maps it to a [`Message`].
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, ViewerError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(self.handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Home | KeyCode::Char('g'), _) => Some(Message::MoveBeginning),
            (KeyCode::End | KeyCode::Char('G'), _) => Some(Message::MoveEnd),
            (KeyCode::Tab | KeyCode::Char(']'), _) => Some(Message::NextFile),
            (KeyCode::BackTab | KeyCode::Char('['), _) => Some(Message::PreviousFile),
            (KeyCode::Char('f'), _) => Some(Message::FocusFilters),
            (KeyCode::Char(' '), _) => Some(Message::ToggleOption),
            (KeyCode::Char('c'), _) => Some(Message::ClearFilters),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('s'), _) => Some(Message::SortAscending),
            (KeyCode::Char('S'), _) => Some(Message::SortDescending),
            (KeyCode::Char('e'), _) => Some(Message::Export),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;
    use rstest::rstest;

    #[rstest]
    #[case(KeyCode::Char('q'), KeyModifiers::NONE, Some(Message::Quit))]
    #[case(KeyCode::Char('c'), KeyModifiers::CONTROL, Some(Message::Quit))]
    #[case(KeyCode::Char('c'), KeyModifiers::NONE, Some(Message::ClearFilters))]
    #[case(KeyCode::Tab, KeyModifiers::NONE, Some(Message::NextFile))]
    #[case(KeyCode::BackTab, KeyModifiers::SHIFT, Some(Message::PreviousFile))]
    #[case(KeyCode::Char('S'), KeyModifiers::SHIFT, Some(Message::SortDescending))]
    #[case(KeyCode::Char(' '), KeyModifiers::NONE, Some(Message::ToggleOption))]
    #[case(KeyCode::Char('x'), KeyModifiers::NONE, None)]
    fn maps_keys(#[case] code: KeyCode, #[case] modifiers: KeyModifiers, #[case] expected: Option<Message>) {
        let controller = Controller::new(&ViewerConfig::default());
        assert_eq!(controller.handle_key(KeyEvent::new(code, modifiers)), expected);
    }
}
