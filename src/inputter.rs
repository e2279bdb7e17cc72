use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line text editor for the search box.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize, // In chars, not bytes
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
    /// The text differs from before the key was read.
    pub changed: bool,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        let before = self.current_input.clone();
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.finished = true,
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.curser_pos = self.curser_pos.saturating_sub(1),
            (KeyCode::Right, _) => {
                self.curser_pos = std::cmp::min(self.curser_pos + 1, self.len());
            }
            (KeyCode::Home, _) => self.curser_pos = 0,
            (KeyCode::End, _) => self.curser_pos = self.len(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => self.clear_text(),
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => self.insert(chr),
            (kc, km) => trace!("Ignoring input key {kc:?} {km:?}"),
        }
        let mut result = self.get();
        result.changed = result.input != before;
        result
    }

    /// Starts a new edit with `s` as the initial text and the curser at its end.
    pub fn set(&mut self, s: &str) {
        self.clear();
        self.current_input = s.to_string();
        self.curser_pos = self.len();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            curser_pos: self.curser_pos,
            changed: false,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.clear_text();
    }

    fn clear_text(&mut self) {
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn escape(&mut self) {
        self.clear_text();
        self.canceled = true;
        self.finished = true;
    }

    fn insert(&mut self, chr: char) {
        let pos = self.bytepos(self.curser_pos);
        self.current_input.insert(pos, chr);
        self.curser_pos += 1;
    }

    fn backspace(&mut self) {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let pos = self.bytepos(self.curser_pos);
            self.current_input.remove(pos);
        }
    }

    fn delete(&mut self) {
        if self.curser_pos < self.len() {
            let pos = self.bytepos(self.curser_pos);
            self.current_input.remove(pos);
        }
    }

    fn bytepos(&self, char_pos: usize) -> usize {
        self.current_input
            .char_indices()
            .nth(char_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut Inputter, s: &str) -> InputResult {
        let mut last = input.get();
        for c in s.chars() {
            last = input.read(key(KeyCode::Char(c)));
        }
        last
    }

    #[test]
    fn typing_reports_every_change() {
        let mut input = Inputter::default();
        let r = type_str(&mut input, "smi");
        assert_eq!(r.input, "smi");
        assert!(r.changed);
        assert_eq!(r.curser_pos, 3);

        let r = input.read(key(KeyCode::Left));
        assert!(!r.changed);
        let r = input.read(key(KeyCode::Backspace));
        assert_eq!(r.input, "si");
        assert!(r.changed);
    }

    #[test]
    fn editing_handles_multibyte_chars() {
        let mut input = Inputter::default();
        input.set("Müller");
        input.read(key(KeyCode::Home));
        input.read(key(KeyCode::Right));
        input.read(key(KeyCode::Delete));
        let r = type_str(&mut input, "ue");
        assert_eq!(r.input, "Mueller");
        assert_eq!(r.curser_pos, 3);
    }

    #[test]
    fn enter_finishes_and_escape_cancels() {
        let mut input = Inputter::default();
        type_str(&mut input, "ab");
        let r = input.read(key(KeyCode::Enter));
        assert!(r.finished && !r.canceled);
        assert_eq!(r.input, "ab");

        input.set("ab");
        let r = input.read(key(KeyCode::Esc));
        assert!(r.finished && r.canceled);
        assert_eq!(r.input, "");
        assert!(r.changed);
    }
}
