use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::editor::{Advance, Caret, EditTrigger};
use crate::engine::EditInput;
use crate::selection::Direction;

/// What a key means to the app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move(Direction),
    Extend(Direction),
    SelectAll,
    /// Commit any edit, then move
    Advance(Advance),
    StartEdit(EditTrigger),
    Edit(EditInput),
    CancelEdit,
    Copy,
    Cut,
    Paste,
    Clear,
    /// Esc in normal mode: drop a pending cut
    CancelCut,
    Prompt,
    Save,
    Retry,
    Quit,
    None,
}

/// Check for escape key (Esc or Ctrl+[)
pub fn is_escape(key: KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('[') && key.modifiers.contains(KeyModifiers::CONTROL))
}

fn arrow(code: KeyCode) -> Option<Direction> {
    match code {
        KeyCode::Up => Some(Direction::Up),
        KeyCode::Down => Some(Direction::Down),
        KeyCode::Left => Some(Direction::Left),
        KeyCode::Right => Some(Direction::Right),
        _ => None,
    }
}

fn control_action(c: char) -> Action {
    match c {
        'a' => Action::SelectAll,
        'c' => Action::Copy,
        'x' => Action::Cut,
        'v' => Action::Paste,
        's' => Action::Save,
        'r' => Action::Retry,
        'p' => Action::Prompt,
        'q' => Action::Quit,
        _ => Action::None,
    }
}

/// Keys while a cell is selected and nothing is being edited
pub fn normal_key(key: KeyEvent) -> Action {
    if is_escape(key) {
        return Action::CancelCut;
    }
    if let Some(dir) = arrow(key.code) {
        return if key.modifiers.contains(KeyModifiers::SHIFT) {
            Action::Extend(dir)
        } else {
            Action::Move(dir)
        };
    }

    match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => control_action(c),
        KeyCode::Char(c) => Action::StartEdit(EditTrigger::Typed(c)),
        KeyCode::Enter => Action::StartEdit(EditTrigger::Activate),
        KeyCode::F(2) => Action::StartEdit(EditTrigger::Explicit(Caret::End)),
        KeyCode::Home => Action::StartEdit(EditTrigger::Explicit(Caret::Start)),
        KeyCode::Tab => Action::Advance(Advance::Tab),
        KeyCode::BackTab => Action::Advance(Advance::BackTab),
        KeyCode::Delete | KeyCode::Backspace => Action::Clear,
        _ => Action::None,
    }
}

/// Keys while a cell edit is open
pub fn edit_key(key: KeyEvent) -> Action {
    if is_escape(key) {
        return Action::CancelEdit;
    }

    match key.code {
        // Alt+Enter inserts a line break; plain Enter commits
        KeyCode::Enter if key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) => {
            Action::Edit(EditInput::Newline)
        }
        KeyCode::Enter => Action::Advance(Advance::Enter),
        KeyCode::Tab => Action::Advance(Advance::Tab),
        KeyCode::BackTab => Action::Advance(Advance::BackTab),
        KeyCode::Up => Action::Advance(Advance::Arrow(Direction::Up)),
        KeyCode::Down => Action::Advance(Advance::Arrow(Direction::Down)),
        KeyCode::Left => Action::Edit(EditInput::Left),
        KeyCode::Right => Action::Edit(EditInput::Right),
        KeyCode::Home => Action::Edit(EditInput::Home),
        KeyCode::End => Action::Edit(EditInput::End),
        KeyCode::Backspace => Action::Edit(EditInput::Backspace),
        KeyCode::Delete => Action::Edit(EditInput::Delete),
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => match c {
            's' | 'q' => control_action(c),
            _ => Action::None,
        },
        KeyCode::Char(c) => Action::Edit(EditInput::Char(c)),
        _ => Action::None,
    }
}

/// Line editor for the command prompt
#[derive(Debug, Default)]
pub struct PromptHandler {
    pub buffer: String,
}

impl PromptHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.buffer.clear();
    }

    /// Returns the finished command line on Enter
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<String> {
        match key.code {
            KeyCode::Enter => Some(std::mem::take(&mut self.buffer)),
            KeyCode::Backspace => {
                self.buffer.pop();
                None
            }
            KeyCode::Char(c) => {
                self.buffer.push(c);
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn with(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_typing_starts_replacing_edit() {
        assert_eq!(
            normal_key(key(KeyCode::Char('x'))),
            Action::StartEdit(EditTrigger::Typed('x'))
        );
        assert_eq!(
            normal_key(key(KeyCode::Enter)),
            Action::StartEdit(EditTrigger::Activate)
        );
    }

    #[test]
    fn test_explicit_edit_keys_place_caret() {
        assert_eq!(
            normal_key(key(KeyCode::F(2))),
            Action::StartEdit(EditTrigger::Explicit(Caret::End))
        );
        assert_eq!(
            normal_key(key(KeyCode::Home)),
            Action::StartEdit(EditTrigger::Explicit(Caret::Start))
        );
    }

    #[test]
    fn test_shift_arrow_extends() {
        assert_eq!(normal_key(key(KeyCode::Down)), Action::Move(Direction::Down));
        assert_eq!(
            normal_key(with(KeyCode::Down, KeyModifiers::SHIFT)),
            Action::Extend(Direction::Down)
        );
    }

    #[test]
    fn test_clipboard_shortcuts() {
        assert_eq!(normal_key(with(KeyCode::Char('c'), KeyModifiers::CONTROL)), Action::Copy);
        assert_eq!(normal_key(with(KeyCode::Char('x'), KeyModifiers::CONTROL)), Action::Cut);
        assert_eq!(normal_key(with(KeyCode::Char('v'), KeyModifiers::CONTROL)), Action::Paste);
        assert_eq!(normal_key(key(KeyCode::Esc)), Action::CancelCut);
        assert_eq!(normal_key(with(KeyCode::Char('a'), KeyModifiers::CONTROL)), Action::SelectAll);
    }

    #[test]
    fn test_edit_enter_commits_alt_enter_breaks_line() {
        assert_eq!(edit_key(key(KeyCode::Enter)), Action::Advance(Advance::Enter));
        assert_eq!(
            edit_key(with(KeyCode::Enter, KeyModifiers::ALT)),
            Action::Edit(EditInput::Newline)
        );
    }

    #[test]
    fn test_edit_keys() {
        assert_eq!(edit_key(key(KeyCode::Esc)), Action::CancelEdit);
        assert_eq!(edit_key(key(KeyCode::Tab)), Action::Advance(Advance::Tab));
        assert_eq!(edit_key(key(KeyCode::Left)), Action::Edit(EditInput::Left));
        assert_eq!(
            edit_key(key(KeyCode::Down)),
            Action::Advance(Advance::Arrow(Direction::Down))
        );
        assert_eq!(edit_key(key(KeyCode::Char('a'))), Action::Edit(EditInput::Char('a')));
        assert_eq!(edit_key(with(KeyCode::Char('c'), KeyModifiers::CONTROL)), Action::None);
    }

    #[test]
    fn test_prompt_handler() {
        let mut prompt = PromptHandler::new();
        prompt.start();
        for c in "icx".chars() {
            assert_eq!(prompt.handle_key(key(KeyCode::Char(c))), None);
        }
        prompt.handle_key(key(KeyCode::Backspace));
        assert_eq!(prompt.handle_key(key(KeyCode::Enter)), Some("ic".to_string()));
        assert!(prompt.buffer.is_empty());
    }
}
