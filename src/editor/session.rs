use crate::util::{char_count, insert_char_at, remove_char_at};

/// Where the caret lands when an edit starts from the existing value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caret {
    Start,
    End,
}

/// What opened the edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTrigger {
    /// Double-click or explicit start-edit: keep the value, caret at the hint
    Explicit(Caret),
    /// A printable key on a selected cell: the key replaces the value
    Typed(char),
    /// Activation key (Enter) on a selected cell: keep the value, caret at end
    Activate,
}

/// A pending write produced by committing an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub row: usize,
    pub column: String,
    pub value: String,
}

/// The one cell being edited
/// Note: cursor is a CHARACTER index, not a byte index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEdit {
    pub row: usize,
    pub column: String,
    pub buffer: String,
    pub cursor: usize,
    original: String,
}

impl ActiveEdit {
    /// The buffer differs from the value the cell held when the edit started
    pub fn is_modified(&self) -> bool {
        self.buffer != self.original
    }
}

/// Cell edit state machine: `Idle` when `active` is `None`, `Editing` otherwise
#[derive(Debug, Default)]
pub struct EditSession {
    active: Option<ActiveEdit>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ActiveEdit> {
        self.active.as_ref()
    }

    /// Open an edit on (row, column). An edit already open elsewhere is committed, never
    /// dropped: its write is returned for the caller to apply.
    pub fn start(&mut self, row: usize, column: &str, current: &str, trigger: EditTrigger) -> Option<Commit> {
        let displaced = self.commit();

        let (buffer, cursor) = match trigger {
            EditTrigger::Typed(c) => (c.to_string(), 1),
            EditTrigger::Activate => (current.to_string(), char_count(current)),
            EditTrigger::Explicit(caret) => {
                let len = char_count(current);
                let cursor = match caret {
                    Caret::Start => 0,
                    Caret::End => len,
                };
                (current.to_string(), cursor)
            }
        };

        self.active = Some(ActiveEdit {
            row,
            column: column.to_string(),
            buffer,
            cursor,
            original: current.to_string(),
        });
        displaced
    }

    /// Leave `Editing`, handing back the buffer to write
    pub fn commit(&mut self) -> Option<Commit> {
        self.active.take().map(|edit| Commit {
            row: edit.row,
            column: edit.column,
            value: edit.buffer,
        })
    }

    /// Leave `Editing` discarding the buffer
    pub fn cancel(&mut self) -> bool {
        self.active.take().is_some()
    }

    pub fn insert_char(&mut self, c: char) {
        if let Some(edit) = self.active.as_mut() {
            insert_char_at(&mut edit.buffer, edit.cursor, c);
            edit.cursor += 1;
        }
    }

    /// Line-break modifier: literal newline, no commit
    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) {
        if let Some(edit) = self.active.as_mut() {
            if edit.cursor > 0 {
                edit.cursor -= 1;
                remove_char_at(&mut edit.buffer, edit.cursor);
            }
        }
    }

    pub fn delete_forward(&mut self) {
        if let Some(edit) = self.active.as_mut() {
            remove_char_at(&mut edit.buffer, edit.cursor);
        }
    }

    pub fn caret_left(&mut self) {
        if let Some(edit) = self.active.as_mut() {
            edit.cursor = edit.cursor.saturating_sub(1);
        }
    }

    pub fn caret_right(&mut self) {
        if let Some(edit) = self.active.as_mut() {
            edit.cursor = (edit.cursor + 1).min(char_count(&edit.buffer));
        }
    }

    pub fn caret_home(&mut self) {
        if let Some(edit) = self.active.as_mut() {
            edit.cursor = 0;
        }
    }

    pub fn caret_end(&mut self) {
        if let Some(edit) = self.active.as_mut() {
            edit.cursor = char_count(&edit.buffer);
        }
    }
}
