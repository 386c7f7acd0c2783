use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyEvent};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};

use crate::command::Command;
use crate::engine::{Engine, RowUpdate};
use crate::events::EngineEvent;
use crate::grid::ColumnAnchor;
use crate::input::{edit_key, is_escape, normal_key, Action, PromptHandler};
use crate::mode::Mode;
use crate::selection::{CellPos, SelectionRange};
use crate::ui;

/// How long quitting waits for outstanding saves
const QUIT_SAVE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct App {
    pub engine: Engine,
    pub message: Option<String>,
    pub should_quit: bool,
    prompting: bool,
    prompt: PromptHandler,
    events: Receiver<EngineEvent>,
    jobs: Sender<RowUpdate>,
}

impl App {
    pub fn new(mut engine: Engine) -> Self {
        let events = engine.subscribe();
        let jobs = engine.job_sender();
        let message = engine
            .pending_recovery()
            .map(|_| "Unsaved local copy found: :recover to restore, :discard to drop".to_string());
        Self {
            engine,
            message,
            should_quit: false,
            prompting: false,
            prompt: PromptHandler::new(),
            events,
            jobs,
        }
    }

    pub fn mode(&self) -> Mode {
        if self.prompting {
            Mode::Command
        } else if self.engine.session().is_editing() {
            Mode::Edit
        } else {
            Mode::Normal
        }
    }

    pub fn prompt_buffer(&self) -> &str {
        &self.prompt.buffer
    }

    pub fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        while !self.should_quit {
            self.engine.pump();
            self.drain_events();

            terminal.draw(|f| ui::render(f, self))?;

            if poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    /// Turn engine events into status messages
    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                EngineEvent::SaveFailed { message } => {
                    self.message = Some(format!("Save failed: {} (Ctrl+R to retry)", message));
                }
                EngineEvent::DocumentOpened { id } => {
                    self.message = Some(format!("Document {}", id));
                }
                EngineEvent::EditDropped { row, column, value } => {
                    self.message = Some(format!(
                        "Column {} was removed remotely; edit at row {} dropped: {}",
                        column,
                        row + 1,
                        value
                    ));
                }
                EngineEvent::RecoveryAvailable { .. } => {
                    self.message =
                        Some("Unsaved local copy found: :recover to restore, :discard to drop".to_string());
                }
                EngineEvent::RemoteApplied { .. } => {
                    self.message = Some("Updated from remote".to_string());
                }
                EngineEvent::GridChanged
                | EngineEvent::SaveStarted { .. }
                | EngineEvent::Saved { .. }
                | EngineEvent::RemoteRejected { .. } => {}
            }
        }
    }

    // === Key handling ===

    fn handle_key(&mut self, key: KeyEvent) {
        if self.prompting {
            self.handle_prompt_key(key);
            return;
        }

        let action = if self.engine.session().is_editing() {
            edit_key(key)
        } else {
            normal_key(key)
        };
        self.perform(action);
    }

    fn perform(&mut self, action: Action) {
        match action {
            Action::Move(dir) => self.engine.move_selection(dir),
            Action::Extend(dir) => self.engine.extend_selection(dir),
            Action::SelectAll => {
                let grid = self.engine.grid();
                let last = CellPos::new(grid.row_count().saturating_sub(1), grid.col_count().saturating_sub(1));
                self.engine.select_range(SelectionRange::new(CellPos::new(0, 0), last));
            }
            Action::Advance(advance) => self.engine.advance(advance),
            Action::StartEdit(trigger) => {
                self.message = None;
                self.engine.start_edit(trigger);
            }
            Action::Edit(input) => self.engine.edit_input(input),
            Action::CancelEdit => {
                self.engine.cancel_edit();
            }
            Action::Copy => self.message = Some(self.engine.copy()),
            Action::Cut => self.message = Some(self.engine.cut()),
            Action::Paste => match self.engine.paste() {
                Ok(Some(outcome)) if outcome.skipped > 0 => {
                    self.message = Some(format!(
                        "Pasted {} cells, {} outside the grid skipped",
                        outcome.written, outcome.skipped
                    ));
                }
                Ok(Some(outcome)) => self.message = Some(format!("Pasted {} cells", outcome.written)),
                Ok(None) => self.message = Some("Clipboard is empty".to_string()),
                Err(e) => self.message = Some(format!("Paste failed: {}", e)),
            },
            Action::Clear => {
                if let Err(e) = self.engine.clear_selection() {
                    self.message = Some(format!("Clear failed: {}", e));
                }
            }
            Action::CancelCut => {
                if self.engine.cancel_cut() {
                    self.message = Some("Cut cancelled".to_string());
                }
            }
            Action::Prompt => {
                self.engine.commit_edit();
                self.prompting = true;
                self.prompt.start();
            }
            Action::Save => self.engine.flush(),
            Action::Retry => {
                if !self.engine.retry_save() {
                    self.message = Some("Nothing to save".to_string());
                }
            }
            Action::Quit => self.quit(),
            Action::None => {}
        }
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        if is_escape(key) {
            self.prompting = false;
            self.prompt.start();
            return;
        }

        if let Some(line) = self.prompt.handle_key(key) {
            self.prompting = false;
            match Command::parse(&line) {
                Some(cmd) => self.execute_command(cmd),
                None => self.message = Some(format!("Invalid command: {}", line.trim())),
            }
        }
    }

    /// Save outstanding work, then leave
    fn quit(&mut self) {
        self.engine.flush();
        if !self.engine.wait_for_saves(QUIT_SAVE_TIMEOUT) {
            warn!("quit while saves were still in flight");
        }
        info!("quitting");
        self.should_quit = true;
    }

    fn current_column(&self) -> Option<String> {
        let col = self.engine.selection().cursor().col;
        self.engine.grid().column_at(col).map(str::to_string)
    }

    fn execute_command(&mut self, cmd: Command) {
        let cursor = self.engine.selection().cursor();
        let result = match cmd {
            Command::Write => {
                self.engine.flush();
                Ok(())
            }
            Command::Quit | Command::WriteQuit => {
                self.quit();
                Ok(())
            }
            Command::ForceQuit => {
                self.should_quit = true;
                Ok(())
            }
            Command::InsertColumn { name, before } => match self.current_column() {
                Some(current) => {
                    let anchor = if before {
                        ColumnAnchor::Before(&current)
                    } else {
                        ColumnAnchor::After(&current)
                    };
                    self.engine.insert_column(anchor, &name).map(|idx| {
                        self.engine.select_cell(CellPos::new(cursor.row, idx));
                    })
                }
                None => self.engine.insert_column(ColumnAnchor::End, &name).map(|_| ()),
            },
            Command::DeleteColumn => match self.current_column() {
                Some(current) => self.engine.remove_column(&current),
                None => Ok(()),
            },
            Command::RenameColumn(new) => match self.current_column() {
                Some(current) => self.engine.rename_column(&current, &new),
                None => Ok(()),
            },
            Command::MoveColumn(to) => self.engine.move_column(cursor.col, to).map(|()| {
                self.engine.select_cell(CellPos::new(cursor.row, to));
            }),
            Command::Note(text) => match self.current_column() {
                Some(current) => self.engine.set_instruction(&current, &text),
                None => Ok(()),
            },
            Command::InsertRows(count) => self.engine.insert_rows(count, Some(cursor.row + 1)).map(|_| ()),
            Command::DeleteRow => self.engine.remove_row(cursor.row),
            Command::MoveRow(to) => self.engine.move_row(cursor.row, to).map(|()| {
                self.engine.select_cell(CellPos::new(to, cursor.col));
            }),
            Command::NavigateRow(row) => {
                self.engine.select_cell(CellPos::new(row, cursor.col));
                Ok(())
            }
            Command::Fill(fields) => {
                let update = RowUpdate { row: cursor.row, fields };
                if self.jobs.send(update).is_err() {
                    warn!("row update channel closed");
                }
                Ok(())
            }
            Command::Rename(name) => {
                self.engine.rename_document(&name);
                Ok(())
            }
            Command::Open(id) => {
                if let Err(e) = self.engine.open(&id) {
                    self.message = Some(format!("Could not open {}: {}", id, e));
                }
                Ok(())
            }
            Command::New(name) => {
                self.engine.new_document(&name);
                Ok(())
            }
            Command::Retry => {
                self.perform(Action::Retry);
                Ok(())
            }
            Command::Recover => {
                if !self.engine.restore_recovery() {
                    self.message = Some("No local copy to recover".to_string());
                }
                Ok(())
            }
            Command::Discard => {
                if self.engine.dismiss_recovery() {
                    self.message = Some("Local copy discarded".to_string());
                }
                Ok(())
            }
            Command::Unknown(name) => {
                self.message = Some(format!("Unknown command: {}", name));
                Ok(())
            }
        };

        if let Err(e) = result {
            self.message = Some(e.to_string());
        }
    }
}
