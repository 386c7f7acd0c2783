//! The grid editing engine. Owns the one authoritative grid and everything that touches it.
//!
//! All mutation happens on the thread that owns the `Engine`. Saves run on short-lived worker
//! threads; their results, remote snapshots from the feed and background row updates all come
//! back over channels and are applied in `pump`.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clipboard::{clear_range, Clipboard, ClipboardPayload, PasteOutcome, SystemClipboard};
use crate::clock::{Clock, Millis};
use crate::config::Config;
use crate::editor::{next_cell, Advance, Commit, EditSession, EditTrigger};
use crate::error::{GatewayError, GridError};
use crate::events::{EngineEvent, EventBus};
use crate::gateway::recovery::UNSAVED_KEY;
use crate::gateway::{
    PersistenceGateway, RealtimeFeed, RecoveryHint, RecoveryStore, SaveReceipt, Subscription,
};
use crate::grid::{ColumnAnchor, Fingerprint, GridModel, Snapshot};
use crate::selection::{CellPos, Direction, Selection, SelectionRange};
use crate::sync::{PendingEdits, Reconciler, SaveMode, SaveScheduler, SaveStatus, Verdict};


/// Name given to a document that has not been named
pub const UNTITLED: &str = "Untitled";

/// How long leaving a document waits for its creation save to hand back an id
const LEAVE_SAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the engine talks to outside itself
pub struct Collaborators {
    pub gateway: Arc<dyn PersistenceGateway>,
    pub feed: Option<Arc<dyn RealtimeFeed>>,
    pub clock: Arc<dyn Clock>,
    pub clipboard: Box<dyn SystemClipboard>,
    pub recovery: Option<RecoveryStore>,
}

/// Keystrokes that change the edit buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditInput {
    Char(char),
    Newline,
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
}

/// Field values a background job produced for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowUpdate {
    pub row: usize,
    pub fields: Vec<(String, String)>,
}

struct SaveOutcome {
    generation: u64,
    seq: u64,
    revision: u64,
    silent: bool,
    result: Result<SaveReceipt, GatewayError>,
}

struct RemoteCandidate {
    doc_id: String,
    snapshot: Snapshot,
    server_timestamp: Millis,
}

pub struct Engine {
    config: Config,
    grid: GridModel,
    doc_id: Option<String>,
    /// Bumped whenever a different document is loaded; outcomes from older ones are ignored
    generation: u64,
    selection: Selection,
    clipboard: Clipboard,
    session: EditSession,
    reconciler: Reconciler,
    scheduler: SaveScheduler,
    /// Local cell values no successful save has covered yet
    pending: PendingEdits,

    gateway: Arc<dyn PersistenceGateway>,
    feed: Option<Arc<dyn RealtimeFeed>>,
    subscription: Option<Subscription>,
    clock: Arc<dyn Clock>,
    recovery: Option<RecoveryStore>,
    pending_recovery: Option<RecoveryHint>,

    saves_tx: Sender<SaveOutcome>,
    saves_rx: Receiver<SaveOutcome>,
    saves_in_flight: usize,
    /// The first save of a new document is out and its id is not known yet
    creating: bool,
    /// Save requested while `creating`. Holds whether that save was silent.
    deferred_save: Option<bool>,

    remote_tx: Sender<RemoteCandidate>,
    remote_rx: Receiver<RemoteCandidate>,
    jobs_tx: Sender<RowUpdate>,
    jobs_rx: Receiver<RowUpdate>,

    events: EventBus,
}

impl Engine {
    /// Start on a fresh, unsaved document. Nothing is written until the first change.
    pub fn new(config: Config, parts: Collaborators) -> Self {
        let (saves_tx, saves_rx) = channel();
        let (remote_tx, remote_rx) = channel();
        let (jobs_tx, jobs_rx) = channel();

        let grid = GridModel::new(UNTITLED, config.grid.default_columns.clone(), config.grid.min_rows);
        let mut engine = Self {
            grid,
            doc_id: None,
            generation: 0,
            selection: Selection::new(),
            clipboard: Clipboard::new(parts.clipboard),
            session: EditSession::new(),
            reconciler: Reconciler::new(config.sync.clone()),
            scheduler: SaveScheduler::new(config.sync.debounce_ms),
            pending: PendingEdits::new(),
            gateway: parts.gateway,
            feed: parts.feed,
            subscription: None,
            clock: parts.clock,
            recovery: parts.recovery,
            pending_recovery: None,
            saves_tx,
            saves_rx,
            saves_in_flight: 0,
            creating: false,
            deferred_save: None,
            remote_tx,
            remote_rx,
            jobs_tx,
            jobs_rx,
            events: EventBus::new(),
            config,
        };
        let fingerprint = engine.grid.to_snapshot(None).fingerprint();
        engine.check_recovery(UNSAVED_KEY, fingerprint);
        engine
    }

    // === Accessors ===

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn doc_id(&self) -> Option<&str> {
        self.doc_id.as_deref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn clipboard_payload(&self) -> Option<&ClipboardPayload> {
        self.clipboard.payload()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.scheduler.status()
    }

    #[cfg(test)]
    pub fn sync_state(&self) -> &crate::sync::reconciler::SyncState {
        self.reconciler.state()
    }

    pub fn pending_recovery(&self) -> Option<&RecoveryHint> {
        self.pending_recovery.as_ref()
    }

    #[cfg(test)]
    pub fn saves_in_flight(&self) -> usize {
        self.saves_in_flight
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Handle for background jobs. Updates are applied on the next `pump`.
    pub fn job_sender(&self) -> Sender<RowUpdate> {
        self.jobs_tx.clone()
    }

    // === Documents ===

    /// Replace the open document with a new, named one and create it in the store right away
    pub fn new_document(&mut self, name: &str) {
        self.leave_document();
        let grid = GridModel::new(name, self.config.grid.default_columns.clone(), self.config.grid.min_rows);
        self.grid = grid;
        self.doc_id = None;
        info!(name, "new document");
        self.mutated(SaveMode::Immediate);
    }

    /// Load a stored document. On failure the current document stays open.
    pub fn open(&mut self, id: &str) -> Result<(), GatewayError> {
        let stored = self.gateway.load(id)?;
        self.leave_document();

        let stored_fingerprint = stored.snapshot.fingerprint();
        self.grid = GridModel::from_snapshot(stored.snapshot, self.config.grid.min_rows);
        self.doc_id = Some(id.to_string());
        self.reconciler.seed_loaded(stored.server_timestamp, stored_fingerprint);
        self.subscribe_feed();

        let fingerprint = self.grid.to_snapshot(None).fingerprint();
        self.check_recovery(id, fingerprint);

        info!(id, rows = self.grid.row_count(), columns = self.grid.col_count(), "document opened");
        self.events.emit(EngineEvent::DocumentOpened { id: id.to_string() });
        self.events.emit(EngineEvent::GridChanged);
        Ok(())
    }

    /// Flush the current document and reset every per-document state.
    /// A document still waiting for its id gets it first, so the flush lands in that document.
    fn leave_document(&mut self) {
        self.commit_edit();
        if self.creating && !self.wait_for_creation(LEAVE_SAVE_TIMEOUT) {
            warn!("document creation still in flight while leaving it");
        }
        self.flush();
        if self.creating && self.scheduler.is_dirty() {
            // The deferred save has nowhere to go; keep a local copy instead
            warn!("unsaved new document left behind, writing recovery hint");
            self.write_recovery(self.clock.now_ms());
        }

        self.generation += 1;
        self.subscription = None;
        self.creating = false;
        self.deferred_save = None;
        self.pending_recovery = None;
        self.pending.clear();
        self.reconciler.reset();
        self.scheduler.reset();
        self.session.cancel();
        self.clipboard.cancel_cut();
        self.selection = Selection::new();
        // Drop candidates queued for the old document
        while self.remote_rx.try_recv().is_ok() {}
    }

    /// Block until the creation save has completed or `timeout` passes
    fn wait_for_creation(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.creating {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.saves_rx.recv_timeout(remaining) {
                Ok(outcome) => self.finish_save(outcome),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    fn subscribe_feed(&mut self) {
        self.subscription = None;
        let (Some(feed), Some(id)) = (self.feed.as_ref(), self.doc_id.clone()) else {
            return;
        };

        let tx = self.remote_tx.clone();
        let doc_id = id.clone();
        let subscription = feed.subscribe(
            &id,
            Box::new(move |snapshot, server_timestamp| {
                let _ = tx.send(RemoteCandidate {
                    doc_id: doc_id.clone(),
                    snapshot,
                    server_timestamp,
                });
            }),
        );
        debug!(id = %id, "subscribed to remote changes");
        self.subscription = Some(subscription);
    }

    pub fn rename_document(&mut self, name: &str) {
        if self.grid.name() == name {
            return;
        }
        self.grid.set_name(name);
        self.mutated(SaveMode::Debounced);
    }

    // === Recovery ===

    fn recovery_key(&self) -> &str {
        self.doc_id.as_deref().unwrap_or(UNSAVED_KEY)
    }

    /// Offer a local backup if one exists that differs from what is open
    fn check_recovery(&mut self, key: &str, current: Fingerprint) {
        let Some(recovery) = &self.recovery else {
            return;
        };
        match recovery.read(key) {
            Ok(Some(hint)) if hint.snapshot.fingerprint() != current => {
                info!(key, saved_at = hint.saved_at, "recovery hint available");
                self.events.emit(EngineEvent::RecoveryAvailable { saved_at: hint.saved_at });
                self.pending_recovery = Some(hint);
            }
            Ok(Some(_)) => self.clear_recovery(key),
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "could not read recovery hint"),
        }
    }

    fn write_recovery(&self, now: Millis) {
        let Some(recovery) = &self.recovery else {
            return;
        };
        let hint = RecoveryHint {
            saved_at: now,
            snapshot: self.grid.to_snapshot(self.doc_id.as_deref()),
        };
        if let Err(e) = recovery.write(self.recovery_key(), &hint) {
            warn!(error = %e, "could not write recovery hint");
        }
    }

    fn clear_recovery(&self, key: &str) {
        if let Some(recovery) = &self.recovery {
            if let Err(e) = recovery.clear(key) {
                warn!(key, error = %e, "could not clear recovery hint");
            }
        }
    }

    /// Replace the grid with the pending recovery hint and save it
    pub fn restore_recovery(&mut self) -> bool {
        let Some(hint) = self.pending_recovery.take() else {
            return false;
        };
        self.session.cancel();
        self.grid.replace_with(hint.snapshot);
        self.pending.clear();
        self.clamp_selection();
        info!(saved_at = hint.saved_at, "restored recovery hint");
        self.mutated(SaveMode::Immediate);
        true
    }

    /// Forget the pending recovery hint and delete it
    pub fn dismiss_recovery(&mut self) -> bool {
        if self.pending_recovery.take().is_none() {
            return false;
        }
        self.clear_recovery(self.recovery_key());
        true
    }

    // === Saving ===

    fn mutated(&mut self, mode: SaveMode) {
        self.events.emit(EngineEvent::GridChanged);
        let now = self.clock.now_ms();
        let save_now = self.scheduler.mark_dirty(mode, now);

        let revision = self.scheduler.revision();
        for (row, column) in self.grid.take_touched() {
            let value = self.grid.cell(row, &column).unwrap_or("").to_string();
            self.pending.record(row, column, value, revision);
        }

        if save_now {
            self.dispatch_save(true);
        }
    }

    /// Send the current grid to the store on a worker thread.
    /// Silent saves are the immediate structural ones; they also open the suppression window
    /// before the round-trip.
    fn dispatch_save(&mut self, silent: bool) {
        if self.creating {
            // A second create would make a second document; wait for the id
            self.deferred_save = Some(self.deferred_save.map_or(silent, |s| s && silent));
            return;
        }
        self.creating = self.doc_id.is_none();

        let snapshot = self.grid.to_snapshot(self.doc_id.as_deref());
        let now = self.clock.now_ms();
        let seq = self.reconciler.begin_save(snapshot.fingerprint(), silent, now);
        let revision = self.scheduler.begin_save(silent);
        self.saves_in_flight += 1;
        self.events.emit(EngineEvent::SaveStarted { silent });
        debug!(seq, revision, silent, "save dispatched");

        let gateway = Arc::clone(&self.gateway);
        let tx = self.saves_tx.clone();
        let generation = self.generation;
        thread::spawn(move || {
            let result = gateway.save(&snapshot, silent);
            let _ = tx.send(SaveOutcome { generation, seq, revision, silent, result });
        });
    }

    fn finish_save(&mut self, outcome: SaveOutcome) {
        self.saves_in_flight = self.saves_in_flight.saturating_sub(1);
        if outcome.generation != self.generation {
            debug!(seq = outcome.seq, "save completed for a document no longer open");
            return;
        }

        self.creating = false;
        let now = self.clock.now_ms();
        match outcome.result {
            Ok(receipt) => {
                self.reconciler.complete_save(outcome.seq, receipt.server_timestamp, now);
                self.scheduler.finish_save(outcome.revision, outcome.silent, Ok(()));
                self.pending.acknowledge(outcome.revision);
                if self.doc_id.is_none() {
                    info!(id = %receipt.id, "document created");
                    self.doc_id = Some(receipt.id.clone());
                    self.subscribe_feed();
                    self.clear_recovery(UNSAVED_KEY);
                    self.events.emit(EngineEvent::DocumentOpened { id: receipt.id.clone() });
                }
                self.clear_recovery(&receipt.id);
                debug!(id = %receipt.id, server_timestamp = receipt.server_timestamp, "save succeeded");
                self.events.emit(EngineEvent::Saved {
                    id: receipt.id,
                    server_timestamp: receipt.server_timestamp,
                });
            }
            Err(e) => {
                warn!(seq = outcome.seq, error = %e, "save failed");
                self.reconciler.fail_save(outcome.seq);
                let message = e.to_string();
                self.scheduler.finish_save(outcome.revision, outcome.silent, Err(message.clone()));
                self.write_recovery(now);
                self.events.emit(EngineEvent::SaveFailed { message });
            }
        }

        if let Some(silent) = self.deferred_save.take() {
            self.dispatch_save(silent);
        }
    }

    /// Re-send the current grid after a failed save. Returns false when there is nothing to save.
    pub fn retry_save(&mut self) -> bool {
        if !self.scheduler.is_dirty() {
            return false;
        }
        info!("retrying save");
        self.dispatch_save(false);
        true
    }

    /// Commit any open edit and save now if anything is unsaved
    pub fn flush(&mut self) {
        self.commit_edit();
        if self.scheduler.is_dirty() && (self.scheduler.deadline().is_some() || self.saves_in_flight == 0) {
            self.dispatch_save(false);
        }
    }

    /// Block until every save in flight has completed or `timeout` passes.
    /// Returns true if nothing is left in flight.
    pub fn wait_for_saves(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.saves_in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.saves_rx.recv_timeout(remaining) {
                Ok(outcome) => self.finish_save(outcome),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    /// Apply everything that arrived from other threads and fire a due debounced save.
    /// Returns true if anything happened that the host may want to re-render.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;

        while let Ok(outcome) = self.saves_rx.try_recv() {
            self.finish_save(outcome);
            changed = true;
        }
        while let Ok(candidate) = self.remote_rx.try_recv() {
            changed |= self.consider_remote(candidate);
        }
        while let Ok(update) = self.jobs_rx.try_recv() {
            match self.populate_row(update.row, update.fields) {
                Ok(written) => changed |= written > 0,
                Err(e) => warn!(row = update.row, error = %e, "background row update dropped"),
            }
        }
        if self.scheduler.take_due(self.clock.now_ms()) {
            self.dispatch_save(false);
            changed = true;
        }
        changed
    }

    // === Remote changes ===

    fn consider_remote(&mut self, candidate: RemoteCandidate) -> bool {
        if self.doc_id.as_deref() != Some(candidate.doc_id.as_str()) {
            debug!(id = %candidate.doc_id, "remote snapshot for another document ignored");
            return false;
        }
        if candidate.snapshot.columns.is_empty() {
            warn!(server_timestamp = candidate.server_timestamp, "remote snapshot without columns ignored");
            return false;
        }

        let now = self.clock.now_ms();
        let verdict = self.reconciler.evaluate(
            &candidate.snapshot,
            candidate.server_timestamp,
            self.grid.filled_cell_count(),
            now,
        );
        match verdict {
            Verdict::Reject(reason) => {
                self.events.emit(EngineEvent::RemoteRejected { reason });
                false
            }
            Verdict::Apply => {
                let fingerprint = candidate.snapshot.fingerprint();
                // The edit session is left alone; it commits against the new grid
                self.grid.replace_with(candidate.snapshot);
                self.reconciler.record_applied(candidate.server_timestamp, fingerprint);
                info!(server_timestamp = candidate.server_timestamp, "applied remote snapshot");
                self.events.emit(EngineEvent::RemoteApplied {
                    server_timestamp: candidate.server_timestamp,
                });

                // Unsaved local values go back on top and are saved again
                let (restored, dropped) = self.pending.reapply(&mut self.grid);
                for cell in dropped {
                    warn!(row = cell.row, column = %cell.column, "unsaved value lost with its column");
                    self.events.emit(EngineEvent::EditDropped {
                        row: cell.row,
                        column: cell.column,
                        value: cell.value,
                    });
                }
                self.clamp_selection();
                if restored > 0 {
                    info!(restored, "kept unsaved local values over remote snapshot");
                    self.mutated(SaveMode::Debounced);
                } else {
                    self.events.emit(EngineEvent::GridChanged);
                }
                true
            }
        }
    }

    // === Selection ===

    fn clamp_selection(&mut self) {
        self.selection.clamp(self.grid.row_count(), self.grid.col_count());
    }

    /// Select one cell. Leaving a cell commits its edit.
    pub fn select_cell(&mut self, pos: CellPos) {
        self.commit_edit();
        self.selection.select_cell(pos);
        self.clamp_selection();
    }

    pub fn move_selection(&mut self, dir: Direction) {
        let pos = dir.step(self.selection.cursor(), self.grid.row_count(), self.grid.col_count());
        self.select_cell(pos);
    }

    pub fn extend_selection(&mut self, dir: Direction) {
        self.commit_edit();
        self.selection.extend(dir, self.grid.row_count(), self.grid.col_count());
    }

    pub fn select_range(&mut self, range: SelectionRange) {
        self.commit_edit();
        self.selection.set_range(range);
        self.clamp_selection();
    }

    // === Editing ===

    /// Open an edit on the selected cell
    pub fn start_edit(&mut self, trigger: EditTrigger) {
        let cursor = self.selection.cursor();
        let Some(column) = self.grid.column_at(cursor.col).map(str::to_string) else {
            return;
        };
        let current = self.grid.cell(cursor.row, &column).unwrap_or("").to_string();
        if let Some(displaced) = self.session.start(cursor.row, &column, &current, trigger) {
            self.write_commit(displaced);
        }
    }

    pub fn edit_input(&mut self, input: EditInput) {
        match input {
            EditInput::Char(c) => self.session.insert_char(c),
            EditInput::Newline => self.session.insert_newline(),
            EditInput::Backspace => self.session.backspace(),
            EditInput::Delete => self.session.delete_forward(),
            EditInput::Left => self.session.caret_left(),
            EditInput::Right => self.session.caret_right(),
            EditInput::Home => self.session.caret_home(),
            EditInput::End => self.session.caret_end(),
        }
    }

    /// Write the edit buffer to its cell. Returns false if nothing was being edited.
    pub fn commit_edit(&mut self) -> bool {
        match self.session.commit() {
            Some(commit) => {
                self.write_commit(commit);
                true
            }
            None => false,
        }
    }

    pub fn cancel_edit(&mut self) -> bool {
        self.session.cancel()
    }

    /// Commit, then move the selection the way Enter, Tab or an arrow key does.
    /// Enter on the last row appends a row.
    pub fn advance(&mut self, advance: Advance) {
        self.commit_edit();
        let target = next_cell(
            self.selection.cursor(),
            advance,
            self.grid.row_count(),
            self.grid.col_count(),
        );
        if target.append_row {
            if let Err(e) = self.insert_rows(1, None) {
                warn!(error = %e, "could not append row");
                return;
            }
        }
        self.selection.select_cell(target.pos);
        self.clamp_selection();
    }

    /// The buffer always reaches the grid, even if a remote snapshot replaced the grid while
    /// editing. Only a vanished column drops it.
    fn write_commit(&mut self, commit: Commit) {
        if !self.grid.has_column(&commit.column) {
            warn!(row = commit.row, column = %commit.column, "edited column no longer exists, edit dropped");
            self.events.emit(EngineEvent::EditDropped {
                row: commit.row,
                column: commit.column,
                value: commit.value,
            });
            return;
        }
        if commit.row >= self.grid.row_count() {
            self.grid.ensure_minimum_rows(commit.row + 1);
        }
        if self.grid.cell(commit.row, &commit.column) == Some(commit.value.as_str()) {
            return;
        }
        match self.grid.set_cell(commit.row, &commit.column, commit.value) {
            Ok(()) => self.mutated(SaveMode::Debounced),
            Err(e) => warn!(error = %e, "commit failed"),
        }
    }

    // === Cells ===

    #[cfg(test)]
    pub fn set_cell(&mut self, row: usize, column: &str, value: &str) -> Result<(), GridError> {
        if self.grid.cell(row, column) == Some(value) {
            return Ok(());
        }
        self.grid.set_cell(row, column, value.to_string())?;
        self.mutated(SaveMode::Debounced);
        Ok(())
    }

    pub fn copy(&mut self) -> String {
        self.commit_edit();
        self.clipboard.copy(&self.grid, self.selection.active_range())
    }

    pub fn cut(&mut self) -> String {
        self.commit_edit();
        self.clipboard.cut(&self.grid, self.selection.active_range())
    }

    pub fn cancel_cut(&mut self) -> bool {
        self.clipboard.cancel_cut()
    }

    /// Paste at the top-left of the selection
    pub fn paste(&mut self) -> Result<Option<PasteOutcome>, GridError> {
        self.commit_edit();
        let (r0, _, c0, _) = self.selection.active_range().bounds();
        let outcome = self.clipboard.paste(&mut self.grid, CellPos::new(r0, c0))?;
        if let Some(o) = &outcome {
            if o.written > 0 || o.cleared_source > 0 {
                self.mutated(SaveMode::Debounced);
            }
        }
        Ok(outcome)
    }

    /// Empty every selected cell
    pub fn clear_selection(&mut self) -> Result<usize, GridError> {
        self.commit_edit();
        let cleared = clear_range(&mut self.grid, self.selection.active_range())?;
        if cleared > 0 {
            self.mutated(SaveMode::Debounced);
        }
        Ok(cleared)
    }

    /// Write fields produced by a background job. Unknown columns are skipped.
    /// Returns how many cells were written.
    pub fn populate_row<I>(&mut self, row: usize, fields: I) -> Result<usize, GridError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if row >= self.grid.row_count() {
            return Err(GridError::OutOfRange { row, column: String::new() });
        }

        let mut written = 0;
        for (column, value) in fields {
            if !self.grid.has_column(&column) {
                warn!(row, column = %column, "populate skipped unknown column");
                continue;
            }
            self.grid.set_cell(row, &column, value)?;
            written += 1;
        }
        if written > 0 {
            debug!(row, written, "row populated");
            self.mutated(SaveMode::Immediate);
        }
        Ok(written)
    }

    // === Structure ===

    pub fn insert_column(&mut self, anchor: ColumnAnchor<'_>, name: &str) -> Result<usize, GridError> {
        self.commit_edit();
        let idx = self.grid.insert_column(anchor, name)?;
        info!(name, idx, "column inserted");
        self.mutated(SaveMode::Immediate);
        Ok(idx)
    }

    pub fn remove_column(&mut self, name: &str) -> Result<(), GridError> {
        self.commit_edit();
        self.grid.remove_column(name)?;
        self.pending.column_removed(name);
        self.clamp_selection();
        info!(name, "column removed");
        self.mutated(SaveMode::Immediate);
        Ok(())
    }

    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<(), GridError> {
        self.commit_edit();
        if old == new && self.grid.has_column(old) {
            return Ok(());
        }
        self.grid.rename_column(old, new)?;
        self.pending.column_renamed(old, new);
        info!(old, new, "column renamed");
        self.mutated(SaveMode::Immediate);
        Ok(())
    }

    pub fn move_column(&mut self, from: usize, to: usize) -> Result<(), GridError> {
        self.commit_edit();
        if from == to && from < self.grid.col_count() {
            return Ok(());
        }
        self.grid.move_column(from, to)?;
        self.mutated(SaveMode::Immediate);
        Ok(())
    }

    pub fn set_instruction(&mut self, column: &str, text: &str) -> Result<(), GridError> {
        if self.grid.instruction(column).unwrap_or("") == text && self.grid.has_column(column) {
            return Ok(());
        }
        self.grid.set_instruction(column, text)?;
        self.mutated(SaveMode::Debounced);
        Ok(())
    }

    pub fn insert_rows(&mut self, count: usize, at: Option<usize>) -> Result<usize, GridError> {
        self.commit_edit();
        let idx = self.grid.insert_rows(count, at)?;
        self.pending.rows_inserted(idx, count);
        if count > 0 {
            self.mutated(SaveMode::Immediate);
        }
        Ok(idx)
    }

    pub fn remove_row(&mut self, idx: usize) -> Result<(), GridError> {
        self.commit_edit();
        self.grid.remove_row(idx)?;
        self.pending.row_removed(idx);
        self.clamp_selection();
        self.mutated(SaveMode::Immediate);
        Ok(())
    }

    pub fn move_row(&mut self, from: usize, to: usize) -> Result<(), GridError> {
        self.commit_edit();
        if from == to && from < self.grid.row_count() {
            return Ok(());
        }
        self.grid.move_row(from, to)?;
        self.pending.row_moved(from, to);
        self.mutated(SaveMode::Immediate);
        Ok(())
    }
}
