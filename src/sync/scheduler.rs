use crate::clock::Millis;

/// How a mutation wants to be persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Cell content: coalesce bursts, save after the grid goes quiet
    Debounced,
    /// Structure: save now, without a user-visible loading state
    Immediate,
}

/// What the status line shows about persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    Unsaved,
    Saving,
    Failed(String),
}

/// Tracks unsaved revisions and the debounce deadline.
///
/// Every mutation bumps `revision`; a save captures the revision it covers and, once it
/// succeeds, everything up to that revision is clean.
#[derive(Debug)]
pub struct SaveScheduler {
    debounce_ms: Millis,
    deadline: Option<Millis>,
    revision: u64,
    saved_revision: u64,
    visible_in_flight: usize,
    last_error: Option<String>,
}

impl SaveScheduler {
    pub fn new(debounce_ms: Millis) -> Self {
        Self {
            debounce_ms,
            deadline: None,
            revision: 0,
            saved_revision: 0,
            visible_in_flight: 0,
            last_error: None,
        }
    }

    /// Note a mutation. Returns true when the caller should save right away.
    /// Every debounced mutation pushes the deadline back.
    pub fn mark_dirty(&mut self, mode: SaveMode, now: Millis) -> bool {
        self.revision += 1;
        match mode {
            SaveMode::Debounced => {
                self.deadline = Some(now + self.debounce_ms);
                false
            }
            SaveMode::Immediate => true,
        }
    }

    /// True once the debounce deadline has passed. Clears the deadline.
    pub fn take_due(&mut self, now: Millis) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Revision of the latest mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.deadline
    }

    /// A save is about to go out carrying the current revision. Any pending debounce is
    /// covered by it.
    pub fn begin_save(&mut self, silent: bool) -> u64 {
        self.deadline = None;
        if !silent {
            self.visible_in_flight += 1;
        }
        self.revision
    }

    pub fn finish_save(&mut self, revision: u64, silent: bool, result: Result<(), String>) {
        if !silent {
            self.visible_in_flight = self.visible_in_flight.saturating_sub(1);
        }
        match result {
            Ok(()) => {
                self.saved_revision = self.saved_revision.max(revision);
                self.last_error = None;
            }
            Err(message) => self.last_error = Some(message),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.revision > self.saved_revision
    }

    /// Everything is clean as of now (a document was just loaded)
    pub fn reset(&mut self) {
        self.deadline = None;
        self.saved_revision = self.revision;
        self.visible_in_flight = 0;
        self.last_error = None;
    }

    pub fn status(&self) -> SaveStatus {
        if let Some(message) = &self.last_error {
            if self.is_dirty() {
                return SaveStatus::Failed(message.clone());
            }
        }
        if self.visible_in_flight > 0 {
            SaveStatus::Saving
        } else if self.is_dirty() {
            SaveStatus::Unsaved
        } else {
            SaveStatus::Saved
        }
    }
}
