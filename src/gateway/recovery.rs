use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::file::{read_json, write_json_atomic};
use crate::clock::Millis;
use crate::error::GatewayError;
use crate::grid::Snapshot;

/// Key used for a document that has never been saved successfully
pub const UNSAVED_KEY: &str = "unsaved";

/// Local copy of a grid whose save failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryHint {
    pub saved_at: Millis,
    pub snapshot: Snapshot,
}

/// Best-effort local backup, one file per document. Failures here are logged by the caller
/// and never block editing.
#[derive(Debug, Clone)]
pub struct RecoveryStore {
    dir: PathBuf,
}

impl RecoveryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.recovery.json", key))
    }

    pub fn write(&self, key: &str, hint: &RecoveryHint) -> Result<(), GatewayError> {
        write_json_atomic(&self.dir, &self.path_for(key), hint)?;
        debug!(key, saved_at = hint.saved_at, "recovery hint written");
        Ok(())
    }

    pub fn read(&self, key: &str) -> Result<Option<RecoveryHint>, GatewayError> {
        match read_json(&self.path_for(key)) {
            Ok(hint) => Ok(Some(hint)),
            Err(GatewayError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn clear(&self, key: &str) -> Result<(), GatewayError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
