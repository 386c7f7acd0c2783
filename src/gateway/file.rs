use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{
    new_document_id, ChangeCallback, PersistenceGateway, RealtimeFeed, SaveReceipt, StoredSnapshot,
    Subscription,
};
use crate::clock::{Clock, Millis};
use crate::error::GatewayError;
use crate::grid::Snapshot;

/// On-disk form of a document
#[derive(Debug, Serialize, Deserialize)]
struct DocumentFile {
    updated_at: Millis,
    snapshot: Snapshot,
}

/// Documents as `<dir>/<id>.json`. Writes go through a temp file and a rename so a reader
/// (including another process's feed) never sees half a document.
pub struct FileStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    watch_debounce: Duration,
    last_timestamp: Mutex<Millis>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>, watch_debounce: Duration) -> Self {
        Self {
            dir: dir.into(),
            clock,
            watch_debounce,
            last_timestamp: Mutex::new(0),
        }
    }

    fn doc_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Ids of every document in the store, sorted
    pub fn list(&self) -> Result<Vec<String>, GatewayError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn next_timestamp(&self, previous: Millis) -> Millis {
        let mut last = self.last_timestamp.lock().unwrap_or_else(PoisonError::into_inner);
        *last = self.clock.now_ms().max(previous + 1).max(*last + 1);
        *last
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, GatewayError> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Serialize to a temp file in `dir`, then move it over `path`
pub(crate) fn write_json_atomic<T: Serialize>(dir: &Path, path: &Path, value: &T) -> Result<(), GatewayError> {
    fs::create_dir_all(dir)?;
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| GatewayError::Io(e.error))?;
    Ok(())
}

impl PersistenceGateway for FileStore {
    fn save(&self, snapshot: &Snapshot, silent: bool) -> Result<SaveReceipt, GatewayError> {
        let id = snapshot.id.clone().unwrap_or_else(new_document_id);
        let path = self.doc_path(&id);

        let previous = read_json::<DocumentFile>(&path).map_or(0, |doc| doc.updated_at);
        let updated_at = self.next_timestamp(previous);

        let doc = DocumentFile {
            updated_at,
            snapshot: snapshot.clone().with_id(&id),
        };
        write_json_atomic(&self.dir, &path, &doc)?;

        debug!(id = %id, updated_at, silent, "file store save");
        Ok(SaveReceipt { id, server_timestamp: updated_at })
    }

    fn load(&self, id: &str) -> Result<StoredSnapshot, GatewayError> {
        let path = self.doc_path(id);
        match read_json::<DocumentFile>(&path) {
            Ok(doc) => Ok(StoredSnapshot {
                snapshot: doc.snapshot.with_id(id),
                server_timestamp: doc.updated_at,
            }),
            Err(GatewayError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                Err(GatewayError::NotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

impl RealtimeFeed for FileStore {
    /// Watch the store directory and report every write to this document newer than the last
    /// one seen, including our own. Writes land by rename, so the directory is watched rather
    /// than the file.
    fn subscribe(&self, id: &str, on_change: ChangeCallback) -> Subscription {
        let path = self.doc_path(id);
        let doc_id = id.to_string();
        let mut last_seen = read_json::<DocumentFile>(&path).map_or(0, |doc| doc.updated_at);

        let watched = path.clone();
        let feed_id = doc_id.clone();
        let handler = move |result: DebounceEventResult| match result {
            Ok(events) => {
                if !events.iter().any(|e| e.path.file_name() == watched.file_name()) {
                    return;
                }
                match read_json::<DocumentFile>(&watched) {
                    Ok(doc) if doc.updated_at > last_seen => {
                        last_seen = doc.updated_at;
                        on_change(doc.snapshot.with_id(&feed_id), doc.updated_at);
                    }
                    Ok(_) => {}
                    Err(GatewayError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!(id = %feed_id, error = %e, "file feed could not read document"),
                }
            }
            Err(e) => warn!(id = %feed_id, error = %e, "file watcher error"),
        };

        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!(id = %doc_id, error = %e, "cannot create store directory, no remote changes");
            return Subscription::new(|| {});
        }
        let mut debouncer = match new_debouncer(self.watch_debounce, handler) {
            Ok(debouncer) => debouncer,
            Err(e) => {
                warn!(id = %doc_id, error = %e, "cannot start file watcher, no remote changes");
                return Subscription::new(|| {});
            }
        };
        if let Err(e) = debouncer.watcher().watch(&self.dir, RecursiveMode::NonRecursive) {
            warn!(id = %doc_id, error = %e, "cannot watch store directory, no remote changes");
            return Subscription::new(|| {});
        }

        debug!(id = %doc_id, dir = %self.dir.display(), "file feed started");
        Subscription::new(move || {
            drop(debouncer);
            debug!(id = %doc_id, "file feed stopped");
        })
    }
}
