//! Repository Implementation

use crate::{SessionRecord, StorageError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Name of the persisted collection
pub const COLLECTION: &str = "exam_sessions";

/// Append-only store of session records
///
/// In memory by default. When opened on a file, every write rewrites the
/// whole collection to that file.
pub struct Repository {
    records: Mutex<Vec<SessionRecord>>,
    path: Option<PathBuf>,
}

impl Repository {
    /// Create an in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory {} store", COLLECTION);
        Self {
            records: Mutex::new(Vec::new()),
            path: None,
        }
    }

    /// Open a file-backed repository, loading any records already there
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let records = if path.exists() {
            let raw = fs::read(&path).map_err(|e| io_error(&path, e))?;
            if raw.iter().all(u8::is_ascii_whitespace) {
                Vec::new()
            } else {
                serde_json::from_slice(&raw)?
            }
        } else {
            Vec::new()
        };

        info!(
            "Opened {} store at {} ({} records)",
            COLLECTION,
            path.display(),
            records.len()
        );

        Ok(Self {
            records: Mutex::new(records),
            path: Some(path),
        })
    }

    /// Append a record
    pub fn append(&self, record: SessionRecord) -> Result<(), StorageError> {
        let mut records = self.lock()?;
        records.push(record);

        if let Err(e) = self.flush(&records) {
            records.pop();
            return Err(e);
        }

        debug!("Appended session record ({} total)", records.len());
        Ok(())
    }

    /// All records, insertion order
    pub fn list(&self) -> Result<Vec<SessionRecord>, StorageError> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every record; returns how many were dropped
    pub fn clear(&self) -> Result<usize, StorageError> {
        let mut records = self.lock()?;
        let previous = std::mem::take(&mut *records);

        if let Err(e) = self.flush(&records) {
            *records = previous;
            return Err(e);
        }

        warn!("Cleared {} store ({} records)", COLLECTION, previous.len());
        Ok(previous.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<SessionRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn flush(&self, records: &[SessionRecord]) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(records)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| io_error(path, e))?;
        Ok(())
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(ms: i64, cheating: bool) -> SessionRecord {
        let at = Utc.timestamp_millis_opt(ms).unwrap();
        SessionRecord::completed("Ada", "Algebra", 60, cheating, 2, at)
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let repo = Repository::new();
        repo.append(record(3_000, false)).unwrap();
        repo.append(record(1_000, true)).unwrap();

        let records = repo.list().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "session-3000");
        assert_eq!(records[1].id, "session-1000");
    }

    #[test]
    fn test_clear() {
        let repo = Repository::new();
        repo.append(record(1, false)).unwrap();
        repo.append(record(2, false)).unwrap();

        assert_eq!(repo.clear().unwrap(), 2);
        assert!(repo.is_empty());
    }

    #[test]
    fn test_file_backed_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exam_sessions.json");

        {
            let repo = Repository::open(&path).unwrap();
            assert!(repo.is_empty());
            repo.append(record(10, true)).unwrap();
            repo.append(record(20, false)).unwrap();
        }

        let reopened = Repository::open(&path).unwrap();
        let records = reopened.list().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].cheating_detected);
        assert_eq!(records[1].id, "session-20");

        reopened.clear().unwrap();
        assert!(Repository::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exam_sessions.json");
        fs::write(&path, b"{not json").unwrap();

        assert!(matches!(
            Repository::open(&path),
            Err(StorageError::SerializationError(_))
        ));
    }

    #[test]
    fn test_failed_write_keeps_memory_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("exam_sessions.json");
        let repo = Repository::open(&path).unwrap();

        assert!(matches!(
            repo.append(record(1, false)),
            Err(StorageError::Io { .. })
        ));
        assert!(repo.is_empty());
    }
}
